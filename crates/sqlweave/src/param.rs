//! Ordered parameter storage.

use crate::dialect::Dialect;
use crate::value::Value;
use std::sync::Arc;

/// Append-only list of bound values plus the dialect that renders their tokens.
///
/// The value at 1-based position `i` is always the one whose placeholder was
/// returned by the `i`-th call to [`add`](Self::add). Cloning snapshots the
/// list; the clone and the original are independent afterwards.
#[derive(Clone, Debug)]
pub struct ParamContext {
    dialect: Arc<dyn Dialect>,
    values: Vec<Value>,
}

impl ParamContext {
    /// Create an empty context for `dialect`.
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder token.
    pub fn add(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        self.dialect.placeholder(self.values.len())
    }

    /// Bound values in placeholder order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Owned snapshot of the bound values.
    pub fn to_vec(&self) -> Vec<Value> {
        self.values.clone()
    }

    /// Consume the context, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres};

    #[test]
    fn add_returns_indexed_tokens() {
        let mut ctx = ParamContext::new(Arc::new(Postgres));
        assert_eq!(ctx.add(10), "$1");
        assert_eq!(ctx.add("x"), "$2");
        assert_eq!(ctx.values(), &[Value::Int(10), Value::Text("x".into())]);
    }

    #[test]
    fn fixed_token_dialect_relies_on_order() {
        let mut ctx = ParamContext::new(Arc::new(MySql));
        assert_eq!(ctx.add(1), "?");
        assert_eq!(ctx.add(2), "?");
        assert_eq!(ctx.into_values(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_adds() {
        let mut ctx = ParamContext::new(Arc::new(Postgres));
        ctx.add(1);
        let snapshot = ctx.to_vec();
        ctx.add(2);
        assert_eq!(snapshot, vec![Value::Int(1)]);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn clones_diverge_independently() {
        let mut a = ParamContext::new(Arc::new(Postgres));
        a.add(1);
        let mut b = a.clone();
        assert_eq!(a.add("left"), "$2");
        assert_eq!(b.add("right"), "$2");
        b.add("more");
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
        assert_eq!(a.values()[1], Value::Text("left".into()));
        assert_eq!(b.values()[1], Value::Text("right".into()));
    }
}

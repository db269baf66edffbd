//! Boolean condition builder for WHERE/HAVING clauses.
//!
//! Conditions are kept as an ordered list of `(connector, predicate)` nodes
//! rather than a tree: rendering is one linear pass and the only special case is
//! that the first node's connector is not emitted. Nested groups are stored as a
//! child builder and render as a single parenthesized node.
//!
//! Nothing is numbered until [`PredicateBuilder::render`] runs against a
//! [`ParamContext`]. Every literal is registered at the moment its token is
//! written, so placeholder order always equals parameter order, including for
//! sub-statements spliced in by `EXISTS` and `IN (subquery)`.

use crate::error::{Error, Result};
use crate::param::ParamContext;
use crate::statement::Statement;
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// How a node joins the nodes before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Operators accepted by [`PredicateBuilder::add_comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `!=`
    Ne,
    /// `<>`
    NotEqual,
    Like,
    ILike,
    In,
    NotIn,
    Between,
    Exists,
}

impl Operator {
    /// Parse an operator against the allow-list.
    ///
    /// Matching ignores case and collapses runs of whitespace, so `not  in`
    /// parses as [`Operator::NotIn`].
    pub fn parse(op: &str) -> Result<Self> {
        let normalized = op
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let parsed = match normalized.as_str() {
            "=" => Operator::Eq,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "!=" => Operator::Ne,
            "<>" => Operator::NotEqual,
            "LIKE" => Operator::Like,
            "ILIKE" => Operator::ILike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "BETWEEN" => Operator::Between,
            "EXISTS" => Operator::Exists,
            _ => return Err(Error::InvalidOperator(op.to_string())),
        };
        Ok(parsed)
    }

    /// The SQL spelling of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Ne => "!=",
            Operator::NotEqual => "<>",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::Exists => "EXISTS",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operator::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a comparison: a single value, a list, or a sub-statement.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Subquery(Box<Statement>),
}

impl Operand {
    /// A list operand for `IN`, `NOT IN` and `BETWEEN`.
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Operand::List(items.into_iter().map(Into::into).collect())
    }

    /// A sub-statement operand for `EXISTS` and `IN`.
    pub fn subquery(statement: Statement) -> Self {
        Operand::Subquery(Box::new(statement))
    }

    /// Elements of a list operand; array values count as lists.
    fn into_list(self) -> std::result::Result<Vec<Value>, Self> {
        match self {
            Operand::List(items) | Operand::Value(Value::Array(items)) => Ok(items),
            other => Err(other),
        }
    }
}

impl<T: Into<Value>> From<T> for Operand {
    fn from(value: T) -> Self {
        Operand::Value(value.into())
    }
}

/// One entry of a bulk condition map.
///
/// Plain values convert to [`Condition::Equals`] (or [`Condition::Null`] for
/// NULL); explicit operators use [`Condition::compare`].
#[derive(Debug, Clone)]
pub enum Condition {
    Equals(Value),
    Compare { op: String, operand: Operand },
    Null,
}

impl Condition {
    /// Explicit operator form, validated when the condition is applied.
    pub fn compare(op: impl Into<String>, operand: impl Into<Operand>) -> Self {
        Condition::Compare {
            op: op.into(),
            operand: operand.into(),
        }
    }
}

impl<T: Into<Value>> From<T> for Condition {
    fn from(value: T) -> Self {
        match value.into() {
            Value::Null => Condition::Null,
            v => Condition::Equals(v),
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Compare {
        column: String,
        op: Operator,
        value: Value,
    },
    CompareSubquery {
        column: String,
        op: Operator,
        subquery: Box<Statement>,
    },
    NullCheck {
        column: String,
        is_null: bool,
    },
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    InSubquery {
        column: String,
        subquery: Box<Statement>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    Exists(Box<Statement>),
    Raw(String),
    Group(PredicateBuilder),
}

impl Predicate {
    fn render(&self, ctx: &mut ParamContext) -> String {
        match self {
            Predicate::Compare { column, op, value } => {
                let token = ctx.add(value.clone());
                format!("{} {} {}", column, op.as_sql(), token)
            }
            Predicate::CompareSubquery {
                column,
                op,
                subquery,
            } => format!("{} {} ({})", column, op.as_sql(), subquery.render(ctx)),
            Predicate::NullCheck { column, is_null } => {
                if *is_null {
                    format!("{} IS NULL", column)
                } else {
                    format!("{} IS NOT NULL", column)
                }
            }
            Predicate::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return if *negated { "1=1".to_string() } else { "1=0".to_string() };
                }
                let tokens: Vec<String> = values.iter().map(|v| ctx.add(v.clone())).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column, op, tokens.join(", "))
            }
            Predicate::InSubquery {
                column,
                subquery,
                negated,
            } => {
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column, op, subquery.render(ctx))
            }
            Predicate::Between { column, low, high } => {
                let low = ctx.add(low.clone());
                let high = ctx.add(high.clone());
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            Predicate::Exists(subquery) => format!("EXISTS ({})", subquery.render(ctx)),
            Predicate::Raw(sql) => sql.clone(),
            Predicate::Group(group) => format!("({})", group.render(ctx)),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    connector: Connector,
    predicate: Predicate,
}

/// Ordered list of boolean predicates joined by AND/OR.
///
/// Cloning copies the node list. Builders hold no parameter state, so a clone
/// can never desynchronize a statement's parameter array.
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    nodes: Vec<Node>,
}

impl PredicateBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of top-level nodes (a group counts once).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, connector: Connector, predicate: Predicate) -> &mut Self {
        self.nodes.push(Node {
            connector,
            predicate,
        });
        self
    }

    fn equals_predicate(column: &str, value: Value) -> Predicate {
        if value.is_null() {
            Predicate::NullCheck {
                column: column.to_string(),
                is_null: true,
            }
        } else {
            Predicate::Compare {
                column: column.to_string(),
                op: Operator::Eq,
                value,
            }
        }
    }

    /// AND `column = value`, or `column IS NULL` when `value` is NULL.
    pub fn add_equals(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let predicate = Self::equals_predicate(column, value.into());
        self.push(Connector::And, predicate)
    }

    /// OR `column = value`, or `column IS NULL` when `value` is NULL.
    pub fn or_equals(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let predicate = Self::equals_predicate(column, value.into());
        self.push(Connector::Or, predicate)
    }

    /// AND a comparison using an operator from the allow-list.
    ///
    /// # Errors
    /// - [`Error::InvalidOperator`] if `op` is not allowed.
    /// - [`Error::InvalidOperand`] if `operand` has the wrong shape for `op`
    ///   (`IN`/`NOT IN` need a list or subquery, `BETWEEN` a two-element list,
    ///   `EXISTS` a subquery, other operators a single value or subquery).
    pub fn add_comparison(
        &mut self,
        column: &str,
        op: &str,
        operand: impl Into<Operand>,
    ) -> Result<&mut Self> {
        let predicate = Self::comparison_predicate(column, op, operand.into())?;
        Ok(self.push(Connector::And, predicate))
    }

    /// OR a comparison. Same validation as [`add_comparison`](Self::add_comparison).
    pub fn or_comparison(
        &mut self,
        column: &str,
        op: &str,
        operand: impl Into<Operand>,
    ) -> Result<&mut Self> {
        let predicate = Self::comparison_predicate(column, op, operand.into())?;
        Ok(self.push(Connector::Or, predicate))
    }

    fn comparison_predicate(column: &str, op: &str, operand: Operand) -> Result<Predicate> {
        let operator = Operator::parse(op)?;
        let column = column.to_string();
        let predicate = match operator {
            Operator::In | Operator::NotIn => {
                let negated = operator == Operator::NotIn;
                match operand.into_list() {
                    Ok(values) => Predicate::InList {
                        column,
                        values,
                        negated,
                    },
                    Err(Operand::Subquery(subquery)) => Predicate::InSubquery {
                        column,
                        subquery,
                        negated,
                    },
                    Err(_) => {
                        return Err(Error::invalid_operand(
                            operator.as_sql(),
                            "a list of values or a subquery",
                        ));
                    }
                }
            }
            Operator::Between => match operand.into_list().as_deref() {
                Ok([low, high]) => Predicate::Between {
                    column,
                    low: low.clone(),
                    high: high.clone(),
                },
                _ => {
                    return Err(Error::invalid_operand(
                        operator.as_sql(),
                        "a two-element list [low, high]",
                    ));
                }
            },
            Operator::Exists => match operand {
                Operand::Subquery(subquery) => Predicate::Exists(subquery),
                _ => return Err(Error::invalid_operand(operator.as_sql(), "a subquery")),
            },
            _ => match operand {
                Operand::Value(value) => Predicate::Compare {
                    column,
                    op: operator,
                    value,
                },
                Operand::Subquery(subquery) => Predicate::CompareSubquery {
                    column,
                    op: operator,
                    subquery,
                },
                Operand::List(_) => {
                    return Err(Error::invalid_operand(operator.as_sql(), "a single value"));
                }
            },
        };
        Ok(predicate)
    }

    // Scalar operators only; callers never pass IN/BETWEEN/EXISTS here.
    pub(crate) fn push_compare(&mut self, column: &str, op: Operator, value: Value) -> &mut Self {
        self.push(
            Connector::And,
            Predicate::Compare {
                column: column.to_string(),
                op,
                value,
            },
        )
    }

    /// AND `column IS NOT NULL`.
    pub fn add_not_null(&mut self, column: &str) -> &mut Self {
        self.push(
            Connector::And,
            Predicate::NullCheck {
                column: column.to_string(),
                is_null: false,
            },
        )
    }

    /// AND `column IN (...)`, or `column NOT IN (...)` when `negated`.
    ///
    /// An empty list renders `1=0` (`1=1` when negated).
    pub fn add_in_list<T: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = T>,
        negated: bool,
    ) -> &mut Self {
        self.push(
            Connector::And,
            Predicate::InList {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated,
            },
        )
    }

    /// AND `column BETWEEN low AND high`.
    pub fn add_between(
        &mut self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.push(
            Connector::And,
            Predicate::Between {
                column: column.to_string(),
                low: low.into(),
                high: high.into(),
            },
        )
    }

    /// AND `EXISTS (subquery)`.
    pub fn add_exists(&mut self, subquery: Statement) -> &mut Self {
        self.push(Connector::And, Predicate::Exists(Box::new(subquery)))
    }

    /// AND a raw SQL fragment, emitted verbatim.
    ///
    /// Nothing is parameterized: never interpolate untrusted input here.
    pub fn add_raw(&mut self, expression: &str) -> &mut Self {
        self.push(Connector::And, Predicate::Raw(expression.to_string()))
    }

    /// OR a raw SQL fragment, emitted verbatim.
    pub fn or_raw(&mut self, expression: &str) -> &mut Self {
        self.push(Connector::Or, Predicate::Raw(expression.to_string()))
    }

    /// AND every entry of a condition map, in iteration order.
    pub fn add_conditions<I, C>(&mut self, conditions: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (C, Condition)>,
        C: AsRef<str>,
    {
        for (column, condition) in conditions {
            let column = column.as_ref();
            match condition {
                Condition::Equals(value) => {
                    self.add_equals(column, value);
                }
                Condition::Null => {
                    self.add_equals(column, Value::Null);
                }
                Condition::Compare { op, operand } => {
                    self.add_comparison(column, &op, operand)?;
                }
            }
        }
        Ok(self)
    }

    /// AND a parenthesized group configured by `configure`.
    ///
    /// A group that ends up with no nodes contributes nothing.
    pub fn and_group<F>(&mut self, configure: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        self.group(Connector::And, configure)
    }

    /// OR a parenthesized group configured by `configure`.
    pub fn or_group<F>(&mut self, configure: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        self.group(Connector::Or, configure)
    }

    fn group<F>(&mut self, connector: Connector, configure: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        let mut group = PredicateBuilder::new();
        configure(&mut group)?;
        if !group.is_empty() {
            self.push(connector, Predicate::Group(group));
        }
        Ok(self)
    }

    /// Render the boolean expression without a leading keyword.
    pub fn render(&self, ctx: &mut ParamContext) -> String {
        let mut sql = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(node.connector.as_sql());
                sql.push(' ');
            }
            sql.push_str(&node.predicate.render(ctx));
        }
        sql
    }

    /// Render `"<keyword> <expression>"`, or `""` when there are no nodes.
    pub fn build_clause(&self, ctx: &mut ParamContext, keyword: &str) -> String {
        if self.nodes.is_empty() {
            return String::new();
        }
        format!("{} {}", keyword, self.render(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres};
    use std::sync::Arc;

    fn pg() -> ParamContext {
        ParamContext::new(Arc::new(Postgres))
    }

    #[test]
    fn empty_builder_renders_nothing() {
        let b = PredicateBuilder::new();
        let mut ctx = pg();
        assert_eq!(b.build_clause(&mut ctx, "WHERE"), "");
        assert!(ctx.is_empty());
    }

    #[test]
    fn equals_and_null() {
        let mut b = PredicateBuilder::new();
        b.add_equals("status", "active").add_equals("deleted_at", Value::Null);
        let mut ctx = pg();
        assert_eq!(
            b.build_clause(&mut ctx, "WHERE"),
            "WHERE status = $1 AND deleted_at IS NULL"
        );
        assert_eq!(ctx.values(), &[Value::Text("active".into())]);
    }

    #[test]
    fn comparison_operators() {
        let mut b = PredicateBuilder::new();
        b.add_comparison("age", ">=", 18).unwrap();
        b.add_comparison("name", "ilike", "%al%").unwrap();
        b.add_comparison("role", "<>", "guest").unwrap();
        let mut ctx = pg();
        assert_eq!(
            b.render(&mut ctx),
            "age >= $1 AND name ILIKE $2 AND role <> $3"
        );
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn rejects_unknown_operator() {
        let mut b = PredicateBuilder::new();
        let err = b.add_comparison("x", "DROP", 1).unwrap_err();
        assert!(err.is_invalid_operator());
        assert!(b.is_empty());
    }

    #[test]
    fn in_requires_a_list() {
        let mut b = PredicateBuilder::new();
        let err = b.add_comparison("x", "IN", 5).unwrap_err();
        assert!(err.is_invalid_operand());
    }

    #[test]
    fn in_list_registers_every_element() {
        let mut b = PredicateBuilder::new();
        b.add_comparison("id", "IN", Operand::list([1, 2, 3])).unwrap();
        b.add_comparison("tag", "not in", Value::array(["a"])).unwrap();
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "id IN ($1, $2, $3) AND tag NOT IN ($4)");
        assert_eq!(
            ctx.values(),
            &[Value::Int(1), Value::Int(2), Value::Int(3), Value::Text("a".into())]
        );
    }

    #[test]
    fn empty_in_lists() {
        let mut b = PredicateBuilder::new();
        b.add_comparison("id", "IN", Operand::List(vec![])).unwrap();
        b.add_comparison("id", "NOT IN", Operand::List(vec![])).unwrap();
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "1=0 AND 1=1");
        assert!(ctx.is_empty());
    }

    #[test]
    fn between_requires_two_elements() {
        let mut b = PredicateBuilder::new();
        assert!(b
            .add_comparison("age", "BETWEEN", Operand::list([1]))
            .unwrap_err()
            .is_invalid_operand());
        assert!(b.add_comparison("age", "BETWEEN", 1).unwrap_err().is_invalid_operand());

        b.add_comparison("age", "BETWEEN", Operand::list([18, 65])).unwrap();
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "age BETWEEN $1 AND $2");
        assert_eq!(ctx.values(), &[Value::Int(18), Value::Int(65)]);
    }

    #[test]
    fn exists_requires_a_subquery() {
        let mut b = PredicateBuilder::new();
        assert!(b.add_comparison("", "EXISTS", 1).unwrap_err().is_invalid_operand());
    }

    #[test]
    fn comparison_rejects_list() {
        let mut b = PredicateBuilder::new();
        assert!(b
            .add_comparison("x", "=", Operand::list([1, 2]))
            .unwrap_err()
            .is_invalid_operand());
    }

    #[test]
    fn nested_groups() {
        let mut b = PredicateBuilder::new();
        b.add_equals("a", 1);
        b.and_group(|g| {
            g.add_equals("b", 2);
            g.or_group(|h| {
                h.add_equals("c", 3);
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        let mut ctx = pg();
        assert_eq!(
            b.build_clause(&mut ctx, "WHERE"),
            "WHERE a = $1 AND (b = $2 OR (c = $3))"
        );
        assert_eq!(ctx.values(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn empty_group_contributes_nothing() {
        let mut b = PredicateBuilder::new();
        b.add_equals("a", 1);
        b.or_group(|_| Ok(())).unwrap();
        assert_eq!(b.len(), 1);
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "a = $1");
    }

    #[test]
    fn group_errors_propagate() {
        let mut b = PredicateBuilder::new();
        let err = b
            .and_group(|g| {
                g.add_comparison("x", "NOPE", 1)?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_invalid_operator());
        assert!(b.is_empty());
    }

    #[test]
    fn first_node_connector_is_not_emitted() {
        let mut b = PredicateBuilder::new();
        b.or_equals("a", 1).or_raw("b > 2");
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "a = $1 OR b > 2");
    }

    #[test]
    fn bulk_conditions() {
        let mut b = PredicateBuilder::new();
        b.add_conditions([
            ("status", Condition::from("open")),
            ("closed_at", Condition::from(None::<i64>)),
            ("priority", Condition::compare(">", 3)),
        ])
        .unwrap();
        let mut ctx = ParamContext::new(Arc::new(MySql));
        assert_eq!(
            b.render(&mut ctx),
            "status = ? AND closed_at IS NULL AND priority > ?"
        );
        assert_eq!(ctx.values(), &[Value::Text("open".into()), Value::Int(3)]);
    }

    #[test]
    fn bulk_conditions_validate_operators() {
        let mut b = PredicateBuilder::new();
        let err = b
            .add_conditions([("x", Condition::compare("; DROP", 1))])
            .unwrap_err();
        assert!(err.is_invalid_operator());
    }

    #[test]
    fn clone_copies_nodes_independently() {
        let mut a = PredicateBuilder::new();
        a.add_equals("a", 1);
        let mut b = a.clone();
        b.add_equals("b", 2);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn raw_is_verbatim() {
        let mut b = PredicateBuilder::new();
        b.add_raw("created_at > NOW() - INTERVAL '1 day'");
        let mut ctx = pg();
        assert_eq!(b.render(&mut ctx), "created_at > NOW() - INTERVAL '1 day'");
        assert!(ctx.is_empty());
    }

    #[test]
    fn operator_parsing_normalizes() {
        assert_eq!(Operator::parse(" not   in ").unwrap(), Operator::NotIn);
        assert_eq!("like".parse::<Operator>().unwrap(), Operator::Like);
        assert_eq!(Operator::Gte.to_string(), ">=");
    }
}

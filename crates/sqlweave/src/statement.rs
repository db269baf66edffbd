//! SELECT statement assembler.
//!
//! A [`Statement`] stores its clauses structurally and renders them in one pass
//! at [`build`](Statement::build) time into a fresh [`ParamContext`]. Embedded
//! statements (CTEs, FROM subqueries, `EXISTS`/`IN` operands, UNION arms) are
//! rendered into that same context at the point their text is written, so the
//! parameter array always follows left-to-right placeholder order and `$n`
//! numbering is continuous across the whole tree.

use crate::config::BuilderConfig;
use crate::dialect::{Dialect, Postgres};
use crate::error::{Error, Result};
use crate::param::ParamContext;
use crate::predicate::{Condition, Operand, Operator, PredicateBuilder};
use crate::trace;
use crate::value::Value;
use serde::Serialize;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// The rendered statement handed to an executor.
///
/// Placeholder `k` in `sql` corresponds to `params[k - 1]`. Executors must not
/// re-order, filter or deduplicate `params`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
    #[serde(skip)]
    dialect: &'static str,
}

impl BuiltQuery {
    /// Name of the dialect the SQL was rendered for.
    pub fn dialect(&self) -> &'static str {
        self.dialect
    }

    /// Get parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
    }
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    left_key: String,
    right_key: String,
}

#[derive(Debug, Clone)]
struct OrderClause {
    column: String,
    direction: Order,
}

#[derive(Debug, Clone)]
struct Cte {
    name: String,
    statement: Statement,
    recursive: bool,
}

#[derive(Debug, Clone)]
struct UnionArm {
    statement: Statement,
    all: bool,
}

#[derive(Debug, Clone)]
enum Source {
    Table(String),
    Subquery { statement: Box<Statement>, alias: String },
}

/// Reject names that cannot stand in for a column, alias or CTE.
fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::type_mismatch(format!("{} must be a non-empty name", kind)));
    }
    if name.contains('\0') {
        return Err(Error::type_mismatch(format!(
            "{} cannot contain NUL character",
            kind
        )));
    }
    Ok(())
}

/// SELECT query builder.
///
/// Cloning produces a fully independent copy: select list, joins, predicate
/// trees, ordering, bounds, CTEs and union arms are all deep-copied, and no
/// parameter state exists outside [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct Statement {
    dialect: Arc<dyn Dialect>,
    columns: Vec<String>,
    source: Source,
    joins: Vec<Join>,
    where_clause: PredicateBuilder,
    group_by: Vec<String>,
    having: PredicateBuilder,
    unions: Vec<UnionArm>,
    order_by: Vec<OrderClause>,
    limit: Option<u64>,
    offset: Option<u64>,
    default_limit: Option<u64>,
    ctes: Vec<Cte>,
}

impl Statement {
    /// Create a SELECT over `table` using the Postgres dialect.
    ///
    /// `table` is emitted verbatim, so `"users u"` or a CTE name both work.
    pub fn new(table: &str) -> Self {
        Self::with_dialect(table, Arc::new(Postgres))
    }

    /// Create a SELECT over `table` rendered with `dialect`.
    pub fn with_dialect(table: &str, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            columns: Vec::new(),
            source: Source::Table(table.to_string()),
            joins: Vec::new(),
            where_clause: PredicateBuilder::new(),
            group_by: Vec::new(),
            having: PredicateBuilder::new(),
            unions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            default_limit: None,
            ctes: Vec::new(),
        }
    }

    /// Create a SELECT over `table` with dialect and defaults from `config`.
    pub fn with_config(table: &str, config: &BuilderConfig) -> Self {
        let mut stmt = Self::with_dialect(table, config.dialect.dialect());
        stmt.default_limit = config.default_limit;
        stmt
    }

    /// Create a SELECT over `(subquery) AS alias`, inheriting its dialect.
    pub fn from_subquery_of(subquery: Statement, alias: &str) -> Result<Self> {
        let dialect = subquery.dialect.clone();
        Self::with_dialect("", dialect).from_subquery(subquery, alias)
    }

    /// Replace the dialect.
    ///
    /// Only the root's dialect matters: embedded statements always render
    /// with the dialect of the statement being built.
    pub fn dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    // ==================== SELECT columns ====================

    /// Replace the select list. An empty list renders `*`.
    pub fn select_columns<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cols = Vec::new();
        for col in columns {
            let col = col.as_ref();
            check_name("select column", col)?;
            cols.push(col.to_string());
        }
        self.columns = cols;
        Ok(self)
    }

    /// Append one select column.
    pub fn add_select(mut self, column: &str) -> Result<Self> {
        check_name("select column", column)?;
        self.columns.push(column.to_string());
        Ok(self)
    }

    // ==================== FROM ====================

    /// Select from `(subquery) AS alias`.
    ///
    /// The subquery's parameters are bound in place when this statement is built.
    pub fn from_subquery(mut self, subquery: Statement, alias: &str) -> Result<Self> {
        check_name("subquery alias", alias)?;
        self.source = Source::Subquery {
            statement: Box::new(subquery),
            alias: alias.to_string(),
        };
        Ok(self)
    }

    // ==================== JOIN ====================

    /// Append `<kind> JOIN table ON left_key = right_key`.
    ///
    /// Purely textual: keys are not checked against the joined tables.
    pub fn join(mut self, kind: JoinKind, table: &str, left_key: &str, right_key: &str) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
        });
        self
    }

    /// Add INNER JOIN.
    pub fn inner_join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.join(JoinKind::Inner, table, left_key, right_key)
    }

    /// Add LEFT JOIN.
    pub fn left_join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.join(JoinKind::Left, table, left_key, right_key)
    }

    /// Add RIGHT JOIN.
    pub fn right_join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.join(JoinKind::Right, table, left_key, right_key)
    }

    // ==================== WHERE ====================

    /// Add WHERE: column = value (or `column IS NULL` for NULL)
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_clause.add_equals(column, value);
        self
    }

    /// OR WHERE: column = value
    pub fn or_where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_clause.or_equals(column, value);
        self
    }

    /// Add WHERE: column <op> operand, validated against the operator allow-list.
    pub fn where_op(mut self, column: &str, op: &str, operand: impl Into<Operand>) -> Result<Self> {
        self.where_clause.add_comparison(column, op, operand)?;
        Ok(self)
    }

    /// Add every entry of a condition map to WHERE, joined with AND.
    pub fn where_all<I, C>(mut self, conditions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, Condition)>,
        C: AsRef<str>,
    {
        self.where_clause.add_conditions(conditions)?;
        Ok(self)
    }

    /// Add a raw WHERE condition without params.
    pub fn where_raw(mut self, sql: &str) -> Self {
        self.where_clause.add_raw(sql);
        self
    }

    /// Add WHERE EXISTS (subquery).
    pub fn where_exists(mut self, subquery: Statement) -> Self {
        self.where_clause.add_exists(subquery);
        self
    }

    /// Add WHERE column IN (subquery).
    pub fn where_in_subquery(self, column: &str, subquery: Statement) -> Result<Self> {
        self.where_op(column, "IN", Operand::subquery(subquery))
    }

    /// Add a parenthesized AND group to WHERE.
    pub fn and_group<F>(mut self, configure: F) -> Result<Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        self.where_clause.and_group(configure)?;
        Ok(self)
    }

    /// Add a parenthesized OR group to WHERE.
    pub fn or_group<F>(mut self, configure: F) -> Result<Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        self.where_clause.or_group(configure)?;
        Ok(self)
    }

    // ==================== WHERE shorthands ====================

    /// Add WHERE: column = value
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_eq(column, value)
    }

    /// Add WHERE: column != value
    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Operator::Ne, value.into())
    }

    /// Add WHERE: column > value
    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Operator::Gt, value.into())
    }

    /// Add WHERE: column >= value
    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Operator::Gte, value.into())
    }

    /// Add WHERE: column < value
    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Operator::Lt, value.into())
    }

    /// Add WHERE: column <= value
    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, Operator::Lte, value.into())
    }

    /// Add WHERE: column LIKE pattern
    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(column, Operator::Like, pattern.into())
    }

    /// Add WHERE: column ILIKE pattern (case-insensitive)
    pub fn ilike(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(column, Operator::ILike, pattern.into())
    }

    /// Add WHERE: column IS NULL
    pub fn is_null(self, column: &str) -> Self {
        self.where_eq(column, Value::Null)
    }

    /// Add WHERE: column IS NOT NULL
    pub fn is_not_null(mut self, column: &str) -> Self {
        self.where_clause.add_not_null(column);
        self
    }

    /// Add WHERE: column IN (values...). An empty list renders `1=0`.
    pub fn in_list<T: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_clause.add_in_list(column, values, false);
        self
    }

    /// Add WHERE: column NOT IN (values...). An empty list renders `1=1`.
    pub fn not_in<T: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.where_clause.add_in_list(column, values, true);
        self
    }

    /// Add WHERE: column BETWEEN low AND high
    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.where_clause.add_between(column, low, high);
        self
    }

    /// Add WHERE if value is Some: column = value
    pub fn eq_opt<T: Into<Value>>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.where_eq(column, v),
            None => self,
        }
    }

    fn compare(mut self, column: &str, op: Operator, value: Value) -> Self {
        self.where_clause.push_compare(column, op, value);
        self
    }

    // ==================== GROUP BY / HAVING ====================

    /// Append a GROUP BY column.
    pub fn group_by(mut self, column: &str) -> Result<Self> {
        check_name("group by column", column)?;
        self.group_by.push(column.to_string());
        Ok(self)
    }

    /// Append several GROUP BY columns.
    pub fn group_by_columns<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in columns {
            self = self.group_by(col.as_ref())?;
        }
        Ok(self)
    }

    /// Add HAVING: column = value
    pub fn having_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.having.add_equals(column, value);
        self
    }

    /// Add HAVING: column <op> operand
    pub fn having_op(mut self, column: &str, op: &str, operand: impl Into<Operand>) -> Result<Self> {
        self.having.add_comparison(column, op, operand)?;
        Ok(self)
    }

    /// Add a raw HAVING condition without params.
    pub fn having_raw(mut self, sql: &str) -> Self {
        self.having.add_raw(sql);
        self
    }

    /// Add a parenthesized AND group to HAVING.
    pub fn having_group<F>(mut self, configure: F) -> Result<Self>
    where
        F: FnOnce(&mut PredicateBuilder) -> Result<()>,
    {
        self.having.and_group(configure)?;
        Ok(self)
    }

    // ==================== UNION ====================

    /// Append `UNION <statement>`.
    pub fn union(mut self, statement: Statement) -> Self {
        self.unions.push(UnionArm { statement, all: false });
        self
    }

    /// Append `UNION ALL <statement>`.
    pub fn union_all(mut self, statement: Statement) -> Self {
        self.unions.push(UnionArm { statement, all: true });
        self
    }

    // ==================== Ordering & pagination ====================

    /// Add ORDER BY column ASC.
    pub fn order_by(self, column: &str) -> Self {
        self.order_by_dir(column, Order::Asc)
    }

    /// Add ORDER BY column DESC.
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by_dir(column, Order::Desc)
    }

    /// Add ORDER BY column with an explicit direction.
    ///
    /// Repeated calls compose into a multi-key sort in declaration order.
    pub fn order_by_dir(mut self, column: &str, direction: Order) -> Self {
        self.order_by.push(OrderClause {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// Set LIMIT. `limit(0)` is emitted as `LIMIT 0`.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET. `offset(0)` is emitted as `OFFSET 0`.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
        let p = page.max(1);
        let size = per_page.max(1);
        self.limit = Some(size);
        self.offset = Some((p - 1).saturating_mul(size));
        self
    }

    // ==================== CTE ====================

    /// Append a named CTE.
    pub fn with_cte(self, name: &str, statement: Statement) -> Result<Self> {
        self.push_cte(name, statement, false)
    }

    /// Append a named CTE and mark the WITH clause RECURSIVE.
    ///
    /// RECURSIVE applies to the whole clause, so one recursive CTE is enough.
    pub fn with_recursive_cte(self, name: &str, statement: Statement) -> Result<Self> {
        self.push_cte(name, statement, true)
    }

    fn push_cte(mut self, name: &str, statement: Statement, recursive: bool) -> Result<Self> {
        check_name("CTE name", name)?;
        self.ctes.push(Cte {
            name: name.to_string(),
            statement,
            recursive,
        });
        Ok(self)
    }

    // ==================== Build ====================

    /// Render SQL and parameters.
    ///
    /// Pure: building twice without changes yields identical output.
    pub fn build(&self) -> BuiltQuery {
        let mut ctx = ParamContext::new(self.dialect.clone());
        let sql = self.render(&mut ctx);
        let params = ctx.into_values();
        trace::sql_event("built statement", self.dialect.name(), &sql, params.len());
        BuiltQuery {
            sql,
            params,
            dialect: self.dialect.name(),
        }
    }

    /// The SQL text only.
    pub fn to_sql(&self) -> String {
        self.build().sql
    }

    fn needs_grouping_as_arm(&self) -> bool {
        self.has_paging() || !self.unions.is_empty() || !self.ctes.is_empty()
    }

    fn has_paging(&self) -> bool {
        !self.order_by.is_empty()
            || self.limit.is_some()
            || self.offset.is_some()
            || self.default_limit.is_some()
    }

    /// Render into `ctx`, binding values in text order.
    pub(crate) fn render(&self, ctx: &mut ParamContext) -> String {
        let mut sql = String::new();

        // WITH
        if !self.ctes.is_empty() {
            sql.push_str("WITH ");
            if self.ctes.iter().any(|c| c.recursive) {
                sql.push_str("RECURSIVE ");
            }
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&cte.name);
                sql.push_str(" AS (");
                sql.push_str(&cte.statement.render(ctx));
                sql.push(')');
            }
            sql.push(' ');
        }

        // SELECT ... FROM
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        match &self.source {
            Source::Table(table) => sql.push_str(table),
            Source::Subquery { statement, alias } => {
                sql.push('(');
                sql.push_str(&statement.render(ctx));
                sql.push_str(") AS ");
                sql.push_str(alias);
            }
        }

        // JOINs
        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} ON {} = {}",
                join.kind.as_sql(),
                join.table,
                join.left_key,
                join.right_key
            ));
        }

        // WHERE
        let where_sql = self.where_clause.build_clause(ctx, "WHERE");
        if !where_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&where_sql);
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        // HAVING
        let having_sql = self.having.build_clause(ctx, "HAVING");
        if !having_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&having_sql);
        }

        // UNION arms; grouped when they would not stand alone as a plain SELECT.
        for arm in &self.unions {
            sql.push_str(if arm.all { " UNION ALL " } else { " UNION " });
            let arm_sql = arm.statement.render(ctx);
            if arm.statement.needs_grouping_as_arm() {
                sql.push('(');
                sql.push_str(&arm_sql);
                sql.push(')');
            } else {
                sql.push_str(&arm_sql);
            }
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", o.column, o.direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        // LIMIT / OFFSET
        if let Some(limit) = self.limit.or(self.default_limit) {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    /// A statement counting the rows this one would return.
    ///
    /// ORDER BY, LIMIT and OFFSET are dropped. Statements with GROUP BY, HAVING
    /// or UNION arms are wrapped in a subquery; CTEs are hoisted to the outer
    /// statement so they stay in scope. The wrapped select list becomes `1`
    /// unless a HAVING clause or a UNION needs the original columns.
    pub fn count(&self) -> Statement {
        let mut inner = self.clone();
        inner.order_by.clear();
        inner.limit = None;
        inner.offset = None;
        inner.default_limit = None;

        let needs_wrap =
            !inner.group_by.is_empty() || !inner.having.is_empty() || !inner.unions.is_empty();
        if !needs_wrap {
            inner.columns = vec!["COUNT(*)".to_string()];
            return inner;
        }

        let ctes = std::mem::take(&mut inner.ctes);
        // HAVING may name a select alias, so the list is only collapsed without one.
        let keep_columns = !inner.unions.is_empty()
            || (!inner.having.is_empty() && !inner.columns.is_empty());
        if !keep_columns {
            inner.columns = vec!["1".to_string()];
        }
        let mut outer = Statement::with_dialect("", self.dialect.clone());
        outer.columns = vec!["COUNT(*)".to_string()];
        outer.source = Source::Subquery {
            statement: Box::new(inner),
            alias: "t".to_string(),
        };
        outer.ctes = ctes;
        outer
    }
}

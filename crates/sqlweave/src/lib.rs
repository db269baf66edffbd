//! # sqlweave
//!
//! A dialect-aware SELECT builder that keeps SQL text and bound parameters in
//! lock-step.
//!
//! ## Features
//!
//! - **Ordered parameters**: placeholder `k` always binds `params[k - 1]`, across CTEs,
//!   FROM subqueries, `EXISTS`/`IN` subqueries and UNION arms
//! - **Dialects**: Postgres (`$n`, `"ident"`) and MySQL (`?`, `` `ident` ``)
//! - **Validated operators**: comparisons outside the allow-list are rejected at the call
//! - **Nested conditions**: AND/OR groups compose to any depth
//! - **Executor-ready**: pass a built query to any [`GenericClient`]
//!
//! ## Example
//!
//! ```ignore
//! use sqlweave::{select, Operand};
//!
//! let recent = select("orders")
//!     .select_columns(["user_id"])?
//!     .where_op("amount", "BETWEEN", Operand::list([10, 20]))?;
//!
//! let q = select("big_spenders")
//!     .with_cte("big_spenders", recent)?
//!     .eq("user_id", 30)
//!     .build();
//!
//! // WITH big_spenders AS (SELECT user_id FROM orders WHERE amount BETWEEN $1 AND $2)
//! // SELECT * FROM big_spenders WHERE user_id = $3
//! let rows = q.fetch_all(&client).await?;
//! ```

pub mod client;
pub mod config;
pub mod dialect;
pub mod error;
pub mod param;
pub mod predicate;
pub mod statement;
pub mod value;

mod trace;

pub use client::GenericClient;
pub use config::{BuilderConfig, DialectKind};
pub use dialect::{Dialect, MySql, Postgres};
pub use error::{Error, Result};
pub use param::ParamContext;
pub use predicate::{Condition, Connector, Operand, Operator, PredicateBuilder};
pub use statement::{BuiltQuery, JoinKind, Order, Statement};
pub use value::Value;

/// Start a Postgres SELECT over `table`.
pub fn select(table: &str) -> Statement {
    Statement::new(table)
}

//! Executor boundary.
//!
//! sqlweave only builds statements. This module is the thin seam where a
//! [`BuiltQuery`] meets a tokio-postgres connection: SQL and parameters are
//! passed through exactly as built, in order, with nothing re-ordered or
//! filtered.

use crate::error::{Error, Result};
use crate::statement::{BuiltQuery, Statement};
use crate::trace;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait that unifies database clients and transactions.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = Result<Vec<Row>>> + Send;

    /// Execute a statement and return the affected row count.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        Ok(tokio_postgres::Client::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        Ok(tokio_postgres::Client::execute(self, sql, params).await?)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        Ok(tokio_postgres::Transaction::query(self, sql, params).await?)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        Ok(tokio_postgres::Transaction::execute(self, sql, params).await?)
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql, params).await
    }
}

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        (*self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        (*self).execute(sql, params).await
    }
}

/// Dialect name the tokio-postgres executors expect.
const EXECUTOR_DIALECT: &str = "postgres";

impl BuiltQuery {
    /// Fail before any I/O if the SQL was rendered for another dialect.
    pub fn ensure_dialect(&self, expected: &'static str) -> Result<()> {
        if self.dialect() != expected {
            return Err(Error::DialectMismatch {
                expected,
                found: self.dialect(),
            });
        }
        Ok(())
    }

    /// Run the query and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> Result<Vec<Row>> {
        self.ensure_dialect(EXECUTOR_DIALECT)?;
        trace::sql_event("executing query", self.dialect(), &self.sql, self.params.len());
        conn.query(&self.sql, &self.params_ref()).await
    }

    /// Run the query and return the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl GenericClient) -> Result<Option<Row>> {
        let rows = self.fetch_all(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// Run the statement and return the affected row count.
    pub async fn execute(&self, conn: &impl GenericClient) -> Result<u64> {
        self.ensure_dialect(EXECUTOR_DIALECT)?;
        trace::sql_event("executing statement", self.dialect(), &self.sql, self.params.len());
        conn.execute(&self.sql, &self.params_ref()).await
    }
}

impl Statement {
    /// Build and run the query, returning all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> Result<Vec<Row>> {
        self.build().fetch_all(conn).await
    }

    /// Build and run the query, returning the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl GenericClient) -> Result<Option<Row>> {
        self.build().fetch_opt(conn).await
    }

    /// Build and run `SELECT COUNT(*)` over this statement.
    pub async fn fetch_count(&self, conn: &impl GenericClient) -> Result<i64> {
        let rows = self.count().build().fetch_all(conn).await?;
        match rows.first() {
            Some(row) => Ok(row.try_get(0)?),
            None => Ok(0),
        }
    }
}

//! Error types for sqlweave

use thiserror::Error;

/// Result type alias for sqlweave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while assembling or executing a statement.
///
/// Builder errors (`InvalidOperator`, `InvalidOperand`, `TypeMismatch`) are
/// raised by the call that breaks the contract, never deferred to `build()`.
#[derive(Debug, Error)]
pub enum Error {
    /// Operator outside the comparison allow-list
    #[error("Invalid operator: '{0}'")]
    InvalidOperator(String),

    /// Operand has the wrong shape for its operator
    #[error("Invalid operand for {operator}: expected {expected}")]
    InvalidOperand {
        operator: String,
        expected: &'static str,
    },

    /// A column, alias or CTE specifier is not a usable name
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Dialect name not recognised while parsing configuration
    #[error("Unknown dialect: '{0}'")]
    UnknownDialect(String),

    /// A statement rendered for one dialect was sent to a driver for another
    #[error("Dialect mismatch: executor expects {expected}, statement was built for {found}")]
    DialectMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl Error {
    /// Create an invalid operand error
    pub fn invalid_operand(operator: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidOperand {
            operator: operator.into(),
            expected,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    /// Check if this is an invalid operator error
    pub fn is_invalid_operator(&self) -> bool {
        matches!(self, Self::InvalidOperator(_))
    }

    /// Check if this is an invalid operand error
    pub fn is_invalid_operand(&self) -> bool {
        matches!(self, Self::InvalidOperand { .. })
    }

    /// Check if this is a type mismatch error
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

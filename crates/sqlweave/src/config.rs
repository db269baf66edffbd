use crate::dialect::{Dialect, MySql, Postgres};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in dialect selector, suitable for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// `$n` placeholders, double-quoted identifiers.
    #[default]
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    /// `?` placeholders, back-tick identifiers.
    #[serde(alias = "mariadb")]
    MySql,
}

impl DialectKind {
    /// Instantiate the dialect.
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Postgres => Arc::new(Postgres),
            DialectKind::MySql => Arc::new(MySql),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgres",
            DialectKind::MySql => "mysql",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            _ => Err(Error::UnknownDialect(s.to_string())),
        }
    }
}

/// Defaults applied to statements created via [`Statement::with_config`](crate::Statement::with_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Dialect used to render placeholders and quote identifiers.
    pub dialect: DialectKind,
    /// LIMIT applied when a statement does not set one. `None` means unbounded.
    pub default_limit: Option<u64>,
}

impl BuilderConfig {
    /// Create a configuration with defaults (Postgres, no default limit).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dialect.
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the LIMIT used when a statement leaves it unset.
    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dialect_names() {
        assert_eq!("PostgreSQL".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!(" mariadb ".parse::<DialectKind>().unwrap(), DialectKind::MySql);
        let err = "oracle".parse::<DialectKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownDialect(ref s) if s == "oracle"));
    }

    #[test]
    fn deserializes_config_with_aliases() {
        let cfg: BuilderConfig =
            serde_json::from_str(r#"{"dialect":"pg","default_limit":50}"#).unwrap();
        assert_eq!(cfg, BuilderConfig::new().with_default_limit(50));

        let cfg: BuilderConfig = serde_json::from_str(r#"{"dialect":"mysql"}"#).unwrap();
        assert_eq!(cfg.dialect, DialectKind::MySql);
        assert_eq!(cfg.default_limit, None);
    }

    #[test]
    fn kind_maps_to_dialect() {
        assert_eq!(DialectKind::MySql.dialect().placeholder(3), "?");
        assert_eq!(DialectKind::Postgres.dialect().name(), "postgres");
        assert_eq!(DialectKind::MySql.to_string(), "mysql");
    }
}

//! SQL dialects: placeholder syntax and identifier quoting.
//!
//! A [`Dialect`] is a pair of pure functions. The engine never assumes that
//! placeholders carry their index: [`MySql`] returns `?` for every position, so
//! parameter order alone decides which value binds where.

use std::fmt::Debug;

/// Placeholder and identifier rules for one SQL engine.
pub trait Dialect: Debug + Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Placeholder token for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Quote an identifier without changing what it refers to.
    ///
    /// Dotted names are quoted per segment and a bare `*` segment is kept as is,
    /// so `t.*` stays a wildcard over `t`.
    fn wrap_identifier(&self, name: &str) -> String;
}

/// Quote each `.`-separated segment with `quote`, doubling embedded quotes.
fn wrap_segments(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for (i, seg) in name.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        if seg == "*" {
            out.push('*');
            continue;
        }
        out.push(quote);
        for ch in seg.chars() {
            if ch == quote {
                out.push(quote);
            }
            out.push(ch);
        }
        out.push(quote);
    }
    out
}

/// PostgreSQL: `$1, $2, ...` placeholders and `"double quoted"` identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn wrap_identifier(&self, name: &str) -> String {
        wrap_segments(name, '"')
    }
}

/// MySQL / MariaDB: `?` placeholders and `` `back-tick` `` identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn wrap_identifier(&self, name: &str) -> String {
        wrap_segments(name, '`')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_placeholders_are_indexed() {
        assert_eq!(Postgres.placeholder(1), "$1");
        assert_eq!(Postgres.placeholder(12), "$12");
    }

    #[test]
    fn mysql_placeholder_is_fixed() {
        assert_eq!(MySql.placeholder(1), "?");
        assert_eq!(MySql.placeholder(99), "?");
    }

    #[test]
    fn wraps_dotted_identifiers_per_segment() {
        assert_eq!(Postgres.wrap_identifier("public.users"), r#""public"."users""#);
        assert_eq!(MySql.wrap_identifier("shop.orders"), "`shop`.`orders`");
    }

    #[test]
    fn keeps_wildcard_segment() {
        assert_eq!(Postgres.wrap_identifier("u.*"), r#""u".*"#);
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(Postgres.wrap_identifier(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(MySql.wrap_identifier("back`tick"), "`back``tick`");
    }
}

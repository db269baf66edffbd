//! `tracing` integration (enabled by the default `tracing` feature).

/// Longest SQL prefix (in bytes) written to a log event.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) const MAX_LOGGED_SQL: usize = 200;

/// Truncate `sql` to at most `max_bytes`, backing off to a char boundary.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(feature = "tracing")]
pub(crate) fn sql_event(message: &'static str, dialect: &'static str, sql: &str, params: usize) {
    let shown = truncate_sql_bytes(sql, MAX_LOGGED_SQL);
    let truncated = shown.len() < sql.len();
    tracing::debug!(
        target: "sqlweave.sql",
        dialect,
        params,
        truncated,
        sql = %shown,
        "{}",
        message
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn sql_event(_message: &'static str, _dialect: &'static str, _sql: &str, _params: usize) {}

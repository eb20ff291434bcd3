//! Connection URL resolution.

use crate::error::{ConnError, ConnResult};

const JDBC_PREFIX: &str = "jdbc:sqlite:/";
const PLAIN_PREFIX: &str = "sqlite:/";

/// Resolves a connection URL to a database path.
///
/// Exactly two prefixes are accepted; the resolved path keeps its
/// leading slash, so `sqlite:/tmp/a.db` and `jdbc:sqlite:/tmp/a.db`
/// both yield `/tmp/a.db`. Any other form fails before any engine
/// call.
pub(crate) fn resolve_path(url: &str) -> ConnResult<&str> {
    if url.starts_with(JDBC_PREFIX) {
        Ok(&url[JDBC_PREFIX.len() - 1..])
    } else if url.starts_with(PLAIN_PREFIX) {
        Ok(&url[PLAIN_PREFIX.len() - 1..])
    } else {
        Err(ConnError::unsupported_url(url))
    }
}

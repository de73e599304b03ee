//! Identifier rules for names that end up spliced into SQL.
//!
//! Bind parameters cannot stand in for identifiers (schema names, type
//! names), so the few identifiers that come from configuration are checked
//! against a conservative pattern before use.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum identifier length accepted by PostgreSQL (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Lowercase ASCII letter or underscore, then letters, digits, underscores.
const IDENTIFIER_PATTERN: &str = r"^[a-z_][a-z0-9_]*$";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("valid regex"));

/// Validate a schema name taken from configuration.
pub fn validate_schema_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "schema name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::Validation(format!(
            "schema name '{name}' exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(CoreError::Validation(format!(
            "schema name '{name}' must match {IDENTIFIER_PATTERN}"
        )));
    }
    Ok(())
}

//! Table, column and key naming
//!
//! Every name that reaches SQL is derived here. Derivations are pure and
//! deterministic: the same logical name always yields the same identifier,
//! so a child table can be located again later from its parent table and
//! field name alone.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_IDENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

static UNDERSCORE_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

/// Strip every character outside `[A-Za-z0-9_]`, keeping the survivors in order
pub fn sanitize_identifier(raw: &str) -> String {
    NON_IDENT_REGEX.replace_all(raw, "").into_owned()
}

/// Sanitize a field name for use as a column, rejecting names that vanish
pub fn column_name(table: &str, raw: &str) -> Result<String> {
    let name = sanitize_identifier(raw);
    if name.is_empty() {
        return Err(Error::InvalidIdentifier {
            table: table.to_string(),
            raw: raw.to_string(),
        });
    }
    Ok(name)
}

/// `{parent}_{field}` with the field sanitized
pub fn derive_child_table_name(parent: &str, field: &str) -> String {
    format!("{}_{}", parent, sanitize_identifier(field))
}

/// `{parent}_id`
pub fn derive_foreign_key_column(parent: &str) -> String {
    format!("{}_id", parent)
}

/// Table name for an API endpoint, e.g. `GET /users/{id}/posts` -> `get_users_id_posts`
pub fn derive_endpoint_table_name(path: &str, method: &str) -> String {
    let method = sanitize_identifier(&method.to_ascii_lowercase());
    let path = sanitize_identifier(&path.replace(['/', '-', '.'], "_"));
    let joined = format!("{}_{}", method, path);
    UNDERSCORE_RUN_REGEX
        .replace_all(&joined, "_")
        .trim_matches('_')
        .to_string()
}

/// Identity of a list element that has no id field of its own
pub fn child_identity(parent_identity: &str, field: &str, index: usize) -> String {
    format!("{}:{}:{}", parent_identity, field, index)
}

/// Sanitize a caller-supplied table name, rejecting names that vanish
pub fn table_name(raw: &str) -> Result<String> {
    let name = sanitize_identifier(raw);
    if name.is_empty() {
        return Err(Error::InvalidIdentifier {
            table: raw.to_string(),
            raw: raw.to_string(),
        });
    }
    Ok(name)
}

/// Double-quote an identifier for SQL.
///
/// Quoting keeps keywords and leading digits legal. Embedded quotes are
/// doubled, although engine-derived names never contain any.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

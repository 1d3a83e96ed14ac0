//! Deterministic storage names for entity identifiers.
//!
//! `owner/repo.name` becomes `owner-reponame`: slashes turn into dashes,
//! dots and whitespace are dropped, and anything else outside
//! `[A-Za-z0-9_-]` becomes `_`. Distinct identifiers can collide
//! (`a/b.c` and `a/bc`); they then share storage. This is a known
//! limitation and is not detected.

use anyhow::Result;

use crate::error::IngestError;

/// Derive the filesystem-safe storage key for an entity identifier.
pub fn storage_key(entity_id: &str) -> Result<String> {
    let mut key = String::with_capacity(entity_id.len());
    for c in entity_id.chars() {
        match c {
            '/' | '\\' => key.push('-'),
            '.' => {}
            c if c.is_whitespace() => {}
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => key.push(c),
            _ => key.push('_'),
        }
    }
    if key.is_empty() || key.chars().all(|c| c == '-') {
        return Err(IngestError::InvalidEntityId(entity_id.to_string()).into());
    }
    Ok(key)
}

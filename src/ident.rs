//! Identity scheme - deterministic, collision-resistant node identifiers
//!
//! Every entity id is a pure function of its defining coordinates
//! (relative path, name, declaration line), so re-extracting unchanged code
//! yields the same id across runs and machines. Moving a declaration to a
//! different line yields a different id.
//!
//! Format: `<prefix>_<12 hex chars of blake3>`, e.g. `fn_a1b2c3d4e5f6`.
//! File nodes are keyed by their relative path directly and have no hash.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the digest
const ID_HEX_LEN: usize = 12;

/// Opaque identifier for a graph node.
///
/// The string form is the primary key persisted in the store and the key
/// threaded through the impact engine's visited set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an identifier read back from the store
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hashed_id(prefix: &str, coordinates: &str) -> NodeId {
    let digest = blake3::hash(coordinates.as_bytes()).to_hex();
    NodeId(format!("{}_{}", prefix, &digest.as_str()[..ID_HEX_LEN]))
}

/// Id for a function: (relative path, name, start line)
pub fn function_id(file: &str, name: &str, line_start: u32) -> NodeId {
    hashed_id("fn", &format!("{file}::{name}::{line_start}"))
}

/// Id for a class: (relative path, name, start line)
pub fn class_id(file: &str, name: &str, line_start: u32) -> NodeId {
    hashed_id("cls", &format!("{file}::{name}::{line_start}"))
}

/// Id for a variable: (relative path, name, definition line)
pub fn variable_id(file: &str, name: &str, line: u32) -> NodeId {
    hashed_id("var", &format!("{file}::{name}::{line}"))
}

/// Id for an import: (relative path, imported name, line)
pub fn import_id(file: &str, imported_name: &str, line: u32) -> NodeId {
    hashed_id("imp", &format!("{file}::{imported_name}::{line}"))
}

/// Content fingerprint of a file's bytes.
///
/// The full blake3 hex digest. This is the sole staleness signal the
/// incremental indexer trusts; timestamps and sizes are never consulted.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_coordinates_same_id() {
        let a = function_id("src/auth.py", "validate_token", 42);
        let b = function_id("src/auth.py", "validate_token", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_line_move_changes_id() {
        let a = function_id("src/auth.py", "validate_token", 42);
        let b = function_id("src/auth.py", "validate_token", 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_prefixes_disambiguate() {
        // A function and a class at the same coordinates must not collide.
        let f = function_id("src/m.py", "Thing", 10);
        let c = class_id("src/m.py", "Thing", 10);
        assert_ne!(f, c);
        assert!(f.as_str().starts_with("fn_"));
        assert!(c.as_str().starts_with("cls_"));
    }

    #[test]
    fn test_id_shape() {
        let id = variable_id("a.py", "x", 1);
        let (prefix, hex) = id.as_str().split_once('_').unwrap();
        assert_eq!(prefix, "var");
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_tracks_content_only() {
        assert_eq!(fingerprint_bytes(b"def f(): pass"), fingerprint_bytes(b"def f(): pass"));
        assert_ne!(fingerprint_bytes(b"def f(): pass"), fingerprint_bytes(b"def f(): ..."));
    }
}

//! # Codetrace - Persistent code dependency graph
//!
//! Codetrace keeps a disk-resident property graph of a codebase consistent
//! under repeated partial re-indexing, and answers bounded-depth impact
//! queries over it ("who calls this, transitively, up to depth d").
//!
//! The crate provides:
//! - A typed fact model shared with external extractors
//! - Deterministic, collision-resistant identity hashes for code entities
//! - A SQLite-backed graph store with per-file atomic replace semantics
//! - An incremental indexer driven by content fingerprints
//! - A breadth-first impact engine with deterministic result ordering
//! - A bulk loader for cold-start population from pre-extracted facts
//!
//! Language-specific fact extraction is an external collaborator: it hands
//! the core a flat [`fact::FactBundle`] per file and is never re-validated.

pub mod bulk;
pub mod config;
pub mod fact;
pub mod ident;
pub mod impact;
pub mod indexer;
pub mod store;

// Re-exports for convenient access
pub use bulk::{BulkStats, load_dump};
pub use fact::{Extractor, FactBundle};
pub use ident::NodeId;
pub use impact::{Direction, ImpactAnalyzer, ImpactEntry};
pub use indexer::{FileStatus, FsSource, IndexOptions, IndexReport, IndexSource, Indexer, SourceFile};
pub use store::GraphStore;

use std::path::PathBuf;

/// Result type alias for codetrace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for codetrace operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{edge} edge references missing node {missing}")]
    ReferentialIntegrity { edge: &'static str, missing: String },

    #[error("schema version mismatch: database has {found}, this build expects {expected}")]
    SchemaVersion { found: String, expected: String },

    #[error("entity not found: {name} in {file}")]
    EntityNotFound { file: String, name: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("another writer holds the lock on {0}")]
    LockContention(PathBuf),

    #[error("store is open in read-only mode")]
    ReadOnly,

    #[error("extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

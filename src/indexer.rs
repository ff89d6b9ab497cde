//! Incremental indexing pipeline
//!
//! Extraction fans out across worker threads; every database write happens
//! on the coordinating thread, which owns the single writable store. Workers
//! send completed fact bundles over a channel and never touch SQLite.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::thread;

use crate::fact::{Extractor, FactBundle};
use crate::ident;
use crate::store::GraphStore;
use crate::{Error, Result};

/// One file offered to an indexing run
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Repository-relative path
    pub path: String,
    /// Language tag carried onto the File node
    pub language: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, language: impl Into<String>) -> Self {
        Self { path: path.into(), language: language.into() }
    }
}

/// Where the indexer gets source bytes from.
///
/// The seam keeps the pipeline off the filesystem: `files` names what to
/// index this run, `read` fetches one file's bytes. Implementations are
/// called from worker threads.
pub trait IndexSource: Sync {
    fn files(&self) -> Vec<SourceFile>;
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed source: relative paths resolved under a root directory
pub struct FsSource {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>, files: Vec<SourceFile>) -> Self {
        Self { root: root.into(), files }
    }
}

impl IndexSource for FsSource {
    fn files(&self) -> Vec<SourceFile> {
        self.files.clone()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.root.join(path))?)
    }
}

/// Lifecycle classification of a file within one indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    Modified,
    Unchanged,
    Removed,
}

/// Options controlling one indexing run
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Re-extract every file even when fingerprints match
    pub full_refresh: bool,
    /// Extraction worker threads
    pub workers: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            full_refresh: false,
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        }
    }
}

/// Per-file extraction failure carried in the run report
#[derive(Debug, Clone)]
pub struct IndexFailure {
    pub path: String,
    pub message: String,
}

/// Summary of one indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Files extracted and written (new or modified)
    pub processed: usize,
    /// Files skipped on a matching fingerprint
    pub skipped: usize,
    /// Previously indexed files no longer present
    pub removed: usize,
    /// Files whose extraction failed
    pub failed: usize,
    pub failures: Vec<IndexFailure>,
}

impl std::fmt::Display for IndexReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed, {} unchanged, {} removed, {} failed",
            self.processed, self.skipped, self.removed, self.failed
        )
    }
}

enum WorkerMessage {
    Extracted { bundle: Box<FactBundle>, status: FileStatus },
    Failed { path: String, message: String },
    Skipped,
}

/// Incremental indexer over a writable store and a pluggable extractor
pub struct Indexer<'a, E: Extractor> {
    store: &'a mut GraphStore,
    extractor: &'a E,
    options: IndexOptions,
}

impl<'a, E: Extractor> Indexer<'a, E> {
    pub fn new(store: &'a mut GraphStore, extractor: &'a E) -> Self {
        Self { store, extractor, options: IndexOptions::default() }
    }

    pub fn with_options(store: &'a mut GraphStore, extractor: &'a E, options: IndexOptions) -> Self {
        Self { store, extractor, options }
    }

    /// Index every file the source offers.
    ///
    /// Unchanged files are skipped on fingerprint match, previously indexed
    /// files the source no longer offers are deleted, and extraction
    /// failures keep the file's last-known-good subgraph.
    pub fn run(&mut self, source: &impl IndexSource) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let files = source.files();

        // Removal set: everything indexed before that the source dropped.
        let current: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .all_files()?
            .into_iter()
            .map(|f| f.path)
            .filter(|p| !current.contains(p.as_str()))
            .collect();

        // Fingerprint lookups happen up front on the coordinator so workers
        // stay connection-free.
        let mut known = HashMap::new();
        for file in &files {
            if let Some(fp) = self.store.file_fingerprint(&file.path)? {
                known.insert(file.path.clone(), fp);
            }
        }

        let workers = self.options.workers.max(1);
        let (tx, rx) = crossbeam::channel::unbounded::<WorkerMessage>();
        let (work_tx, work_rx) = crossbeam::channel::unbounded::<SourceFile>();
        for file in files {
            // Send only fails when all receivers are gone, which cannot
            // happen before the scope below spawns them.
            work_tx.send(file).map_err(|e| {
                Error::Extraction { path: e.0.path.clone(), message: "worker queue closed".to_string() }
            })?;
        }
        drop(work_tx);

        let extractor = self.extractor;
        let full_refresh = self.options.full_refresh;
        let known = &known;

        thread::scope(|scope| -> Result<()> {
            for _ in 0..workers {
                let tx = tx.clone();
                let work_rx = work_rx.clone();
                scope.spawn(move || {
                    for file in work_rx {
                        let msg = extract_one(extractor, source, &file, known, full_refresh);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Single writer: apply bundles as they arrive.
            for msg in rx {
                match msg {
                    WorkerMessage::Extracted { bundle, status } => {
                        self.store.replace_file_subgraph(&bundle)?;
                        tracing::info!(path = %bundle.path, ?status, "indexed file");
                        report.processed += 1;
                    }
                    WorkerMessage::Failed { path, message } => {
                        tracing::warn!(path = %path, %message, "extraction failed, keeping previous state");
                        report.failed += 1;
                        report.failures.push(IndexFailure { path, message });
                    }
                    WorkerMessage::Skipped => report.skipped += 1,
                }
            }
            Ok(())
        })?;

        for path in &stale {
            self.store.delete_file_subgraph(path)?;
            report.removed += 1;
        }

        tracing::info!(%report, "indexing run complete");
        Ok(report)
    }
}

fn extract_one<E: Extractor>(
    extractor: &E,
    source: &impl IndexSource,
    file: &SourceFile,
    known: &HashMap<String, String>,
    full_refresh: bool,
) -> WorkerMessage {
    let bytes = match source.read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return WorkerMessage::Failed { path: file.path.clone(), message: e.to_string() };
        }
    };
    let fingerprint = ident::fingerprint_bytes(&bytes);
    let status = match known.get(&file.path) {
        Some(prev) if *prev == fingerprint && !full_refresh => return WorkerMessage::Skipped,
        Some(_) => FileStatus::Modified,
        None => FileStatus::New,
    };
    match extractor.extract(&file.path, &bytes) {
        Ok(mut bundle) => {
            bundle.fingerprint = fingerprint;
            bundle.language = file.language.clone();
            WorkerMessage::Extracted { bundle: Box::new(bundle), status }
        }
        Err(e) => WorkerMessage::Failed { path: file.path.clone(), message: e.to_string() },
    }
}

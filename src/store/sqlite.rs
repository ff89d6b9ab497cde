//! SQLite-backed graph store
//!
//! Single-writer/multiple-reader discipline: the writer takes a sidecar lock
//! file for its whole lifetime, readers open the database with SQLite's
//! read-only flag and are never blocked. Every per-file mutation is one
//! write transaction, so a reader observes either the pre-delete or the
//! post-reinsert state of a file's subgraph, never a half-deleted graph.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::schema::{self, SCHEMA_VERSION};
use crate::fact::{CallSite, CallTarget, ClassRecord, FactBundle, FunctionRecord, ImportRecord, VariableRecord, VariableUse};
use crate::ident::{self, NodeId};
use crate::{Error, Result};

/// Typed edge kinds exposed by [`GraphStore::neighbors`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Function -> function, carries the call-site line
    Calls,
    /// Function -> variable, carries the reference line
    References,
    /// Function -> owning class
    MethodOf,
    /// Class -> base class
    Inherits,
}

/// Direction of an edge traversal relative to the given node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// Plain record returned from traversal lookups - never an internal handle.
///
/// For `Calls` and `References` the `line` is the edge's own line property
/// (call site / reference site); for the structural kinds it is the
/// neighbor's declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborRecord {
    pub id: NodeId,
    pub name: String,
    pub file: String,
    pub line: u32,
}

/// A file node row
#[derive(Debug, Clone)]
pub struct FileRow {
    pub path: String,
    pub language: String,
    pub fingerprint: String,
}

/// A function node row
#[derive(Debug, Clone)]
pub struct FunctionRow {
    pub id: NodeId,
    pub name: String,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_public: bool,
}

/// A class node row
#[derive(Debug, Clone)]
pub struct ClassRow {
    pub id: NodeId,
    pub name: String,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub bases: Vec<String>,
    pub is_public: bool,
}

/// A variable node row
#[derive(Debug, Clone)]
pub struct VariableRow {
    pub id: NodeId,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub scope: String,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub files: usize,
    pub functions: usize,
    pub classes: usize,
    pub variables: usize,
    pub imports: usize,
    pub call_edges: usize,
    pub unresolved_call_edges: usize,
    pub var_ref_edges: usize,
    pub import_edges: usize,
    pub method_edges: usize,
    pub inherit_edges: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(
            f,
            "  Nodes: {} functions, {} classes, {} variables, {} imports",
            self.functions, self.classes, self.variables, self.imports
        )?;
        writeln!(
            f,
            "  Call edges: {} ({} unresolved)",
            self.call_edges, self.unresolved_call_edges
        )?;
        write!(
            f,
            "  Other edges: {} references, {} imports, {} method-of, {} inherits",
            self.var_ref_edges, self.import_edges, self.method_edges, self.inherit_edges
        )
    }
}

/// Exclusive writer lock, held for the lifetime of a read-write store.
///
/// A second writer fails immediately with `LockContention`; there is no
/// blocking retry.
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(db_path: &Path) -> Result<Self> {
        let mut os = db_path.as_os_str().to_owned();
        os.push(".lock");
        let path = PathBuf::from(os);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::LockContention(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// SQLite-backed storage for the dependency graph
pub struct GraphStore {
    conn: Connection,
    read_only: bool,
    _lock: Option<WriterLock>,
}

impl GraphStore {
    /// Open a database file for writing (creates schema if absent).
    ///
    /// Fails with `LockContention` if another writer is alive, or with
    /// `SchemaVersion` if the on-disk schema does not match this build.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let lock = WriterLock::acquire(path)?;
        let conn = Connection::open(path)?;
        // WAL lets readers proceed against the last-committed state while a
        // write transaction is in flight.
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if has_meta_table(&conn)? {
            check_schema_version(&conn)?;
        } else {
            initialize_schema(&conn)?;
        }
        Ok(Self { conn, read_only: false, _lock: Some(lock) })
    }

    /// Open an existing database in read-only mode.
    ///
    /// Takes no writer lock; all mutating calls return `Error::ReadOnly`.
    /// The connection never observes writes committed after it opened a
    /// read transaction, so a second process can inspect the graph safely
    /// while a writer is active.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        if !has_meta_table(&conn)? {
            return Err(Error::SchemaVersion {
                found: "none".to_string(),
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        check_schema_version(&conn)?;
        Ok(Self { conn, read_only: true, _lock: None })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, read_only: false, _lock: None })
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only { Err(Error::ReadOnly) } else { Ok(()) }
    }

    pub(crate) fn transaction(&mut self) -> Result<rusqlite::Transaction<'_>> {
        self.check_writable()?;
        Ok(self.conn.transaction()?)
    }

    // ========== Subgraph Mutation ==========

    /// Atomically replace a file's whole subgraph with a fresh fact bundle.
    ///
    /// One write transaction spans delete-old + insert-new: nodes are
    /// inserted strictly before the edges that reference them, and inbound
    /// call/import edges from other files are re-linked against the new
    /// nodes before commit.
    pub fn replace_file_subgraph(&mut self, bundle: &FactBundle) -> Result<()> {
        let tx = self.transaction()?;
        delete_subgraph_rows(&tx, &bundle.path)?;
        insert_bundle_rows(&tx, bundle)?;
        tx.commit()?;
        tracing::debug!(path = %bundle.path, "replaced file subgraph");
        Ok(())
    }

    /// Delete a file's subgraph: the File node, every node it contains and
    /// every edge touching those nodes. Inbound call edges from other files
    /// are downgraded to dead ends rather than left dangling.
    pub fn delete_file_subgraph(&mut self, path: &str) -> Result<()> {
        let tx = self.transaction()?;
        delete_subgraph_rows(&tx, path)?;
        tx.commit()?;
        tracing::debug!(path, "deleted file subgraph");
        Ok(())
    }

    // ========== Node Lookups ==========

    /// Stored content fingerprint for a file, if the file is indexed
    pub fn file_fingerprint(&self, path: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT fingerprint FROM files WHERE path = ?1", [path], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// All indexed files
    pub fn all_files(&self) -> Result<Vec<FileRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, language, fingerprint FROM files ORDER BY path")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FileRow { path: row.get(0)?, language: row.get(1)?, fingerprint: row.get(2)? })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// First function matching (file, name), lowest declaration line
    pub fn function_by_key(&self, file: &str, name: &str) -> Result<Option<FunctionRow>> {
        Ok(self.functions_by_key(file, name)?.into_iter().next())
    }

    /// Every function matching (file, name), e.g. conditional redefinitions
    pub fn functions_by_key(&self, file: &str, name: &str) -> Result<Vec<FunctionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, file, line_start, line_end, is_public FROM functions
             WHERE file = ?1 AND name = ?2 ORDER BY line_start",
        )?;
        let rows = stmt
            .query_map(params![file, name], row_to_function)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All functions defined in a file, in declaration order
    pub fn functions_in_file(&self, file: &str) -> Result<Vec<FunctionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, file, line_start, line_end, is_public FROM functions
             WHERE file = ?1 ORDER BY line_start",
        )?;
        let rows = stmt
            .query_map([file], row_to_function)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// First class matching (file, name), lowest declaration line
    pub fn class_by_key(&self, file: &str, name: &str) -> Result<Option<ClassRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, file, line_start, line_end, bases, is_public FROM classes
                 WHERE file = ?1 AND name = ?2 ORDER BY line_start LIMIT 1",
                params![file, name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, bool>(6)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, name, file, line_start, line_end, bases, is_public)) => Ok(Some(ClassRow {
                id: NodeId::from_raw(id),
                name,
                file,
                line_start,
                line_end,
                bases: serde_json::from_str(&bases)?,
                is_public,
            })),
            None => Ok(None),
        }
    }

    /// Variable by its defining coordinates
    pub fn variable_by_key(&self, file: &str, name: &str, line: u32) -> Result<Option<VariableRow>> {
        let id = ident::variable_id(file, name, line);
        self.conn
            .query_row(
                "SELECT id, name, file, line, scope FROM variables WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok(VariableRow {
                        id: NodeId::from_raw(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        file: row.get(2)?,
                        line: row.get(3)?,
                        scope: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    // ========== Traversal Primitives ==========

    /// Typed one-hop neighbor lookup.
    ///
    /// For `Calls`, unresolved and pending edges are dead ends and never
    /// produce a neighbor.
    pub fn neighbors(
        &self,
        id: &NodeId,
        kind: EdgeKind,
        direction: EdgeDirection,
    ) -> Result<Vec<NeighborRecord>> {
        use EdgeDirection::*;
        use EdgeKind::*;
        let sql = match (kind, direction) {
            (Calls, Outgoing) => {
                "SELECT f.id, f.name, f.file, c.call_line FROM calls c
                 JOIN functions f ON f.id = c.callee_id
                 WHERE c.caller_id = ?1
                 ORDER BY f.file, f.name, c.call_line"
            }
            (Calls, Incoming) => {
                "SELECT f.id, f.name, f.file, c.call_line FROM calls c
                 JOIN functions f ON f.id = c.caller_id
                 WHERE c.callee_id = ?1
                 ORDER BY f.file, f.name, c.call_line"
            }
            (References, Outgoing) => {
                "SELECT v.id, v.name, v.file, r.line FROM var_refs r
                 JOIN variables v ON v.id = r.variable_id
                 WHERE r.function_id = ?1
                 ORDER BY v.file, v.name, r.line"
            }
            (References, Incoming) => {
                "SELECT f.id, f.name, f.file, r.line FROM var_refs r
                 JOIN functions f ON f.id = r.function_id
                 WHERE r.variable_id = ?1
                 ORDER BY f.file, f.name, r.line"
            }
            (MethodOf, Outgoing) => {
                "SELECT c.id, c.name, c.file, c.line_start FROM method_of m
                 JOIN classes c ON c.id = m.class_id
                 WHERE m.function_id = ?1
                 ORDER BY c.file, c.name"
            }
            (MethodOf, Incoming) => {
                "SELECT f.id, f.name, f.file, f.line_start FROM method_of m
                 JOIN functions f ON f.id = m.function_id
                 WHERE m.class_id = ?1
                 ORDER BY f.file, f.line_start"
            }
            (Inherits, Outgoing) => {
                "SELECT p.id, p.name, p.file, p.line_start FROM inherits i
                 JOIN classes p ON p.id = i.parent_id
                 WHERE i.class_id = ?1
                 ORDER BY p.file, p.name"
            }
            (Inherits, Incoming) => {
                "SELECT c.id, c.name, c.file, c.line_start FROM inherits i
                 JOIN classes c ON c.id = i.class_id
                 WHERE i.parent_id = ?1
                 ORDER BY c.file, c.name"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([id.as_str()], row_to_neighbor)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct functions adjacent to `id` over resolved call edges,
    /// reported with their declaration line. Multiple call sites between the
    /// same pair collapse to one record.
    pub fn call_adjacent(&self, id: &NodeId, direction: EdgeDirection) -> Result<Vec<NeighborRecord>> {
        let sql = match direction {
            EdgeDirection::Outgoing => {
                "SELECT DISTINCT f.id, f.name, f.file, f.line_start FROM calls c
                 JOIN functions f ON f.id = c.callee_id
                 WHERE c.caller_id = ?1
                 ORDER BY f.file, f.name"
            }
            EdgeDirection::Incoming => {
                "SELECT DISTINCT f.id, f.name, f.file, f.line_start FROM calls c
                 JOIN functions f ON f.id = c.caller_id
                 WHERE c.callee_id = ?1
                 ORDER BY f.file, f.name"
            }
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([id.as_str()], row_to_neighbor)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Functions that read a variable (context 'use' only, defines excluded)
    pub fn variable_uses(&self, variable_id: &NodeId) -> Result<Vec<NeighborRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, f.file, r.line FROM var_refs r
             JOIN functions f ON f.id = r.function_id
             WHERE r.variable_id = ?1 AND r.context = 'use'
             ORDER BY f.file, f.name, r.line",
        )?;
        let rows = stmt
            .query_map([variable_id.as_str()], row_to_neighbor)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ========== Statistics ==========

    fn count(&self, sql: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Get database statistics
    pub fn statistics(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            files: self.count("SELECT COUNT(*) FROM files")?,
            functions: self.count("SELECT COUNT(*) FROM functions")?,
            classes: self.count("SELECT COUNT(*) FROM classes")?,
            variables: self.count("SELECT COUNT(*) FROM variables")?,
            imports: self.count("SELECT COUNT(*) FROM imports")?,
            call_edges: self.count("SELECT COUNT(*) FROM calls")?,
            unresolved_call_edges: self
                .count("SELECT COUNT(*) FROM calls WHERE resolution = 'unresolved'")?,
            var_ref_edges: self.count("SELECT COUNT(*) FROM var_refs")?,
            import_edges: self.count("SELECT COUNT(*) FROM file_imports")?,
            method_edges: self.count("SELECT COUNT(*) FROM method_of")?,
            inherit_edges: self.count("SELECT COUNT(*) FROM inherits")?,
        })
    }
}

fn row_to_function(row: &rusqlite::Row) -> rusqlite::Result<FunctionRow> {
    Ok(FunctionRow {
        id: NodeId::from_raw(row.get::<_, String>(0)?),
        name: row.get(1)?,
        file: row.get(2)?,
        line_start: row.get(3)?,
        line_end: row.get(4)?,
        is_public: row.get(5)?,
    })
}

fn row_to_neighbor(row: &rusqlite::Row) -> rusqlite::Result<NeighborRecord> {
    Ok(NeighborRecord {
        id: NodeId::from_raw(row.get::<_, String>(0)?),
        name: row.get(1)?,
        file: row.get(2)?,
        line: row.get(3)?,
    })
}

// ========== Schema Creation & Versioning ==========

fn has_meta_table(conn: &Connection) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
        [],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    for stmt in schema::all_schema_statements() {
        conn.execute(stmt, [])?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

fn check_schema_version(conn: &Connection) -> Result<()> {
    let found: Option<String> = conn
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()?;
    let found = found.unwrap_or_else(|| "none".to_string());
    if found != SCHEMA_VERSION {
        return Err(Error::SchemaVersion { found, expected: SCHEMA_VERSION.to_string() });
    }
    Ok(())
}

// ========== Row-Level Operations ==========
//
// These run inside a caller-supplied transaction. Both the per-file replace
// path and the bulk loader go through them, so referential checks are
// applied uniformly.

fn function_exists(conn: &Connection, id: &NodeId) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM functions WHERE id = ?1",
        [id.as_str()],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn variable_exists(conn: &Connection, id: &NodeId) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM variables WHERE id = ?1",
        [id.as_str()],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub(crate) fn upsert_file_row(
    conn: &Connection,
    path: &str,
    language: &str,
    fingerprint: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO files (path, language, fingerprint, indexed_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![path, language, fingerprint],
    )?;
    Ok(())
}

pub(crate) fn insert_function_row(conn: &Connection, rec: &FunctionRecord) -> Result<NodeId> {
    let id = ident::function_id(&rec.file, &rec.name, rec.line_start);
    conn.execute(
        "INSERT OR REPLACE INTO functions (id, name, file, line_start, line_end, is_public, source, parent_class)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.as_str(),
            rec.name,
            rec.file,
            rec.line_start,
            rec.line_end,
            rec.is_public,
            rec.source,
            rec.parent_class,
        ],
    )?;
    Ok(id)
}

pub(crate) fn insert_class_row(conn: &Connection, rec: &ClassRecord) -> Result<NodeId> {
    let id = ident::class_id(&rec.file, &rec.name, rec.line_start);
    let bases = serde_json::to_string(&rec.bases)?;
    conn.execute(
        "INSERT OR REPLACE INTO classes (id, name, file, line_start, line_end, bases, is_public, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.as_str(),
            rec.name,
            rec.file,
            rec.line_start,
            rec.line_end,
            bases,
            rec.is_public,
            rec.source,
        ],
    )?;
    Ok(id)
}

pub(crate) fn insert_variable_row(conn: &Connection, rec: &VariableRecord) -> Result<NodeId> {
    let id = ident::variable_id(&rec.file, &rec.name, rec.line);
    conn.execute(
        "INSERT OR REPLACE INTO variables (id, name, file, line, scope)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id.as_str(), rec.name, rec.file, rec.line, rec.scope.as_tag()],
    )?;
    Ok(id)
}

pub(crate) fn insert_import_row(conn: &Connection, file: &str, rec: &ImportRecord) -> Result<NodeId> {
    let id = ident::import_id(file, &rec.imported_name, rec.line);
    conn.execute(
        "INSERT OR REPLACE INTO imports (id, imported_name, import_type, alias, line, is_relative, is_direct, target_file, file)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id.as_str(),
            rec.imported_name,
            rec.import_type,
            rec.alias,
            rec.line,
            rec.is_relative,
            rec.is_direct,
            rec.target_file,
            file,
        ],
    )?;
    Ok(id)
}

/// Insert one call edge. The caller endpoint must already exist; `Absent`
/// targets are dropped; `Unresolved` targets and resolved targets whose file
/// is not currently indexed persist as dead-end edges (NULL callee).
pub(crate) fn insert_call_row(conn: &Connection, file: &str, site: &CallSite) -> Result<()> {
    let caller = ident::function_id(file, &site.caller_name, site.caller_line);
    if !function_exists(conn, &caller)? {
        return Err(Error::ReferentialIntegrity { edge: "calls", missing: caller.to_string() });
    }
    match &site.callee {
        CallTarget::Absent => Ok(()),
        CallTarget::Unresolved { name } => {
            conn.execute(
                "INSERT INTO calls (caller_id, callee_id, callee_file, callee_name, call_line, resolution)
                 VALUES (?1, NULL, NULL, ?2, ?3, 'unresolved')",
                params![caller.as_str(), name, site.call_line],
            )?;
            Ok(())
        }
        CallTarget::Resolved { file: callee_file, name, .. } => {
            let callee_id: Option<String> = conn
                .query_row(
                    "SELECT id FROM functions WHERE file = ?1 AND name = ?2 ORDER BY line_start LIMIT 1",
                    params![callee_file, name],
                    |row| row.get(0),
                )
                .optional()?;
            conn.execute(
                "INSERT INTO calls (caller_id, callee_id, callee_file, callee_name, call_line, resolution)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'resolved')",
                params![caller.as_str(), callee_id, callee_file, name, site.call_line],
            )?;
            Ok(())
        }
    }
}

/// Insert one variable-reference edge. Both endpoints must already exist.
pub(crate) fn insert_var_ref_row(conn: &Connection, file: &str, vu: &VariableUse) -> Result<()> {
    let function = ident::function_id(file, &vu.function_name, vu.function_line);
    if !function_exists(conn, &function)? {
        return Err(Error::ReferentialIntegrity { edge: "references", missing: function.to_string() });
    }
    let variable = ident::variable_id(file, &vu.variable_name, vu.variable_line);
    if !variable_exists(conn, &variable)? {
        return Err(Error::ReferentialIntegrity { edge: "references", missing: variable.to_string() });
    }
    conn.execute(
        "INSERT INTO var_refs (function_id, variable_id, line, context)
         VALUES (?1, ?2, ?3, ?4)",
        params![function.as_str(), variable.as_str(), vu.line, vu.context.as_str()],
    )?;
    Ok(())
}

/// Derive method_of edges for functions of `file` from their parent_class.
/// An unmatched parent name yields no edge; the fact stays on the node.
pub(crate) fn link_method_edges_for_file(conn: &Connection, file: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO method_of (function_id, class_id)
         SELECT f.id, c.id FROM functions f
         JOIN classes c ON c.file = f.file AND c.name = f.parent_class
         WHERE f.file = ?1 AND f.parent_class IS NOT NULL",
        [file],
    )?;
    Ok(())
}

/// Derive inherits edges for classes of `file`, matching base names against
/// the serialized bases list. Bases are bare names, so the match is scoped
/// to the same file; an identically named class elsewhere must not link.
pub(crate) fn link_inherit_edges_for_file(conn: &Connection, file: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO inherits (class_id, parent_id)
         SELECT c.id, p.id FROM classes c
         JOIN classes p ON p.file = c.file
              AND instr(c.bases, '\"' || p.name || '\"') > 0 AND c.id != p.id
         WHERE c.file = ?1",
        [file],
    )?;
    Ok(())
}

/// Derive file-level import edges where either endpoint is `file`. Only
/// imports whose target File node exists produce an edge; the Import node
/// keeps the fact either way.
pub(crate) fn link_import_edges_for_file(conn: &Connection, file: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO file_imports (src_path, dst_path, line, is_direct)
         SELECT i.file, i.target_file, i.line, i.is_direct FROM imports i
         JOIN files d ON d.path = i.target_file
         WHERE i.target_file IS NOT NULL AND (i.file = ?1 OR i.target_file = ?1)",
        [file],
    )?;
    Ok(())
}

/// Re-attach dead-end resolved calls whose target file just (re-)appeared.
pub(crate) fn relink_pending_calls_for_file(conn: &Connection, file: &str) -> Result<()> {
    conn.execute(
        "UPDATE calls SET callee_id = (
             SELECT id FROM functions f
             WHERE f.file = calls.callee_file AND f.name = calls.callee_name
             ORDER BY f.line_start LIMIT 1
         )
         WHERE callee_file = ?1 AND resolution = 'resolved' AND callee_id IS NULL",
        [file],
    )?;
    Ok(())
}

/// Delete every row owned by `path` plus every edge touching its nodes.
/// Inbound resolved calls from other files are downgraded to dead ends
/// (their callee_file/name re-link key survives on the row).
pub(crate) fn delete_subgraph_rows(conn: &Connection, path: &str) -> Result<()> {
    conn.execute(
        "UPDATE calls SET callee_id = NULL
         WHERE callee_id IN (SELECT id FROM functions WHERE file = ?1)
           AND caller_id NOT IN (SELECT id FROM functions WHERE file = ?1)",
        [path],
    )?;
    conn.execute(
        "DELETE FROM calls WHERE caller_id IN (SELECT id FROM functions WHERE file = ?1)",
        [path],
    )?;
    conn.execute(
        "DELETE FROM var_refs
         WHERE function_id IN (SELECT id FROM functions WHERE file = ?1)
            OR variable_id IN (SELECT id FROM variables WHERE file = ?1)",
        [path],
    )?;
    conn.execute(
        "DELETE FROM method_of
         WHERE function_id IN (SELECT id FROM functions WHERE file = ?1)
            OR class_id IN (SELECT id FROM classes WHERE file = ?1)",
        [path],
    )?;
    conn.execute(
        "DELETE FROM inherits
         WHERE class_id IN (SELECT id FROM classes WHERE file = ?1)
            OR parent_id IN (SELECT id FROM classes WHERE file = ?1)",
        [path],
    )?;
    conn.execute("DELETE FROM file_imports WHERE src_path = ?1 OR dst_path = ?1", [path])?;
    conn.execute("DELETE FROM imports WHERE file = ?1", [path])?;
    conn.execute("DELETE FROM variables WHERE file = ?1", [path])?;
    conn.execute("DELETE FROM functions WHERE file = ?1", [path])?;
    conn.execute("DELETE FROM classes WHERE file = ?1", [path])?;
    conn.execute("DELETE FROM files WHERE path = ?1", [path])?;
    Ok(())
}

/// Insert a complete fact bundle: the File node, then owned nodes, then the
/// edges that reference them, then re-link edges from other files.
pub(crate) fn insert_bundle_rows(conn: &Connection, bundle: &FactBundle) -> Result<()> {
    upsert_file_row(conn, &bundle.path, &bundle.language, &bundle.fingerprint)?;
    for class in &bundle.classes {
        insert_class_row(conn, class)?;
    }
    for function in &bundle.functions {
        insert_function_row(conn, function)?;
    }
    for variable in &bundle.variables {
        insert_variable_row(conn, variable)?;
    }
    for import in &bundle.imports {
        insert_import_row(conn, &bundle.path, import)?;
    }
    link_method_edges_for_file(conn, &bundle.path)?;
    link_inherit_edges_for_file(conn, &bundle.path)?;
    link_import_edges_for_file(conn, &bundle.path)?;
    for site in &bundle.calls {
        insert_call_row(conn, &bundle.path, site)?;
    }
    for vu in &bundle.variable_uses {
        insert_var_ref_row(conn, &bundle.path, vu)?;
    }
    relink_pending_calls_for_file(conn, &bundle.path)?;
    Ok(())
}

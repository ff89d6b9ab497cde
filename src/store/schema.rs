//! Database schema definitions
//!
//! The schema is fixed at database creation. Opening an on-disk store whose
//! recorded version differs from [`SCHEMA_VERSION`] fails fast; there is no
//! auto-migration.

/// Version stamp written into the `meta` table at creation time
pub const SCHEMA_VERSION: &str = "1";

/// SQL to create the meta table (schema version lives here)
pub const CREATE_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

/// SQL to create the files table.
///
/// `fingerprint` is the blake3 digest of the file bytes - the sole staleness
/// signal. `indexed_at` records when the row was last written; it is
/// informational only and never trusted.
pub const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    indexed_at TEXT NOT NULL
)
"#;

/// SQL to create the functions table
pub const CREATE_FUNCTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS functions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    file TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    is_public INTEGER NOT NULL,
    source TEXT,
    parent_class TEXT
)
"#;

/// SQL to create the classes table (`bases` is a JSON list of names)
pub const CREATE_CLASSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS classes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    file TEXT NOT NULL,
    line_start INTEGER NOT NULL,
    line_end INTEGER NOT NULL,
    bases TEXT NOT NULL,
    is_public INTEGER NOT NULL,
    source TEXT
)
"#;

/// SQL to create the variables table
pub const CREATE_VARIABLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS variables (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    file TEXT NOT NULL,
    line INTEGER NOT NULL,
    scope TEXT NOT NULL
)
"#;

/// SQL to create the imports table.
///
/// `target_file` is kept on the node so the file-level IMPORTS edge can be
/// re-derived whenever either endpoint file is (re-)indexed.
pub const CREATE_IMPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS imports (
    id TEXT PRIMARY KEY,
    imported_name TEXT NOT NULL,
    import_type TEXT NOT NULL,
    alias TEXT,
    line INTEGER NOT NULL,
    is_relative INTEGER NOT NULL,
    is_direct INTEGER NOT NULL,
    target_file TEXT,
    file TEXT NOT NULL
)
"#;

/// SQL to create the calls edge table.
///
/// `callee_id` is NULL for dead-end edges: calls the extractor could not
/// resolve (`resolution = 'unresolved'`), and resolved calls whose target
/// file is not currently indexed. `callee_file`/`callee_name` are kept on
/// the row so a later re-index of the target file can re-link the edge.
pub const CREATE_CALLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caller_id TEXT NOT NULL,
    callee_id TEXT,
    callee_file TEXT,
    callee_name TEXT NOT NULL,
    call_line INTEGER NOT NULL,
    resolution TEXT NOT NULL
)
"#;

/// SQL to create the var_refs edge table (function -> variable, with
/// `context` = 'use' or 'define')
pub const CREATE_VAR_REFS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS var_refs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    function_id TEXT NOT NULL,
    variable_id TEXT NOT NULL,
    line INTEGER NOT NULL,
    context TEXT NOT NULL
)
"#;

/// SQL to create the file_imports edge table (file -> file)
pub const CREATE_FILE_IMPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS file_imports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    src_path TEXT NOT NULL,
    dst_path TEXT NOT NULL,
    line INTEGER NOT NULL,
    is_direct INTEGER NOT NULL,
    UNIQUE(src_path, dst_path, line)
)
"#;

/// SQL to create the method_of edge table (function -> owning class)
pub const CREATE_METHOD_OF_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS method_of (
    function_id TEXT NOT NULL,
    class_id TEXT NOT NULL,
    UNIQUE(function_id, class_id)
)
"#;

/// SQL to create the inherits edge table (class -> base class)
pub const CREATE_INHERITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS inherits (
    class_id TEXT NOT NULL,
    parent_id TEXT NOT NULL,
    UNIQUE(class_id, parent_id)
)
"#;

/// SQL to create indexes.
///
/// Every owned node table is indexed on `file`: that column is the
/// containment relation and the deletion key for per-file subgraph replace.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_functions_file ON functions(file)",
    "CREATE INDEX IF NOT EXISTS idx_functions_file_name ON functions(file, name)",
    "CREATE INDEX IF NOT EXISTS idx_classes_file ON classes(file)",
    "CREATE INDEX IF NOT EXISTS idx_classes_name ON classes(name)",
    "CREATE INDEX IF NOT EXISTS idx_variables_file ON variables(file)",
    "CREATE INDEX IF NOT EXISTS idx_imports_file ON imports(file)",
    "CREATE INDEX IF NOT EXISTS idx_imports_target ON imports(target_file)",
    "CREATE INDEX IF NOT EXISTS idx_calls_caller ON calls(caller_id)",
    "CREATE INDEX IF NOT EXISTS idx_calls_callee ON calls(callee_id)",
    "CREATE INDEX IF NOT EXISTS idx_calls_callee_file ON calls(callee_file)",
    "CREATE INDEX IF NOT EXISTS idx_var_refs_function ON var_refs(function_id)",
    "CREATE INDEX IF NOT EXISTS idx_var_refs_variable ON var_refs(variable_id)",
    "CREATE INDEX IF NOT EXISTS idx_file_imports_src ON file_imports(src_path)",
    "CREATE INDEX IF NOT EXISTS idx_file_imports_dst ON file_imports(dst_path)",
    "CREATE INDEX IF NOT EXISTS idx_method_of_class ON method_of(class_id)",
    "CREATE INDEX IF NOT EXISTS idx_inherits_parent ON inherits(parent_id)",
];

/// All schema creation statements, in creation order
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_META_TABLE,
        CREATE_FILES_TABLE,
        CREATE_FUNCTIONS_TABLE,
        CREATE_CLASSES_TABLE,
        CREATE_VARIABLES_TABLE,
        CREATE_IMPORTS_TABLE,
        CREATE_CALLS_TABLE,
        CREATE_VAR_REFS_TABLE,
        CREATE_FILE_IMPORTS_TABLE,
        CREATE_METHOD_OF_TABLE,
        CREATE_INHERITS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

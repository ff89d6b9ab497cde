//! Bulk cold-start loader
//!
//! Populates an empty store from a directory of pre-extracted facts in
//! JSON-Lines form, one record per line:
//!
//! ```text
//! <dir>/nodes/files.jsonl      {"path", "language", "fingerprint"}
//! <dir>/nodes/classes.jsonl    class records
//! <dir>/nodes/functions.jsonl  function records
//! <dir>/nodes/variables.jsonl  variable records
//! <dir>/nodes/imports.jsonl    {"file"} + import record
//! <dir>/edges/calls.jsonl      {"file"} + call site
//! <dir>/edges/var_refs.jsonl   {"file"} + variable use
//! ```
//!
//! Nodes load strictly before edges and the whole load is one transaction,
//! so a referential failure leaves the store exactly as it was. Missing
//! files are treated as empty.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::fact::{CallSite, ClassRecord, FunctionRecord, ImportRecord, VariableRecord, VariableUse};
use crate::store::{self, GraphStore};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FileLine {
    path: String,
    language: String,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct ImportLine {
    file: String,
    #[serde(flatten)]
    record: ImportRecord,
}

#[derive(Debug, Deserialize)]
struct CallLine {
    file: String,
    #[serde(flatten)]
    site: CallSite,
}

#[derive(Debug, Deserialize)]
struct VarRefLine {
    file: String,
    #[serde(flatten)]
    site: VariableUse,
}

/// Counts of records loaded by one bulk run
#[derive(Debug, Clone, Default)]
pub struct BulkStats {
    pub files: usize,
    pub functions: usize,
    pub classes: usize,
    pub variables: usize,
    pub imports: usize,
    pub call_edges: usize,
    pub var_ref_edges: usize,
}

impl std::fmt::Display for BulkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} files, {} functions, {} classes, {} variables, {} imports, {} call edges, {} reference edges",
            self.files,
            self.functions,
            self.classes,
            self.variables,
            self.imports,
            self.call_edges,
            self.var_ref_edges
        )
    }
}

fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "dump file absent, treating as empty");
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Load a fact dump into the store in one transaction.
///
/// The target store is expected to be empty; loading on top of existing
/// data is rejected rather than merged.
pub fn load_dump(store: &mut GraphStore, dir: &Path) -> Result<BulkStats> {
    if store.statistics()?.files > 0 {
        return Err(Error::InvalidArgument(
            "bulk load requires an empty store".to_string(),
        ));
    }
    let nodes = dir.join("nodes");
    let edges = dir.join("edges");

    let files: Vec<FileLine> = read_lines(&nodes.join("files.jsonl"))?;
    let classes: Vec<ClassRecord> = read_lines(&nodes.join("classes.jsonl"))?;
    let functions: Vec<FunctionRecord> = read_lines(&nodes.join("functions.jsonl"))?;
    let variables: Vec<VariableRecord> = read_lines(&nodes.join("variables.jsonl"))?;
    let imports: Vec<ImportLine> = read_lines(&nodes.join("imports.jsonl"))?;
    let calls: Vec<CallLine> = read_lines(&edges.join("calls.jsonl"))?;
    let var_refs: Vec<VarRefLine> = read_lines(&edges.join("var_refs.jsonl"))?;

    let mut stats = BulkStats::default();
    let tx = store.transaction()?;
    for f in &files {
        store::upsert_file_row(&tx, &f.path, &f.language, &f.fingerprint)?;
        stats.files += 1;
    }
    for c in &classes {
        store::insert_class_row(&tx, c)?;
        stats.classes += 1;
    }
    for f in &functions {
        store::insert_function_row(&tx, f)?;
        stats.functions += 1;
    }
    for v in &variables {
        store::insert_variable_row(&tx, v)?;
        stats.variables += 1;
    }
    for i in &imports {
        store::insert_import_row(&tx, &i.file, &i.record)?;
        stats.imports += 1;
    }
    for f in &files {
        store::link_method_edges_for_file(&tx, &f.path)?;
        store::link_inherit_edges_for_file(&tx, &f.path)?;
        store::link_import_edges_for_file(&tx, &f.path)?;
    }
    for c in &calls {
        store::insert_call_row(&tx, &c.file, &c.site)?;
        stats.call_edges += 1;
    }
    for r in &var_refs {
        store::insert_var_ref_row(&tx, &r.file, &r.site)?;
        stats.var_ref_edges += 1;
    }
    tx.commit()?;
    tracing::info!(%stats, "bulk load complete");
    Ok(stats)
}

//! Fact model - the shared vocabulary between extractors and the core
//!
//! An external, language-specific extractor parses source text and hands the
//! core one [`FactBundle`] per file: typed node records plus typed relation
//! records, needing no further interpretation. The core trusts the bundle;
//! line numbers and name resolution are never re-validated here.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A function or method declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    /// Repository-relative path of the owning file
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_public: bool,
    /// Captured source text, if the extractor keeps it
    #[serde(default)]
    pub source: Option<String>,
    /// Name of the owning class when this is a method
    #[serde(default)]
    pub parent_class: Option<String>,
}

/// A class declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    /// Base-class names, serialized as a JSON list in the store
    #[serde(default)]
    pub bases: Vec<String>,
    pub is_public: bool,
    #[serde(default)]
    pub source: Option<String>,
}

/// Lexical scope of a variable definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum VarScope {
    Module,
    Function(String),
    Class(String),
}

impl VarScope {
    pub fn as_tag(&self) -> String {
        match self {
            VarScope::Module => "module".to_string(),
            VarScope::Function(name) => format!("function:{name}"),
            VarScope::Class(name) => format!("class:{name}"),
        }
    }
}

impl From<VarScope> for String {
    fn from(scope: VarScope) -> String {
        scope.as_tag()
    }
}

impl TryFrom<String> for VarScope {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for VarScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "module" {
            return Ok(VarScope::Module);
        }
        match s.split_once(':') {
            Some(("function", name)) => Ok(VarScope::Function(name.to_string())),
            Some(("class", name)) => Ok(VarScope::Class(name.to_string())),
            _ => Err(Error::InvalidArgument(format!("unknown scope tag: {s}"))),
        }
    }
}

/// A variable definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub file: String,
    /// Definition line
    pub line: u32,
    pub scope: VarScope,
}

/// An import statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub imported_name: String,
    /// "module", "function", "class", "variable", or "*"
    pub import_type: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub line: u32,
    pub is_relative: bool,
    /// False when the name reaches this file through a re-export
    #[serde(default = "default_true")]
    pub is_direct: bool,
    /// Repository-relative path of the imported file, when the extractor
    /// resolved the import to a file inside the tree. Produces a file-level
    /// IMPORTS edge carrying line and directness.
    #[serde(default)]
    pub target_file: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Where a call resolves to.
///
/// Extractors cannot always determine a callee (dynamic dispatch, wildcard
/// imports). The distinction is preserved explicitly rather than guessed:
/// `Resolved` becomes a traversable edge, `Unresolved` is persisted as a
/// dead-end edge, `Absent` is dropped at the indexer boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CallTarget {
    Resolved { file: String, name: String, line: u32 },
    Unresolved { name: String },
    Absent,
}

/// One call site inside a function body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    /// Name of the enclosing function
    pub caller_name: String,
    /// Start line of the enclosing function (part of its identity)
    pub caller_line: u32,
    pub callee: CallTarget,
    /// Line of the call expression
    pub call_line: u32,
}

/// Whether a function reads or defines a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseContext {
    Use,
    Define,
}

impl UseContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseContext::Use => "use",
            UseContext::Define => "define",
        }
    }
}

impl FromStr for UseContext {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "use" => Ok(UseContext::Use),
            "define" => Ok(UseContext::Define),
            _ => Err(Error::InvalidArgument(format!("unknown use context: {s}"))),
        }
    }
}

/// A variable reference from a function body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableUse {
    pub function_name: String,
    pub function_line: u32,
    pub variable_name: String,
    /// Definition line of the referenced variable (part of its identity)
    pub variable_line: u32,
    /// Line of the reference itself
    pub line: u32,
    pub context: UseContext,
}

/// The extractor's complete output for one file.
///
/// All records are scoped to `path`; the indexer replaces the file's whole
/// subgraph with the bundle's contents in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactBundle {
    /// Repository-relative path
    pub path: String,
    /// Language tag, e.g. "python"
    pub language: String,
    /// Content fingerprint of the file bytes (blake3 hex)
    pub fingerprint: String,
    #[serde(default)]
    pub functions: Vec<FunctionRecord>,
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
    #[serde(default)]
    pub imports: Vec<ImportRecord>,
    #[serde(default)]
    pub calls: Vec<CallSite>,
    #[serde(default)]
    pub variable_uses: Vec<VariableUse>,
}

impl FactBundle {
    /// An empty bundle for a file with no extractable facts
    pub fn empty(path: impl Into<String>, language: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            fingerprint: fingerprint.into(),
            functions: Vec::new(),
            classes: Vec::new(),
            variables: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            variable_uses: Vec::new(),
        }
    }
}

/// The seam to language-specific fact extraction.
///
/// Implementations parse `source` and report every fact for `path`. They are
/// called from indexer worker threads, so they must be `Sync`.
pub trait Extractor: Sync {
    fn extract(&self, path: &str, source: &[u8]) -> Result<FactBundle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_tag_roundtrip() {
        for scope in [
            VarScope::Module,
            VarScope::Function("handler".to_string()),
            VarScope::Class("Config".to_string()),
        ] {
            let tag = scope.as_tag();
            let parsed: VarScope = tag.parse().unwrap();
            assert_eq!(scope, parsed);
        }
    }

    #[test]
    fn test_scope_tag_rejects_garbage() {
        assert!("global".parse::<VarScope>().is_err());
        assert!("function".parse::<VarScope>().is_err());
    }

    #[test]
    fn test_call_target_serde_carries_kind() {
        let target = CallTarget::Unresolved { name: "dynamic_hook".to_string() };
        let json = serde_json::to_string(&target).unwrap();
        assert!(json.contains("\"unresolved\""));
        let back: CallTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(target, back);
    }

    #[test]
    fn test_bundle_optional_sections_default() {
        let json = r#"{"path":"a.py","language":"python","fingerprint":"abc"}"#;
        let bundle: FactBundle = serde_json::from_str(json).unwrap();
        assert!(bundle.functions.is_empty());
        assert!(bundle.calls.is_empty());
    }
}

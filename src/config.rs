use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodetraceConfig {
    /// Database path relative to the project root
    pub database: Option<String>,
    /// Source root to index; defaults to the project root
    pub root: Option<String>,
    /// Glob patterns excluded from indexing
    #[serde(default)]
    pub excludes: Vec<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("codetrace.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".codetrace").join("graph.db")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<CodetraceConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CodetraceConfig = toml::from_str(&contents)
        .map_err(|e| Error::InvalidArgument(format!("invalid config {}: {e}", path.display())))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &CodetraceConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::InvalidArgument(format!(
            "config already exists at {}",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codetrace.toml");
        assert!(load_config(Some(&path)).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codetrace.toml");
        let config = CodetraceConfig {
            database: Some(".codetrace/graph.db".to_string()),
            root: Some("src".to_string()),
            excludes: vec!["vendor/**".to_string()],
        };
        write_config(&path, &config, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database.as_deref(), Some(".codetrace/graph.db"));
        assert_eq!(loaded.root.as_deref(), Some("src"));
        assert_eq!(loaded.excludes, ["vendor/**"]);
    }

    #[test]
    fn test_overwrite_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codetrace.toml");
        let config = CodetraceConfig::default();
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path_in(Path::new("/repo"));
        assert_eq!(path, Path::new("/repo/.codetrace/graph.db"));
    }
}

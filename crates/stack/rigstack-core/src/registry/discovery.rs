//! Definition-file discovery.
//!
//! A definition file is a JSON document:
//!
//! ```json
//! { "identifier": "joint_chain", "version": 2, "builder": "joint_chain",
//!   "description": "FK chain", "options": { "joint_count": 4 } }
//! ```
//!
//! `version` defaults to 1 and `builder` to the identifier.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rigstack_api_core::Value;
use serde::Deserialize;

use super::{ComponentDefinition, DefinitionSource, Version};
use crate::error::RegistryError;

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    identifier: String,
    #[serde(default)]
    version: Version,
    #[serde(default)]
    builder: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    options: IndexMap<String, Value>,
    #[serde(default, alias = "inputs")]
    requirements: IndexMap<String, Value>,
}

/// A file that looked like a definition but could not be registered.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedDefinition {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one discovery scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    /// Newly registered (identifier, version) pairs, in scan order
    pub registered: Vec<(String, Version)>,
    /// Definitions that were already registered from the same file
    pub duplicates: usize,
    pub rejected: Vec<RejectedDefinition>,
}

impl DiscoveryReport {
    pub(super) fn reject(&mut self, path: PathBuf, reason: String) {
        self.rejected.push(RejectedDefinition { path, reason });
    }
}

/// Definition files under `root`, sorted so registration order is stable across platforms.
pub(super) fn collect_definition_files(
    root: &Path,
    extension: &str,
    recursive: bool,
) -> Result<Vec<PathBuf>, RegistryError> {
    let root = fs::canonicalize(root).map_err(|e| RegistryError::SearchPath {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !root.is_dir() {
        return Err(RegistryError::SearchPath {
            path: root,
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    let mut pending = vec![root];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| RegistryError::SearchPath {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let path = entry
                .map_err(|e| RegistryError::SearchPath {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?
                .path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one definition file. Errors are reasons for rejection, not fatal.
pub(super) fn read_definition(path: &Path) -> Result<ComponentDefinition, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
    let file: DefinitionFile =
        serde_json::from_str(&text).map_err(|e| format!("invalid definition: {e}"))?;

    let identifier = file.identifier.trim().to_string();
    if identifier.is_empty() {
        return Err("empty identifier".to_string());
    }
    if !file.version.as_f64().is_finite() {
        return Err(format!("invalid version {}", file.version));
    }

    Ok(ComponentDefinition {
        builder: file.builder.unwrap_or_else(|| identifier.clone()),
        identifier,
        version: file.version,
        description: file.description,
        options: file.options,
        requirements: file.requirements,
        source: DefinitionSource::File(path.to_path_buf()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write fixture");
        path
    }

    #[test]
    fn version_and_builder_have_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "arm.json", r#"{ "identifier": "arm" }"#);
        let def = read_definition(&path).unwrap();
        assert_eq!(def.version, Version::from(1));
        assert_eq!(def.builder, "arm");
        assert_eq!(def.source, DefinitionSource::File(path));
    }

    #[test]
    fn inputs_is_accepted_for_requirements() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "leg.json",
            r#"{ "identifier": "leg", "version": 2.5, "inputs": { "parent": "hip" } }"#,
        );
        let def = read_definition(&path).unwrap();
        assert_eq!(def.version, Version::new(2.5));
        assert_eq!(def.requirements.get("parent"), Some(&Value::text("hip")));
    }

    #[test]
    fn malformed_files_become_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let missing = write(dir.path(), "a.json", r#"{ "version": 1 }"#);
        let blank = write(dir.path(), "b.json", r#"{ "identifier": "  " }"#);
        assert!(read_definition(&missing).unwrap_err().contains("invalid definition"));
        assert_eq!(read_definition(&blank).unwrap_err(), "empty identifier");
    }

    #[test]
    fn collection_filters_by_extension_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("limbs");
        fs::create_dir(&nested).unwrap();
        write(dir.path(), "b.json", "{}");
        write(dir.path(), "notes.txt", "");
        write(&nested, "a.JSON", "{}");

        let flat = collect_definition_files(dir.path(), "json", false).unwrap();
        assert_eq!(flat.len(), 1);
        let deep = collect_definition_files(dir.path(), "json", true).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_definition_files(&dir.path().join("nope"), "json", true).unwrap_err();
        assert!(matches!(err, RegistryError::SearchPath { .. }));
    }
}

//! Shared on-disk fixtures: component definition directories and saved stacks, located
//! through `fixtures/manifest.json` at the workspace root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "component-sets")]
    component_sets: BTreeMap<String, String>,
    stacks: BTreeMap<String, StackEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StackEntry {
    Path(String),
    Detailed { path: String },
}

impl StackEntry {
    fn as_path(&self) -> &str {
        match self {
            StackEntry::Path(path) => path,
            StackEntry::Detailed { path } => path,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a BTreeMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Directories of component definition files, one per named set.
pub mod components {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.component_sets.keys().cloned().collect()
    }

    /// Absolute directory for a component set; fails if it is missing on disk.
    pub fn dir(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.component_sets, "component set", name)?;
        let path = resolve_path(rel);
        if !path.is_dir() {
            return Err(anyhow!(
                "component set '{name}' points at missing directory {}",
                path.display()
            ));
        }
        Ok(path)
    }

    /// Definition file paths in a set, sorted.
    pub fn files(name: &str) -> Result<Vec<PathBuf>> {
        let dir = dir(name)?;
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list fixture dir {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Saved stack snapshots.
pub mod stacks {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.stacks.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.stacks, "stack", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.stacks, "stack", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.stacks, "stack", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}

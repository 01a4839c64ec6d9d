//! Host collaborators consumed by components.
//!
//! The engine never calls into these; components hold them (usually behind `Rc<RefCell<_>>`)
//! and use them from `run`. [`MemoryScene`] is an in-memory scene graph for tests and
//! benches; [`ConventionNamer`] implements the studio naming convention.

use std::cell::RefCell;

use anyhow::{anyhow, bail, Result};
use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::config::NamingConfig;

/// The subset of a host scene graph that rig components need.
pub trait SceneGraph {
    /// Create `name` under `parent`. Fails if the name is taken or the parent is missing.
    fn create_node(&mut self, name: &str, parent: Option<&str>) -> Result<()>;
    fn exists(&self, name: &str) -> bool;
    fn parent_of(&self, name: &str) -> Option<String>;
    fn set_parent(&mut self, name: &str, parent: Option<&str>) -> Result<()>;
    /// Delete `name` and everything below it.
    fn delete(&mut self, name: &str) -> Result<()>;
    fn nodes(&self) -> Vec<String>;
}

/// Create `name` under `parent` unless it already exists; an existing node is reparented
/// if needed. Returns true when a node was created.
///
/// This is what keeps `run` repeatable: building the same component twice leaves one node.
pub fn ensure_node(scene: &mut dyn SceneGraph, name: &str, parent: Option<&str>) -> Result<bool> {
    if !scene.exists(name) {
        scene.create_node(name, parent)?;
        return Ok(true);
    }
    if scene.parent_of(name).as_deref() != parent {
        scene.set_parent(name, parent)?;
    }
    Ok(false)
}

/// Insertion-ordered in-memory scene graph.
#[derive(Debug, Default, Clone)]
pub struct MemoryScene {
    parents: IndexMap<String, Option<String>>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn children_of(&self, name: &str) -> Vec<String> {
        self.parents
            .iter()
            .filter(|(_, parent)| parent.as_deref() == Some(name))
            .map(|(child, _)| child.clone())
            .collect()
    }

    fn is_below(&self, name: &str, ancestor: &str) -> bool {
        let mut cursor = self.parents.get(name).cloned().flatten();
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parents.get(&current).cloned().flatten();
        }
        false
    }
}

impl SceneGraph for MemoryScene {
    fn create_node(&mut self, name: &str, parent: Option<&str>) -> Result<()> {
        if name.is_empty() {
            bail!("scene node names cannot be empty");
        }
        if self.parents.contains_key(name) {
            bail!("scene node '{name}' already exists");
        }
        if let Some(parent) = parent {
            if !self.parents.contains_key(parent) {
                bail!("parent '{parent}' of '{name}' does not exist");
            }
        }
        self.parents
            .insert(name.to_string(), parent.map(str::to_string));
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    fn parent_of(&self, name: &str) -> Option<String> {
        self.parents.get(name).cloned().flatten()
    }

    fn set_parent(&mut self, name: &str, parent: Option<&str>) -> Result<()> {
        if !self.parents.contains_key(name) {
            bail!("scene node '{name}' does not exist");
        }
        if let Some(parent) = parent {
            if !self.parents.contains_key(parent) {
                bail!("parent '{parent}' does not exist");
            }
            if parent == name || self.is_below(parent, name) {
                bail!("cannot parent '{name}' under its own descendant '{parent}'");
            }
        }
        let slot = self
            .parents
            .get_mut(name)
            .ok_or_else(|| anyhow!("scene node '{name}' does not exist"))?;
        *slot = parent.map(str::to_string);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        if !self.parents.contains_key(name) {
            bail!("scene node '{name}' does not exist");
        }
        let doomed: Vec<String> = self
            .parents
            .keys()
            .filter(|node| node.as_str() == name || self.is_below(node, name))
            .cloned()
            .collect();
        for node in doomed {
            self.parents.shift_remove(&node);
        }
        Ok(())
    }

    fn nodes(&self) -> Vec<String> {
        self.parents.keys().cloned().collect()
    }
}

/// A name split back into its convention parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub classification: String,
    pub description: String,
    pub index: Option<u32>,
    pub location: Option<String>,
}

/// Deterministic name generation for host objects.
pub trait NameService {
    /// Build a name from its parts. With `unique`, an index is added and bumped until the
    /// name has not been issued before.
    fn generate_name(
        &self,
        classification: &str,
        description: &str,
        location: Option<&str>,
        unique: bool,
    ) -> String;

    fn decompose(&self, name: &str) -> Option<NameParts>;
}

/// `{classification}_{description}_{index}_{location}` with a configurable separator.
/// Index and location are omitted when absent.
#[derive(Debug, Default)]
pub struct ConventionNamer {
    config: NamingConfig,
    issued: RefCell<HashSet<String>>,
}

impl ConventionNamer {
    pub fn new(config: NamingConfig) -> Self {
        Self {
            config,
            issued: RefCell::new(HashSet::new()),
        }
    }

    pub fn is_issued(&self, name: &str) -> bool {
        self.issued.borrow().contains(name)
    }

    /// Forget a name so it can be issued again.
    pub fn release(&self, name: &str) -> bool {
        self.issued.borrow_mut().remove(name)
    }

    fn join(&self, parts: &NameParts) -> String {
        let mut pieces = vec![parts.classification.clone(), parts.description.clone()];
        if let Some(index) = parts.index {
            pieces.push(format!("{:0width$}", index, width = self.config.index_padding));
        }
        if let Some(location) = parts.location.as_deref().filter(|l| !l.is_empty()) {
            pieces.push(location.to_string());
        }
        pieces.join(&self.config.separator)
    }
}

impl NameService for ConventionNamer {
    fn generate_name(
        &self,
        classification: &str,
        description: &str,
        location: Option<&str>,
        unique: bool,
    ) -> String {
        let mut parts = NameParts {
            classification: classification.to_string(),
            description: description.to_string(),
            index: unique.then_some(1),
            location: location.map(str::to_string),
        };
        let mut name = self.join(&parts);
        if unique {
            while self.is_issued(&name) {
                parts.index = parts.index.map(|i| i + 1);
                name = self.join(&parts);
            }
        }
        self.issued.borrow_mut().insert(name.clone());
        name
    }

    fn decompose(&self, name: &str) -> Option<NameParts> {
        let separator = self.config.separator.as_str();
        if separator.is_empty() {
            return None;
        }
        let mut pieces: Vec<&str> = name.split(separator).collect();
        if pieces.len() < 2 || pieces.iter().any(|p| p.is_empty()) {
            return None;
        }
        let classification = pieces.remove(0).to_string();

        let mut location = None;
        if pieces.len() >= 2 && !pieces.last().is_some_and(|p| is_index(p)) {
            // a trailing non-numeric piece is a location only if something else remains
            let tail = pieces[pieces.len() - 2];
            if is_index(tail) || pieces.len() >= 3 {
                location = pieces.pop().map(str::to_string);
            }
        }
        let mut index = None;
        if pieces.len() >= 2 {
            if let Some(last) = pieces.last().copied().filter(|p| is_index(p)) {
                index = last.parse().ok();
                pieces.pop();
            }
        }
        Some(NameParts {
            classification,
            description: pieces.join(separator),
            index,
            location,
        })
    }
}

fn is_index(piece: &str) -> bool {
    piece.chars().all(|c| c.is_ascii_digit())
}

//! Stack persistence.
//!
//! A snapshot lists components in build order. Each entry carries the identifier and the
//! exact version it was built with, its label, the index of its parent within the list and
//! the current attribute values. Restoring re-instantiates each entry from the registry at
//! the recorded version, so a rig saved today rebuilds the same way after newer component
//! revisions are installed.

use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{info, warn};
use rigstack_api_core::{json, AttributeCategory, Value};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{SnapshotError, StackError};
use crate::ids::ComponentId;
use crate::registry::Version;
use crate::stack::{check_label, Stack};

/// Current snapshot layout.
pub const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub format: u32,
    pub components: Vec<ComponentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub identifier: String,
    pub version: Version,
    pub label: String,
    /// Index of the parent within [`StackSnapshot::components`]; always smaller than this
    /// entry's own index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        serialize_with = "serialize_values"
    )]
    pub options: IndexMap<String, Value>,
    #[serde(
        default,
        alias = "inputs",
        skip_serializing_if = "IndexMap::is_empty",
        serialize_with = "serialize_values"
    )]
    pub requirements: IndexMap<String, Value>,
    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        serialize_with = "serialize_values"
    )]
    pub outputs: IndexMap<String, Value>,
}

impl ComponentSnapshot {
    fn values(&self) -> [(AttributeCategory, &IndexMap<String, Value>); 3] {
        [
            (AttributeCategory::Option, &self.options),
            (AttributeCategory::Requirement, &self.requirements),
            (AttributeCategory::Output, &self.outputs),
        ]
    }
}

// Numbers go through the JSON bridge so whole values are written as integers.
fn serialize_values<S: Serializer>(
    values: &IndexMap<String, Value>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(values.len()))?;
    for (name, value) in values {
        let json = json::to_json(value).map_err(S::Error::custom)?;
        map.serialize_entry(name, &json)?;
    }
    map.end()
}

impl StackSnapshot {
    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SnapshotError> {
        let snapshot: StackSnapshot = serde_json::from_str(text)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(SnapshotError::UnsupportedFormat {
                found: snapshot.format,
                expected: SNAPSHOT_FORMAT,
            });
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string()?).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

impl Stack {
    /// Capture every component in build order.
    pub fn snapshot(&self) -> StackSnapshot {
        let order = self.components();
        let index: HashMap<ComponentId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let components = order
            .iter()
            .map(|id| {
                let node = self.node(*id);
                let collect = |category: AttributeCategory| {
                    node.attributes
                        .iter(category)
                        .map(|attr| (attr.name().to_string(), attr.get().clone()))
                        .collect::<IndexMap<_, _>>()
                };
                ComponentSnapshot {
                    identifier: node.identifier.clone(),
                    version: node.version,
                    label: node.label.clone(),
                    parent: node.parent.and_then(|p| index.get(&p).copied()),
                    options: collect(AttributeCategory::Option),
                    requirements: collect(AttributeCategory::Requirement),
                    outputs: collect(AttributeCategory::Output),
                }
            })
            .collect();

        StackSnapshot {
            format: SNAPSHOT_FORMAT,
            components,
        }
    }

    /// Recreate the snapshot's components, appended after anything already in the stack.
    ///
    /// Each entry is instantiated at its recorded version. `on_enter_stack` is not called:
    /// whatever the hook added at authoring time is part of the snapshot already. Values
    /// for attributes the component no longer declares are skipped with a warning. On
    /// error, every component restored so far is removed again.
    pub fn restore(&mut self, snapshot: &StackSnapshot) -> Result<Vec<ComponentId>, StackError> {
        let mut created: Vec<ComponentId> = Vec::with_capacity(snapshot.components.len());
        for (index, entry) in snapshot.components.iter().enumerate() {
            let result = match entry.parent {
                Some(parent) if parent >= index => Err(StackError::InvalidSnapshot {
                    reason: format!(
                        "component {index} ('{}') refers to parent {parent}, which does not precede it",
                        entry.label
                    ),
                }),
                parent => self.restore_entry(entry, parent.map(|p| created[p])),
            };
            match result {
                Ok(id) => created.push(id),
                Err(err) => {
                    for id in created.iter().rev() {
                        if self.contains(*id) {
                            let _ = self.remove_component(*id);
                        }
                    }
                    return Err(err);
                }
            }
        }
        info!("restored {} component(s) from snapshot", created.len());
        Ok(created)
    }

    fn restore_entry(
        &mut self,
        entry: &ComponentSnapshot,
        parent: Option<ComponentId>,
    ) -> Result<ComponentId, StackError> {
        check_label(&entry.label)?;
        let registration = self
            .registry()
            .request(&entry.identifier, Some(entry.version))
            .map_err(|source| StackError::UnknownComponentType {
                identifier: entry.identifier.clone(),
                source,
            })?;
        let identifier = registration.identifier().to_string();
        let (behaviour, mut attributes) = registration.instantiate();

        for (category, values) in entry.values() {
            for (name, value) in values {
                match attributes.get_mut(category, name) {
                    Some(attr) => attr.set(value.clone()),
                    None => warn!(
                        "snapshot of '{}' has a value for undeclared {} '{}'; skipped",
                        entry.label, category, name
                    ),
                }
            }
        }

        let id = self.insert_node(
            identifier,
            entry.version,
            entry.label.clone(),
            behaviour,
            attributes,
            parent,
        );
        if let Some(node) = self.component_mut(id) {
            node.entered = true;
        }
        Ok(id)
    }
}

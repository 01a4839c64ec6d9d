//! The stack: an ordered forest of components plus the build pass that walks it.
//!
//! Build order is depth-first pre-order: a parent before its children, siblings in their
//! stored order. The submodules split the work:
//!
//! - [`build`] drives the per-component lifecycle and aggregates a [`BuildReport`].
//! - forest editing (add, remove, reorder) lives here.
//!
//! Snapshot save/restore is implemented in [`crate::snapshot`].

mod build;


use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, info};
use rigstack_api_core::{Address, AttributeCategory, Value};

use crate::attribute::{Attribute, AttributeSet};
use crate::component::{Component, ComponentNode};
use crate::config::BuildConfig;
use crate::error::StackError;
use crate::ids::{ComponentId, IdAllocator};
use crate::registry::{ComponentRegistry, Version};
use crate::resolver;

pub use build::{BuildEntry, BuildReport};

/// Arguments for [`Stack::add_component`].
#[derive(Debug, Clone)]
pub struct ComponentRequest {
    pub identifier: String,
    pub label: String,
    /// Pinned revision; newest when `None`.
    pub version: Option<Version>,
    pub parent: Option<ComponentId>,
    pub options: IndexMap<String, Value>,
    pub requirements: IndexMap<String, Value>,
}

impl ComponentRequest {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
            version: None,
            parent: None,
            options: IndexMap::new(),
            requirements: IndexMap::new(),
        }
    }

    pub fn version(mut self, version: impl Into<Version>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn parent(mut self, parent: ComponentId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn requirement(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.requirements.insert(name.into(), value.into());
        self
    }

    /// Alias of [`ComponentRequest::requirement`].
    pub fn input(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.requirement(name, value)
    }
}

#[derive(Debug)]
pub struct Stack {
    registry: ComponentRegistry,
    config: BuildConfig,
    ids: IdAllocator,
    pub(crate) nodes: HashMap<ComponentId, ComponentNode>,
    roots: Vec<ComponentId>,
}

impl Stack {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_config(registry, BuildConfig::default())
    }

    pub fn with_config(registry: ComponentRegistry, config: BuildConfig) -> Self {
        Self {
            registry,
            config,
            ids: IdAllocator::new(),
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to `refresh()` after installing new definitions.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: BuildConfig) {
        self.config = config;
    }

    // --- Forest editing --------------------------------------------------

    /// Instantiate a component from the registry and append it as the last child of
    /// `request.parent` (or as the last root).
    ///
    /// Nothing changes when the type cannot be resolved or a provided value names an
    /// undeclared attribute. `on_enter_stack` fires once the component is linked; if it
    /// fails, the component and anything the hook added are removed again.
    pub fn add_component(&mut self, request: ComponentRequest) -> Result<ComponentId, StackError> {
        check_label(&request.label)?;
        if let Some(parent) = request.parent {
            self.require(parent)?;
        }

        let registration = self
            .registry
            .request(&request.identifier, request.version)
            .map_err(|source| StackError::UnknownComponentType {
                identifier: request.identifier.clone(),
                source,
            })?;
        let identifier = registration.identifier().to_string();
        let version = registration.version();
        let (behaviour, mut attributes) = registration.instantiate();

        let provided = [
            (AttributeCategory::Option, &request.options),
            (AttributeCategory::Requirement, &request.requirements),
        ];
        for (category, values) in provided {
            if let Some(name) = values.keys().find(|name| !attributes.contains(category, name)) {
                return Err(StackError::UnknownAttribute {
                    label: request.label.clone(),
                    category,
                    name: name.clone(),
                });
            }
        }

        self.seed_inherited(request.parent, &mut attributes);

        for (category, values) in provided {
            for (name, value) in values {
                if let Some(attr) = attributes.get_mut(category, name) {
                    attr.set(value.clone());
                }
            }
        }

        let id = self.insert_node(
            identifier,
            version,
            request.label,
            behaviour,
            attributes,
            request.parent,
        );

        if let Err(err) = self.enter_stack(id) {
            self.detach(id);
            return Err(err);
        }
        // the hook is free to remove the component it was called for
        self.require(id)?;
        Ok(id)
    }

    /// Detach `id` and all of its descendants. Returns the removed ids in build order.
    /// External state the components already constructed is left alone.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Vec<ComponentId>, StackError> {
        self.require(id)?;
        let removed = self.detach(id);
        info!("removed {} component(s) starting at {}", removed.len(), id);
        Ok(removed)
    }

    /// Reparent and/or reorder `id`. `index` is the position among the new siblings; the
    /// component is appended when it is `None` or past the end.
    pub fn set_build_position(
        &mut self,
        id: ComponentId,
        parent: Option<ComponentId>,
        index: Option<usize>,
    ) -> Result<(), StackError> {
        self.require(id)?;
        if let Some(parent) = parent {
            self.require(parent)?;
            if parent == id || self.ancestors(parent).contains(&id) {
                return Err(StackError::CyclicParent {
                    component: id,
                    parent,
                });
            }
        }

        self.unlink(id);
        let siblings = match parent {
            Some(parent) => &mut self.node_mut(parent).children,
            None => &mut self.roots,
        };
        let at = index.map_or(siblings.len(), |i| i.min(siblings.len()));
        siblings.insert(at, id);
        self.node_mut(id).parent = parent;
        debug!("moved {} under {:?} at {}", id, parent, at);
        Ok(())
    }

    /// Rename `id`. Addresses built from the old label stop resolving.
    pub fn set_label(&mut self, id: ComponentId, label: impl Into<String>) -> Result<(), StackError> {
        let label = label.into();
        check_label(&label)?;
        self.require(id)?;
        self.node_mut(id).label = label;
        Ok(())
    }

    // --- Queries ------------------------------------------------------------

    /// Every component in build order.
    pub fn components(&self) -> Vec<ComponentId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            self.collect_subtree(*root, &mut order);
        }
        order
    }

    /// Components in build order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentNode> + '_ {
        self.components()
            .into_iter()
            .filter_map(move |id| self.nodes.get(&id))
    }

    pub fn roots(&self) -> &[ComponentId] {
        &self.roots
    }

    pub fn component(&self, id: ComponentId) -> Option<&ComponentNode> {
        self.nodes.get(&id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut ComponentNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// First component in build order carrying `label`.
    pub fn get_component_by_label(&self, label: &str) -> Option<ComponentId> {
        self.components()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|node| node.label == label))
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Children in build order; empty for unknown ids.
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.parent(current);
        }
        out
    }

    /// Descendants of `id` in build order, excluding `id`.
    pub fn descendants(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = self.subtree(id);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // --- Attributes -----------------------------------------------------------

    pub fn attribute(
        &self,
        id: ComponentId,
        category: AttributeCategory,
        name: &str,
    ) -> Option<&Attribute> {
        self.nodes.get(&id)?.attributes.get(category, name)
    }

    /// Write an attribute from outside its component. Allowed, but writing another
    /// component's outputs bypasses the producer/consumer contract.
    pub fn set_attribute(
        &mut self,
        id: ComponentId,
        category: AttributeCategory,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), StackError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(StackError::UnknownComponent(id))?;
        match node.attributes.get_mut(category, name) {
            Some(attr) => {
                attr.set(value);
                Ok(())
            }
            None => Err(StackError::UnknownAttribute {
                label: node.label.clone(),
                category,
                name: name.to_string(),
            }),
        }
    }

    /// Address of a live attribute, or `None` if it does not exist.
    pub fn address_of(
        &self,
        id: ComponentId,
        category: AttributeCategory,
        name: &str,
    ) -> Option<Address> {
        let node = self.nodes.get(&id)?;
        node.attributes
            .get(category, name)
            .map(|attr| resolver::form_address(&node.label, attr))
    }

    /// Resolve an address string against this stack.
    pub fn resolve(&self, address: &str) -> Option<&Attribute> {
        resolver::resolve(address, self)
    }

    /// Replace addresses in `value` with the values they currently point at.
    pub fn dereference(&self, value: &Value) -> Value {
        resolver::dereference(value, self)
    }

    /// `validate` requirements of `id` that are empty once addresses are dereferenced.
    pub fn unsatisfied_requirements(&self, id: ComponentId) -> Vec<String> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        node.attributes
            .iter(AttributeCategory::Requirement)
            .filter(|attr| !attr.is_satisfied_by(&self.dereference(attr.get())))
            .map(|attr| attr.name().to_string())
            .collect()
    }

    // --- Internals ------------------------------------------------------------

    fn require(&self, id: ComponentId) -> Result<(), StackError> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(StackError::UnknownComponent(id))
        }
    }

    /// Node lookup for ids the caller has already validated.
    pub(crate) fn node(&self, id: ComponentId) -> &ComponentNode {
        &self.nodes[&id]
    }

    fn node_mut(&mut self, id: ComponentId) -> &mut ComponentNode {
        self.nodes
            .get_mut(&id)
            .unwrap_or_else(|| unreachable!("component {id} validated before mutation"))
    }

    /// `id` followed by its descendants in build order; empty for unknown ids.
    pub(crate) fn subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        if self.nodes.contains_key(&id) {
            self.collect_subtree(id, &mut out);
        }
        out
    }

    fn collect_subtree(&self, id: ComponentId, out: &mut Vec<ComponentId>) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                pending.extend(node.children.iter().rev().copied());
            }
        }
    }

    /// Create a node and link it as the last child of `parent` (or last root).
    pub(crate) fn insert_node(
        &mut self,
        identifier: String,
        version: Version,
        label: String,
        behaviour: Box<dyn Component>,
        attributes: AttributeSet,
        parent: Option<ComponentId>,
    ) -> ComponentId {
        let id = self.ids.alloc();
        let mut node = ComponentNode::new(id, identifier, version, label, behaviour, attributes);
        node.parent = parent;
        debug!(
            "adding {} '{}' ({} v{}) under {:?}",
            id, node.label, node.identifier, node.version, parent
        );
        self.nodes.insert(id, node);
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Fire `on_enter_stack` the first time `id` joins.
    fn enter_stack(&mut self, id: ComponentId) -> Result<(), StackError> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Ok(());
        };
        if node.entered {
            return Ok(());
        }
        node.entered = true;
        let label = node.label.clone();
        let Some(mut behaviour) = node.behaviour.take() else {
            return Ok(());
        };

        let result = behaviour.on_enter_stack(self, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.behaviour = Some(behaviour);
        }
        result.map_err(|err| StackError::EnterStack {
            label,
            message: format!("{err:#}"),
        })
    }

    /// Seed `should_inherit` attributes from the nearest ancestor declaring the same name.
    /// One-shot copy: later edits to the ancestor do not propagate.
    fn seed_inherited(&self, parent: Option<ComponentId>, attributes: &mut AttributeSet) {
        let Some(parent) = parent else {
            return;
        };
        let lineage: Vec<ComponentId> = std::iter::once(parent)
            .chain(self.ancestors(parent))
            .collect();
        for category in AttributeCategory::ALL {
            for attr in attributes
                .iter_mut(category)
                .filter(|attr| attr.should_inherit())
            {
                let inherited = lineage.iter().find_map(|id| {
                    self.nodes
                        .get(id)?
                        .attributes
                        .find_by_name(attr.name())
                        .map(|source| source.get().clone())
                });
                if let Some(value) = inherited {
                    debug!("seeding {} '{}' from ancestor", category, attr.name());
                    attr.reseed_default(value);
                }
            }
        }
    }

    /// Remove `id` from its sibling list without touching the node itself.
    fn unlink(&mut self, id: ComponentId) {
        match self.parent(id) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Unlink `id` and drop it with all descendants.
    fn detach(&mut self, id: ComponentId) -> Vec<ComponentId> {
        let removed = self.subtree(id);
        self.unlink(id);
        for gone in &removed {
            self.nodes.remove(gone);
        }
        removed
    }
}

/// Labels appear bracketed inside addresses, so they must be non-empty and bracket-free.
pub(crate) fn check_label(label: &str) -> Result<(), StackError> {
    let reason = if label.is_empty() {
        "label is empty"
    } else if label.contains(['[', ']']) {
        "label contains '[' or ']'"
    } else {
        return Ok(());
    };
    Err(StackError::InvalidLabel {
        label: label.to_string(),
        reason,
    })
}

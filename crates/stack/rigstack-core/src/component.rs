//! Components: the behaviour trait plugins implement, and the node the stack keeps per
//! instance.
//!
//! A plugin supplies a [`Component`] (declarations plus lifecycle hooks). The stack wraps
//! it in a [`ComponentNode`] that carries everything the engine owns: identity, tree
//! position, status and the attribute set.

use std::fmt;

use rigstack_api_core::{Address, AttributeCategory, Value};
use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, AttributeSet};
use crate::error::{BuildFailure, StackError};
use crate::ids::ComponentId;
use crate::registry::Version;
use crate::resolver;
use crate::stack::Stack;

/// Outcome of the most recent build pass for one component.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    NotExecuted,
    Success,
    Failed,
    Invalid,
}

/// Behaviour of a component type.
///
/// `run` may be called any number of times over the life of a stack (full and partial
/// rebuilds), so implementations must be safely repeatable: create-if-missing rather
/// than create-unconditionally. The engine assumes this but cannot check it.
pub trait Component {
    /// Declare options, requirements and outputs. Called once per instance, before the
    /// component joins a stack.
    fn declare(&self, attributes: &mut AttributeSet);

    /// Called once, the first time this instance becomes a member of a stack. The
    /// component is already linked under its parent when this runs.
    fn on_enter_stack(&mut self, _stack: &mut Stack, _id: ComponentId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Checked before requirements; returning false marks the component `Invalid`.
    fn is_valid(&self, _ctx: &BuildContext<'_>) -> bool {
        true
    }

    /// Perform the construction. `Ok(false)` and `Err(_)` both mark the component `Failed`.
    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool>;

    /// Called after the whole pass with its overall result.
    fn on_build_finished(&mut self, _ctx: &mut BuildContext<'_>, _successful: bool) {}
}

/// Engine-held state for one component instance.
pub struct ComponentNode {
    pub(crate) id: ComponentId,
    pub(crate) identifier: String,
    pub(crate) version: Version,
    pub(crate) label: String,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) status: ComponentStatus,
    pub(crate) failure: Option<BuildFailure>,
    pub(crate) attributes: AttributeSet,
    pub(crate) entered: bool,
    /// Taken out while one of its hooks runs so the hook can borrow the stack.
    pub(crate) behaviour: Option<Box<dyn Component>>,
}

impl ComponentNode {
    pub(crate) fn new(
        id: ComponentId,
        identifier: String,
        version: Version,
        label: String,
        behaviour: Box<dyn Component>,
        attributes: AttributeSet,
    ) -> Self {
        Self {
            id,
            identifier,
            version,
            label,
            parent: None,
            children: Vec::new(),
            status: ComponentStatus::NotExecuted,
            failure: None,
            attributes,
            entered: false,
            behaviour: Some(behaviour),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Registry key this instance was created from.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    /// Children in build order.
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Failure recorded by the last pass that executed this component.
    pub fn failure(&self) -> Option<&BuildFailure> {
        self.failure.as_ref()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Direct write access. Writing another component's requirements or outputs bypasses
    /// the producer/consumer contract; nothing prevents it.
    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    pub fn attribute(&self, category: AttributeCategory, name: &str) -> Option<&Attribute> {
        self.attributes.get(category, name)
    }

    pub fn has_entered_stack(&self) -> bool {
        self.entered
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("version", &self.version)
            .field("label", &self.label)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("status", &self.status)
            .field("failure", &self.failure)
            .field("attributes", &self.attributes.len())
            .field("entered", &self.entered)
            .finish_non_exhaustive()
    }
}

/// What a component sees while the stack drives one of its lifecycle hooks.
///
/// Read access covers the whole stack; write access is limited to the component's own
/// options and outputs.
pub struct BuildContext<'a> {
    stack: &'a mut Stack,
    id: ComponentId,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(stack: &'a mut Stack, id: ComponentId) -> Self {
        Self { stack, id }
    }

    fn node(&self) -> &ComponentNode {
        // the stack cannot remove nodes while a context borrows it
        self.stack.node(self.id)
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.node().label
    }

    pub fn identifier(&self) -> &str {
        &self.node().identifier
    }

    pub fn version(&self) -> Version {
        self.node().version
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.node().parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.node().children
    }

    /// Read-only view of the whole stack.
    pub fn stack(&self) -> &Stack {
        self.stack
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.node().attributes
    }

    pub fn attribute(&self, category: AttributeCategory, name: &str) -> Option<&Attribute> {
        self.node().attributes.get(category, name)
    }

    /// Option value with any address dereferenced.
    pub fn option(&self, name: &str) -> Option<Value> {
        self.attribute(AttributeCategory::Option, name)
            .map(|attr| resolver::dereference(attr.get(), self.stack))
    }

    /// Requirement value with any address dereferenced.
    pub fn requirement(&self, name: &str) -> Option<Value> {
        self.attribute(AttributeCategory::Requirement, name)
            .map(|attr| resolver::dereference(attr.get(), self.stack))
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.attribute(AttributeCategory::Output, name)
            .map(Attribute::get)
    }

    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) -> Result<(), StackError> {
        self.stack
            .set_attribute(self.id, AttributeCategory::Output, name, value)
    }

    pub fn set_option(&mut self, name: &str, value: impl Into<Value>) -> Result<(), StackError> {
        self.stack
            .set_attribute(self.id, AttributeCategory::Option, name, value)
    }

    /// Resolve an address string against the stack.
    pub fn resolve(&self, address: &str) -> Option<&Attribute> {
        resolver::resolve(address, self.stack)
    }

    /// Replace addresses in `value` with the values they point at.
    pub fn dereference(&self, value: &Value) -> Value {
        resolver::dereference(value, self.stack)
    }

    /// Address of one of this component's own attributes.
    pub fn address_of(&self, category: AttributeCategory, name: &str) -> Option<Address> {
        self.attribute(category, name)
            .map(|attr| resolver::form_address(self.label(), attr))
    }
}

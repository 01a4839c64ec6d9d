//! Attributes: named, typed value slots owned by exactly one component.
//!
//! A component declares its attributes once, inside [`Component::declare`], through an
//! [`AttributeSet`]. After that the engine and the component read and write them through
//! `get`/`set`; declarations are never shared between components.
//!
//! [`Component::declare`]: crate::component::Component::declare

use indexmap::IndexMap;
use rigstack_api_core::{AttributeCategory, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    category: AttributeCategory,
    default: Value,
    value: Value,
    /// Build fails when a requirement with this flag is empty.
    validate: bool,
    /// UI grouping only.
    group: Option<String>,
    hidden: bool,
    pre_expose: bool,
    /// Seed the value from the nearest ancestor declaring the same name when added.
    should_inherit: bool,
    description: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, category: AttributeCategory, default: Value) -> Self {
        Self {
            name: name.into(),
            category,
            value: default.clone(),
            default,
            validate: false,
            group: None,
            hidden: false,
            pre_expose: false,
            should_inherit: false,
            description: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> AttributeCategory {
        self.category
    }

    /// Current value; the declared default until something calls `set`.
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Overwrite the value. No coercion happens here.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Restore the declared default.
    pub fn reset(&mut self) {
        self.value = self.default.clone();
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Replace the default (and the value, when it still equals the old default).
    pub(crate) fn reseed_default(&mut self, default: Value) {
        if self.value == self.default {
            self.value = default.clone();
        }
        self.default = default;
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_pre_exposed(&self) -> bool {
        self.pre_expose
    }

    pub fn should_inherit(&self) -> bool {
        self.should_inherit
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// False only for a `validate` requirement whose value is empty.
    pub fn is_satisfied(&self) -> bool {
        self.is_satisfied_by(&self.value)
    }

    /// Same check as [`Attribute::is_satisfied`] against a substitute value, used by the
    /// stack once an address held by this attribute has been dereferenced.
    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        match self.category {
            AttributeCategory::Requirement if self.validate => !value.is_empty(),
            _ => true,
        }
    }

    // Declaration-time flag setters

    pub fn with_validate(&mut self, validate: bool) -> &mut Self {
        self.validate = validate;
        self
    }

    pub fn with_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_hidden(&mut self, hidden: bool) -> &mut Self {
        self.hidden = hidden;
        self
    }

    pub fn with_pre_expose(&mut self, pre_expose: bool) -> &mut Self {
        self.pre_expose = pre_expose;
        self
    }

    pub fn with_should_inherit(&mut self, should_inherit: bool) -> &mut Self {
        self.should_inherit = should_inherit;
        self
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }
}

/// All attributes of one component, one insertion-ordered map per category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    options: IndexMap<String, Attribute>,
    requirements: IndexMap<String, Attribute>,
    outputs: IndexMap<String, Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, category: AttributeCategory) -> &IndexMap<String, Attribute> {
        match category {
            AttributeCategory::Option => &self.options,
            AttributeCategory::Requirement => &self.requirements,
            AttributeCategory::Output => &self.outputs,
        }
    }

    fn map_mut(&mut self, category: AttributeCategory) -> &mut IndexMap<String, Attribute> {
        match category {
            AttributeCategory::Option => &mut self.options,
            AttributeCategory::Requirement => &mut self.requirements,
            AttributeCategory::Output => &mut self.outputs,
        }
    }

    /// Declare (or redeclare) an attribute; the last declaration of a name wins.
    pub fn declare(
        &mut self,
        category: AttributeCategory,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Attribute {
        let name = name.into();
        let attribute = Attribute::new(name.clone(), category, value.into());
        let map = self.map_mut(category);
        map.insert(name.clone(), attribute);
        // the entry was just inserted
        &mut map[name.as_str()]
    }

    pub fn declare_option(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Attribute {
        self.declare(AttributeCategory::Option, name, value)
    }

    pub fn declare_requirement(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Attribute {
        self.declare(AttributeCategory::Requirement, name, value)
    }

    /// Alias of [`AttributeSet::declare_requirement`].
    pub fn declare_input(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Attribute {
        self.declare_requirement(name, value)
    }

    /// Outputs start empty; `run` fills them.
    pub fn declare_output(&mut self, name: impl Into<String>) -> &mut Attribute {
        self.declare(AttributeCategory::Output, name, Value::Null)
    }

    pub fn get(&self, category: AttributeCategory, name: &str) -> Option<&Attribute> {
        self.map(category).get(name)
    }

    pub fn get_mut(&mut self, category: AttributeCategory, name: &str) -> Option<&mut Attribute> {
        self.map_mut(category).get_mut(name)
    }

    pub fn contains(&self, category: AttributeCategory, name: &str) -> bool {
        self.map(category).contains_key(name)
    }

    /// Attributes of one category in declaration order.
    pub fn iter(&self, category: AttributeCategory) -> impl Iterator<Item = &Attribute> {
        self.map(category).values()
    }

    pub fn iter_mut(
        &mut self,
        category: AttributeCategory,
    ) -> impl Iterator<Item = &mut Attribute> {
        self.map_mut(category).values_mut()
    }

    /// Every attribute: options, then requirements, then outputs.
    pub fn all(&self) -> impl Iterator<Item = &Attribute> {
        self.options
            .values()
            .chain(self.requirements.values())
            .chain(self.outputs.values())
    }

    /// First attribute called `name`, looking at options, then requirements, then outputs.
    pub fn find_by_name(&self, name: &str) -> Option<&Attribute> {
        AttributeCategory::ALL
            .iter()
            .find_map(|category| self.get(*category, name))
    }

    /// Names of `validate` requirements whose stored value is empty.
    pub fn unsatisfied_requirements(&self) -> Vec<String> {
        self.requirements
            .values()
            .filter(|attr| !attr.is_satisfied())
            .map(|attr| attr.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.options.len() + self.requirements.len() + self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Address parsing and formatting.
//!
//! Grammar:
//!   [label].[category].[name]
//! - every segment is wrapped in exactly one pair of square brackets
//! - `category` is one of `option`, `requirement` (alias `input`) or `output`
//!   Examples:
//!   "[arm_L].[output].[end_joint]" -> label="arm_L", category=Output, name="end_joint"
//!   "[spine].[input].[parent]"     -> label="spine", category=Requirement, name="parent"
//!
//! Segments are separated at the `].[` boundaries, so a label such as `arm.L` still
//! round-trips. An address is only a lookup key; it is resolved against a stack each time
//! it is used and never holds a reference to a live attribute.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::value::Value;

/// Which declaration list an attribute belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeCategory {
    /// Behaviour switches set by the rig author
    Option,
    /// Inputs the component needs, often addresses of other components' outputs
    #[serde(alias = "input")]
    Requirement,
    /// Values produced by `run`
    Output,
}

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 3] = [
        AttributeCategory::Option,
        AttributeCategory::Requirement,
        AttributeCategory::Output,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeCategory::Option => "option",
            AttributeCategory::Requirement => "requirement",
            AttributeCategory::Output => "output",
        }
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeCategory {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "option" => Ok(AttributeCategory::Option),
            "requirement" | "input" => Ok(AttributeCategory::Requirement),
            "output" => Ok(AttributeCategory::Output),
            _ => Err(AddressError::UnknownCategory(s.to_string())),
        }
    }
}

/// Errors produced by [`Address::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("address must have 3 segments, found {0}")]
    SegmentCount(usize),
    #[error("address segments must be wrapped in [..]")]
    MissingBrackets,
    #[error("address has an empty {0} segment")]
    EmptySegment(&'static str),
    #[error("unknown attribute category '{0}'")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Label of the component that owns the attribute
    pub label: String,
    pub category: AttributeCategory,
    /// Attribute name within the category
    pub name: String,
}

impl Address {
    pub fn new(
        label: impl Into<String>,
        category: AttributeCategory,
        name: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            category,
            name: name.into(),
        }
    }

    /// Parse an address string according to the grammar described above.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        let inner = s
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or(AddressError::MissingBrackets)?;

        let parts: Vec<&str> = inner.split("].[").collect();
        if parts.len() != 3 {
            // "[a]" style input has one segment; "[a].[b]" two, and so on
            return Err(AddressError::SegmentCount(parts.len()));
        }
        if parts.iter().any(|seg| seg.contains('[') || seg.contains(']')) {
            return Err(AddressError::MissingBrackets);
        }

        let label = parts[0];
        if label.is_empty() {
            return Err(AddressError::EmptySegment("label"));
        }
        if parts[1].is_empty() {
            return Err(AddressError::EmptySegment("category"));
        }
        let category = parts[1].parse::<AttributeCategory>()?;
        let name = parts[2];
        if name.is_empty() {
            return Err(AddressError::EmptySegment("name"));
        }

        Ok(Address::new(label, category, name))
    }

    /// Lenient form of [`Address::parse`] for scanning arbitrary text: anything that is not a
    /// well-formed address yields `None`.
    pub fn detect(s: &str) -> Option<Self> {
        Address::parse(s).ok()
    }

    /// True when `value` is text holding a well-formed address.
    pub fn is_address(value: &Value) -> bool {
        value.as_str().and_then(Address::detect).is_some()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].[{}].[{}]", self.label, self.category, self.name)
    }
}

impl FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Text(address.to_string())
    }
}

// Serde support: serialize as string, deserialize from string
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Address, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let a = Address::parse("[arm_L].[output].[end_joint]").unwrap();
        assert_eq!(a.label, "arm_L");
        assert_eq!(a.category, AttributeCategory::Output);
        assert_eq!(a.name, "end_joint");
        assert_eq!(a.to_string(), "[arm_L].[output].[end_joint]");
    }

    #[test]
    fn input_is_an_alias_for_requirement() {
        let a = Address::parse("[spine].[input].[parent]").unwrap();
        assert_eq!(a.category, AttributeCategory::Requirement);
        assert_eq!(a.to_string(), "[spine].[requirement].[parent]");
        let b = Address::parse("[spine].[Option].[side]").unwrap();
        assert_eq!(b.category, AttributeCategory::Option);
    }

    #[test]
    fn dotted_labels_round_trip() {
        let a = Address::new("arm.L", AttributeCategory::Option, "twist.count");
        assert_eq!(Address::parse(&a.to_string()), Ok(a));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(Address::parse(""), Err(AddressError::Empty));
        assert_eq!(
            Address::parse("arm.output.joint"),
            Err(AddressError::MissingBrackets)
        );
        assert_eq!(
            Address::parse("[arm].[output]"),
            Err(AddressError::SegmentCount(2))
        );
        assert_eq!(
            Address::parse("[arm].[output].[a].[b]"),
            Err(AddressError::SegmentCount(4))
        );
        assert_eq!(
            Address::parse("[arm].[attr].[joint]"),
            Err(AddressError::UnknownCategory("attr".into()))
        );
        assert_eq!(
            Address::parse("[].[output].[joint]"),
            Err(AddressError::EmptySegment("label"))
        );
        assert_eq!(
            Address::parse("[arm].[output].joint"),
            Err(AddressError::MissingBrackets)
        );
    }

    #[test]
    fn detection_is_lenient() {
        assert!(Address::detect("[not].[an address]").is_none());
        assert!(Address::is_address(&Value::text("[a].[output].[b]")));
        assert!(!Address::is_address(&Value::text("plain [text].with dots")));
        assert!(!Address::is_address(&Value::from(3)));
    }

    #[test]
    fn serde_uses_the_string_form() {
        let a = Address::new("root", AttributeCategory::Requirement, "parent");
        let s = serde_json::to_string(&a).unwrap();
        assert_eq!(s, r#""[root].[requirement].[parent]""#);
        let back: Address = serde_json::from_str(&s).unwrap();
        assert_eq!(back, a);
    }
}

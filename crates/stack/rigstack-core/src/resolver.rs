//! Address resolution: converting between live attributes and `[label].[category].[name]`
//! strings, scoped to one stack.
//!
//! Addresses are looked up fresh on every call. Nothing here caches a resolved attribute,
//! so removing a component simply makes its addresses stop resolving.

use rigstack_api_core::{Address, Value};

use crate::attribute::Attribute;
use crate::stack::Stack;

/// Address of `attribute`, owned by the component labelled `label`.
pub fn form_address(label: &str, attribute: &Attribute) -> Address {
    Address::new(label, attribute.category(), attribute.name())
}

/// Lenient parse: `None` for anything that is not a well-formed address.
pub fn parse(address: &str) -> Option<Address> {
    Address::detect(address)
}

/// True when `value` is text holding a well-formed address.
pub fn is_address(value: &Value) -> bool {
    Address::is_address(value)
}

/// Resolve an address string to the attribute it names.
///
/// The component is the first one in build order whose label matches; labels are expected
/// to be unique but this is not enforced.
pub fn resolve<'s>(address: &str, stack: &'s Stack) -> Option<&'s Attribute> {
    parse(address).and_then(|address| resolve_address(&address, stack))
}

pub fn resolve_address<'s>(address: &Address, stack: &'s Stack) -> Option<&'s Attribute> {
    let id = stack.get_component_by_label(&address.label)?;
    stack
        .component(id)?
        .attribute(address.category, &address.name)
}

/// Replace addresses held in `value` with the current values they point at.
///
/// Text that resolves is replaced; lists are processed element by element; everything
/// else, including text that looks like an address but does not resolve, is returned as a
/// literal. Only one level is followed.
pub fn dereference(value: &Value, stack: &Stack) -> Value {
    match value {
        Value::Text(text) => match resolve(text, stack) {
            Some(target) => target.get().clone(),
            None => value.clone(),
        },
        Value::List(items) => Value::List(items.iter().map(|item| dereference(item, stack)).collect()),
        _ => value.clone(),
    }
}

//! rigstack-api-core: attribute values and string addresses (core, host-agnostic)

pub mod address;
pub mod json;
pub mod value;

pub use address::{Address, AddressError, AttributeCategory};
pub use value::{Value, ValueKind};

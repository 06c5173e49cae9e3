// ABOUTME: Validated domain types shared across the crate.
// ABOUTME: Addresses, phantom-typed identifiers, and attribute values.

mod address;
mod id;
mod value;

pub use address::{Address, AddressError};
pub use id::{Id, ObjectKey, ObjectMarker, ProviderId, ProviderMarker};
pub use value::Value;

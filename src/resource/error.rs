// ABOUTME: Validation errors for desired-state documents.
// ABOUTME: All of these abort an apply before any resource is touched.

use crate::types::{Address, AddressError};
use thiserror::Error;

/// Errors produced while parsing and validating a desired-state document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },

    #[error("unknown resource kind in address `{0}`")]
    UnknownKind(Address),

    #[error("duplicate address `{0}`")]
    DuplicateAddress(Address),

    #[error("`{from}` refers to undeclared resource `{target}`")]
    UnknownReference { from: Address, target: String },

    #[error("`{from}` refers to output `{output}`, which `{to}` does not export")]
    UnknownOutput {
        from: Address,
        to: Address,
        output: String,
    },

    #[error("invalid reference in `{address}`: {detail}")]
    InvalidReference { address: Address, detail: String },

    #[error("schema violation in `{address}`: {detail}")]
    SchemaViolation { address: Address, detail: String },
}

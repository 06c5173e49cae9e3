// ABOUTME: Shared types crossing the provider trait boundary.
// ABOUTME: Resolved attributes, create responses, and remote object listings.

use crate::types::{ObjectKey, ProviderId, Value};
use std::collections::BTreeMap;

/// Attribute map with every reference substituted; what providers see.
pub type Attributes = BTreeMap<String, Value>;

/// Result of a successful create call.
#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub id: ProviderId,
    pub outputs: Attributes,
}

/// One object in a storage resource, as reported by a listing.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub key: ObjectKey,
    /// Content hash, used by the mirror to skip unchanged uploads.
    pub content_hash: String,
}

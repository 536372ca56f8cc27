//! The error vocabulary shared by partitions and the router.
//!
//! Partition-produced errors propagate through the nexus unchanged; errors
//! raised purely in router logic (duplicate suffix, unknown suffix on remove,
//! illegal empty-DN operation, cross-partition move) use the same vocabulary
//! and are raised at the nexus boundary.

use crate::dn::DnError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("name not found: {dn:?}")]
    NameNotFound { dn: String },

    #[error("invalid attribute identifier: {id:?}")]
    InvalidAttributeIdentifier { id: String },

    #[error("no such attribute: {id:?}")]
    NoSuchAttribute { id: String },

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    #[error(
        "operation affects multiple stores: source {source_dn:?} and destination \
         {destination_dn:?} resolve to different partitions"
    )]
    AffectsMultipleStores {
        source_dn: String,
        destination_dn: String,
    },

    #[error("entry already exists: {dn:?}")]
    EntryAlreadyExists { dn: String },

    #[error("not allowed on non-leaf entry: {dn:?}")]
    NotAllowedOnNonLeaf { dn: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid DN: {0}")]
    InvalidDn(#[from] DnError),
}

pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;

//! Shared data types for the directory routing core: distinguished names,
//! attribute values, entries, operation payloads and the common error
//! vocabulary used across partition implementations and the nexus.

pub mod dn;
pub mod entry;
pub mod error;
pub mod ops;
pub mod value;

pub use dn::{Ava, Dn, DnError, NormalizedDn, Rdn};
pub use entry::{Attribute, Entry};
pub use error::{DirectoryError, Result};
pub use value::Value;

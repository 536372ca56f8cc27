//! The storage-partition contract consumed by the router, plus the
//! in-memory implementation used by embedders and tests.
//!
//! A partition owns every entry at or below its suffix DN. The router never
//! bypasses this contract for entry data; anything it cannot answer from its
//! own state (the root DSE) is forwarded here.

pub mod mem;

pub use mem::MemPartition;

use dirdb_schema::SchemaRegistry;
use dirdb_types::dn::{Dn, NormalizedDn, Rdn};
use dirdb_types::entry::Entry;
use dirdb_types::error::Result;
use dirdb_types::ops::{AttributeSelection, Filter, Modification, SearchScope};
use std::fmt::Debug;
use std::sync::Arc;

/// Service-wide collaborators handed to a partition at [`Partition::init`]
/// time.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    registry: Arc<dyn SchemaRegistry>,
}

impl ServiceContext {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn schema_registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }
}

/// An independently initializable storage unit owning one suffix.
///
/// Lifecycle: *unconfigured* → [`Partition::init`] → *initialized* (serves
/// operations) → [`Partition::destroy`] → *destroyed*. All methods take
/// `&self`; implementations use interior mutability and must be safe to call
/// from multiple threads.
pub trait Partition: Debug + Send + Sync {
    /// Unique identifier of this partition.
    fn id(&self) -> &str;

    /// The normalized suffix; every entry in this partition sits at or below
    /// it.
    fn suffix_dn(&self) -> &NormalizedDn;

    /// The user-provided form of the suffix, as advertised in
    /// `namingContexts`.
    fn up_suffix_dn(&self) -> &Dn;

    fn init(&self, ctx: &ServiceContext) -> Result<()>;

    fn destroy(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Flush buffered state to durable storage.
    fn sync(&self) -> Result<()>;

    fn add(&self, entry: Entry) -> Result<()>;

    fn delete(&self, dn: &Dn) -> Result<()>;

    fn modify(&self, dn: &Dn, mods: &[Modification]) -> Result<()>;

    fn rename(&self, dn: &Dn, new_rdn: &Rdn, delete_old_rdn: bool) -> Result<()>;

    fn move_entry(&self, dn: &Dn, new_parent: &Dn) -> Result<()>;

    fn move_and_rename(
        &self,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
    ) -> Result<()>;

    /// Immediate children of `dn`, excluding `dn` itself.
    fn list(&self, dn: &Dn) -> Result<Vec<Entry>>;

    fn search(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        attrs: &AttributeSelection,
    ) -> Result<Vec<Entry>>;

    fn lookup(&self, dn: &Dn, attrs: &AttributeSelection) -> Result<Entry>;

    fn has_entry(&self, dn: &Dn) -> Result<bool>;

    fn bind(&self, dn: &Dn, credentials: &[u8]) -> Result<()>;

    fn unbind(&self, dn: &Dn) -> Result<()>;
}

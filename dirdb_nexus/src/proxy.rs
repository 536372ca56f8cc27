//! The outward-facing entry point. Every externally visible operation
//! verifies the nexus is running, pushes an invocation context onto the
//! calling thread's stack, and forwards through the interceptor chain; the
//! context pops on every exit path via the guard. The two canonical root
//! DSE projections are cached, since root DSE content changes only on
//! topology-changing admin operations but is read on nearly every
//! connection.

use crate::bypass::BypassSet;
use crate::context::{self, OperationContext};
use crate::nexus::NexusConfig;
use crate::pipeline::{InterceptorChain, OperationOutcome};
use crate::nexus::PartitionNexus;
use dirdb_partition::Partition;
use dirdb_types::dn::{Dn, NormalizedDn, Rdn};
use dirdb_types::entry::Entry;
use dirdb_types::error::{DirectoryError, Result};
use dirdb_types::ops::{
    ALL_OPERATIONAL_ATTRIBUTES, AttributeSelection, DirectoryOperation, Filter, Modification,
    SearchScope,
};
use dirdb_types::value::Value;
use parking_lot::RwLock;
use std::sync::Arc;

/// Wraps the nexus and its pipeline behind the externally visible operation
/// surface.
#[derive(Debug)]
pub struct NexusProxy {
    nexus: Arc<PartitionNexus>,
    chain: Arc<InterceptorChain>,
    // The no-selection lookup and the operational-attributes-only lookup of
    // the root DSE, lazily published and shared until invalidated.
    cached_root_dse: RwLock<Option<Arc<Entry>>>,
    cached_root_dse_operational: RwLock<Option<Arc<Entry>>>,
}

impl NexusProxy {
    pub fn new(nexus: Arc<PartitionNexus>, chain: Arc<InterceptorChain>) -> Self {
        Self {
            nexus,
            chain,
            cached_root_dse: RwLock::new(None),
            cached_root_dse_operational: RwLock::new(None),
        }
    }

    pub fn nexus(&self) -> &Arc<PartitionNexus> {
        &self.nexus
    }

    // ---- administrative surface; all of it can change root DSE content ----

    pub fn init(&self, config: NexusConfig) -> Result<()> {
        let result = self.nexus.init(config);
        self.invalidate_root_dse_caches();
        result
    }

    pub fn destroy(&self) {
        self.nexus.destroy();
        self.invalidate_root_dse_caches();
    }

    pub fn add_partition(&self, partition: Arc<dyn Partition>) -> Result<()> {
        let result = self.nexus.add_partition(partition);
        self.invalidate_root_dse_caches();
        result
    }

    pub fn remove_partition(&self, suffix: &NormalizedDn) -> Result<()> {
        let result = self.nexus.remove_partition(suffix);
        self.invalidate_root_dse_caches();
        result
    }

    pub fn register_extensions(&self, oids: &[String]) {
        self.nexus.register_extensions(oids);
        self.invalidate_root_dse_caches();
    }

    pub fn register_sasl_mechanisms(&self, mechanisms: &[String]) {
        self.nexus.register_sasl_mechanisms(mechanisms);
        self.invalidate_root_dse_caches();
    }

    pub fn list_suffixes(&self) -> Vec<NormalizedDn> {
        self.nexus.list_suffixes()
    }

    pub fn system_partition(&self) -> Option<Arc<dyn Partition>> {
        self.nexus.system_partition()
    }

    // ---- operations ----

    pub fn add(&self, entry: Entry) -> Result<()> {
        self.invoke(DirectoryOperation::Add { entry }, None)
            .map(|_| ())
    }

    pub fn delete(&self, dn: &Dn) -> Result<()> {
        self.invoke(DirectoryOperation::Delete { dn: dn.clone() }, None)
            .map(|_| ())
    }

    pub fn modify(&self, dn: &Dn, mods: Vec<Modification>) -> Result<()> {
        self.invoke(
            DirectoryOperation::Modify {
                dn: dn.clone(),
                mods,
            },
            None,
        )
        .map(|_| ())
    }

    pub fn rename(&self, dn: &Dn, new_rdn: Rdn, delete_old_rdn: bool) -> Result<()> {
        self.invoke(
            DirectoryOperation::Rename {
                dn: dn.clone(),
                new_rdn,
                delete_old_rdn,
            },
            None,
        )
        .map(|_| ())
    }

    pub fn move_entry(&self, dn: &Dn, new_parent: &Dn) -> Result<()> {
        self.invoke(
            DirectoryOperation::Move {
                dn: dn.clone(),
                new_parent: new_parent.clone(),
            },
            None,
        )
        .map(|_| ())
    }

    pub fn move_and_rename(
        &self,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: Rdn,
        delete_old_rdn: bool,
    ) -> Result<()> {
        self.invoke(
            DirectoryOperation::MoveAndRename {
                dn: dn.clone(),
                new_parent: new_parent.clone(),
                new_rdn,
                delete_old_rdn,
            },
            None,
        )
        .map(|_| ())
    }

    pub fn list(&self, dn: &Dn) -> Result<Vec<Entry>> {
        match self.invoke(DirectoryOperation::List { dn: dn.clone() }, None)? {
            OperationOutcome::Entries(entries) => Ok(entries),
            other => Err(unexpected_outcome("list", &other)),
        }
    }

    pub fn search(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: Filter,
        attrs: AttributeSelection,
    ) -> Result<Vec<Entry>> {
        match self.invoke(
            DirectoryOperation::Search {
                base: base.clone(),
                scope,
                filter,
                attrs,
            },
            None,
        )? {
            OperationOutcome::Entries(entries) => Ok(entries),
            other => Err(unexpected_outcome("search", &other)),
        }
    }

    pub fn lookup(&self, dn: &Dn, attrs: &AttributeSelection) -> Result<Entry> {
        self.lookup_with_bypass(dn, attrs, None)
    }

    /// Lookup with an explicit bypass set, used by re-entrant internal
    /// callers. The two canonical root DSE projections are answered from
    /// cache when warm.
    pub fn lookup_with_bypass(
        &self,
        dn: &Dn,
        attrs: &AttributeSelection,
        bypass: Option<BypassSet>,
    ) -> Result<Entry> {
        if dn.is_empty() {
            if let Some(cached) = self.cached_root_dse_projection(attrs) {
                return Ok(cached.as_ref().clone());
            }
        }
        let outcome = self.invoke(
            DirectoryOperation::Lookup {
                dn: dn.clone(),
                attrs: attrs.clone(),
            },
            bypass,
        )?;
        let OperationOutcome::Entry(entry) = outcome else {
            return Err(unexpected_outcome("lookup", &outcome));
        };
        if dn.is_empty() {
            self.publish_root_dse_projection(attrs, &entry);
        }
        Ok(entry)
    }

    pub fn has_entry(&self, dn: &Dn) -> Result<bool> {
        self.has_entry_with_bypass(dn, None)
    }

    pub fn has_entry_with_bypass(&self, dn: &Dn, bypass: Option<BypassSet>) -> Result<bool> {
        match self.invoke(DirectoryOperation::HasEntry { dn: dn.clone() }, bypass)? {
            OperationOutcome::Bool(present) => Ok(present),
            other => Err(unexpected_outcome("hasEntry", &other)),
        }
    }

    pub fn bind(&self, dn: &Dn, credentials: &[u8]) -> Result<()> {
        self.invoke(
            DirectoryOperation::Bind {
                dn: dn.clone(),
                credentials: credentials.to_vec(),
            },
            None,
        )
        .map(|_| ())
    }

    pub fn unbind(&self, dn: &Dn) -> Result<()> {
        self.invoke(DirectoryOperation::Unbind { dn: dn.clone() }, None)
            .map(|_| ())
    }

    pub fn compare(&self, dn: &Dn, attribute: &str, value: Value) -> Result<bool> {
        match self.invoke(
            DirectoryOperation::Compare {
                dn: dn.clone(),
                attribute: attribute.to_string(),
                value,
            },
            None,
        )? {
            OperationOutcome::Bool(matched) => Ok(matched),
            other => Err(unexpected_outcome("compare", &other)),
        }
    }

    pub fn get_matched_name(&self, dn: &Dn) -> Result<Dn> {
        self.get_matched_name_with_bypass(dn, None)
    }

    pub fn get_matched_name_with_bypass(
        &self,
        dn: &Dn,
        bypass: Option<BypassSet>,
    ) -> Result<Dn> {
        match self.invoke(DirectoryOperation::GetMatchedName { dn: dn.clone() }, bypass)? {
            OperationOutcome::Dn(matched) => Ok(matched),
            other => Err(unexpected_outcome("getMatchedName", &other)),
        }
    }

    fn invoke(
        &self,
        operation: DirectoryOperation,
        bypass: Option<BypassSet>,
    ) -> Result<OperationOutcome> {
        self.nexus.ensure_running()?;
        let ctx = match bypass {
            Some(set) => OperationContext::with_bypass(operation, set),
            None => OperationContext::new(operation),
        };
        // The guard pops the context on every exit path out of the chain.
        let _guard = context::push(ctx.clone());
        self.chain.run(&ctx)
    }

    fn cached_root_dse_projection(&self, attrs: &AttributeSelection) -> Option<Arc<Entry>> {
        if matches!(attrs, AttributeSelection::All) {
            self.cached_root_dse.read().clone()
        } else if is_operational_only(attrs) {
            self.cached_root_dse_operational.read().clone()
        } else {
            None
        }
    }

    fn publish_root_dse_projection(&self, attrs: &AttributeSelection, entry: &Entry) {
        if matches!(attrs, AttributeSelection::All) {
            *self.cached_root_dse.write() = Some(Arc::new(entry.clone()));
        } else if is_operational_only(attrs) {
            *self.cached_root_dse_operational.write() = Some(Arc::new(entry.clone()));
        }
    }

    fn invalidate_root_dse_caches(&self) {
        *self.cached_root_dse.write() = None;
        *self.cached_root_dse_operational.write() = None;
    }
}

fn is_operational_only(attrs: &AttributeSelection) -> bool {
    matches!(attrs, AttributeSelection::Ids(ids)
        if ids.len() == 1 && ids[0] == ALL_OPERATIONAL_ATTRIBUTES)
}

fn unexpected_outcome(operation: &str, outcome: &OperationOutcome) -> DirectoryError {
    DirectoryError::UnsupportedOperation {
        message: format!("{operation} produced an unexpected {outcome:?} outcome"),
    }
}

//! The partition nexus: owns the suffix map, the routing trie and the root
//! DSE as one consistency unit, exposes the same operation contract as a
//! partition, and dispatches every DN-bearing call to the partition owning
//! it. Zero-length target DNs are answered from the root DSE before any
//! trie resolution is attempted.

use crate::pipeline::OperationOutcome;
use crate::root_dse::RootDse;
use crate::trie::SuffixTrie;
use dirdb_partition::{Partition, ServiceContext};
use dirdb_schema::SchemaRegistry;
use dirdb_types::dn::{Dn, NormalizedDn};
use dirdb_types::entry::{Attribute, Entry};
use dirdb_types::error::{DirectoryError, Result};
use dirdb_types::ops::{AttributeSelection, DirectoryOperation, Filter, SearchScope};
use dirdb_types::value::Value;
use observability_deps::tracing::{debug, error, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The mandatory system partition suffix, in normalized form.
pub const SYSTEM_PARTITION_SUFFIX: &str = "ou=system";

/// Nexus lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Running,
    Stopped,
}

/// Startup configuration: the mandatory system partition plus every other
/// configured partition, in registration order.
#[derive(Debug)]
pub struct NexusConfig {
    pub system_partition: Arc<dyn Partition>,
    pub partitions: Vec<Arc<dyn Partition>>,
}

// Suffix map, trie, root DSE, reservations and stage form a single
// consistency unit behind one lock.
#[derive(Debug)]
struct Topology {
    partitions: BTreeMap<NormalizedDn, Arc<dyn Partition>>,
    reservations: BTreeSet<NormalizedDn>,
    trie: SuffixTrie,
    root_dse: RootDse,
    stage: Stage,
}

/// The router. Construct at service start, drop at service stop; every
/// collaborator receives a handle rather than ambient static state.
#[derive(Debug)]
pub struct PartitionNexus {
    registry: Arc<dyn SchemaRegistry>,
    topology: RwLock<Topology>,
}

impl PartitionNexus {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            topology: RwLock::new(Topology {
                partitions: BTreeMap::new(),
                reservations: BTreeSet::new(),
                trie: SuffixTrie::new(),
                root_dse: RootDse::new(),
                stage: Stage::Created,
            }),
        }
    }

    pub fn schema_registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn stage(&self) -> Stage {
        self.topology.read().stage
    }

    pub fn is_running(&self) -> bool {
        self.stage() == Stage::Running
    }

    pub fn ensure_running(&self) -> Result<()> {
        if !self.is_running() {
            return Err(DirectoryError::ServiceUnavailable);
        }
        Ok(())
    }

    /// Bring the nexus up: system partition first, then every other
    /// configured partition in order. On any failure every partition
    /// registered by this call is removed again in reverse order before the
    /// error is re-raised.
    pub fn init(&self, config: NexusConfig) -> Result<()> {
        if self.is_running() {
            return Err(DirectoryError::Configuration {
                message: "partition nexus is already running".to_string(),
            });
        }
        if config.system_partition.suffix_dn().as_str() != SYSTEM_PARTITION_SUFFIX {
            return Err(DirectoryError::Configuration {
                message: format!(
                    "system partition suffix must normalize to {SYSTEM_PARTITION_SUFFIX}, \
                     got {}",
                    config.system_partition.suffix_dn()
                ),
            });
        }

        let mut registered: Vec<NormalizedDn> = Vec::new();
        let all = std::iter::once(config.system_partition).chain(config.partitions);
        for partition in all {
            let suffix = partition.suffix_dn().clone();
            if let Err(e) = self.add_partition(partition) {
                error!(%suffix, %e, "partition registration failed during nexus init, rolling back");
                for done in registered.iter().rev() {
                    if let Err(e) = self.remove_partition(done) {
                        error!(suffix = %done, %e, "rollback of partition registration failed");
                    }
                }
                return Err(e);
            }
            registered.push(suffix);
        }

        self.topology.write().stage = Stage::Running;
        info!(partitions = registered.len(), "partition nexus running");
        Ok(())
    }

    /// Best-effort teardown over a snapshot of the registered partitions:
    /// individual sync/destroy failures are logged and teardown continues,
    /// so no store is left un-attempted.
    pub fn destroy(&self) {
        let snapshot: Vec<(NormalizedDn, Arc<dyn Partition>)> = {
            let mut top = self.topology.write();
            top.stage = Stage::Stopped;
            top.root_dse.clear_naming_contexts();
            top.trie = SuffixTrie::new();
            std::mem::take(&mut top.partitions).into_iter().collect()
        };
        for (suffix, partition) in snapshot {
            if let Err(e) = partition.sync() {
                error!(%suffix, %e, "failed to sync partition during nexus shutdown");
            }
            if let Err(e) = partition.destroy() {
                error!(%suffix, %e, "failed to destroy partition during nexus shutdown");
            }
        }
        info!("partition nexus stopped");
    }

    /// Register a partition: reserve its suffix, initialize it outside the
    /// topology lock if needed, then commit trie + map + root DSE as one
    /// atomic step. Initialization failure leaves no trace.
    pub fn add_partition(&self, partition: Arc<dyn Partition>) -> Result<()> {
        let handle = self.reserve(partition)?;
        if !handle.partition.is_initialized() {
            handle
                .partition
                .init(&ServiceContext::new(Arc::clone(&self.registry)))?;
        }
        handle.commit()
    }

    fn reserve(&self, partition: Arc<dyn Partition>) -> Result<RegistrationHandle<'_>> {
        let suffix = partition.suffix_dn().clone();
        if suffix.is_empty() {
            return Err(DirectoryError::Configuration {
                message: "cannot register a partition at the empty suffix".to_string(),
            });
        }
        let mut top = self.topology.write();
        if top.partitions.contains_key(&suffix) || top.reservations.contains(&suffix) {
            return Err(DirectoryError::Configuration {
                message: format!("a partition is already registered at suffix {suffix}"),
            });
        }
        top.reservations.insert(suffix.clone());
        Ok(RegistrationHandle {
            nexus: self,
            suffix,
            partition,
            committed: false,
        })
    }

    /// Deregister the partition at exactly `suffix`: naming context out,
    /// map entry out, trie rebuilt from the remaining map, then the
    /// partition is flushed and destroyed, in that order.
    pub fn remove_partition(&self, suffix: &NormalizedDn) -> Result<()> {
        let partition = {
            let mut top = self.topology.write();
            let Some(partition) = top.partitions.remove(suffix) else {
                return Err(DirectoryError::NameNotFound {
                    dn: suffix.to_string(),
                });
            };
            let up_suffix = partition.up_suffix_dn().to_string();
            top.root_dse.remove_naming_context(&up_suffix);
            top.trie = SuffixTrie::rebuild(&top.partitions)?;
            partition
        };
        partition.sync()?;
        partition.destroy()?;
        info!(%suffix, "removed partition");
        Ok(())
    }

    /// Currently registered suffixes, in normalized form.
    pub fn list_suffixes(&self) -> Vec<NormalizedDn> {
        self.topology.read().partitions.keys().cloned().collect()
    }

    /// The mandatory system partition, once registered.
    pub fn system_partition(&self) -> Option<Arc<dyn Partition>> {
        let suffix = NormalizedDn::from_components(vec![SYSTEM_PARTITION_SUFFIX.to_string()]);
        self.topology.read().partitions.get(&suffix).map(Arc::clone)
    }

    /// Resolve a normalized DN to its owning partition.
    pub fn resolve(&self, dn: &NormalizedDn) -> Option<Arc<dyn Partition>> {
        self.topology.read().trie.resolve(dn)
    }

    /// Resolve a user-provided DN, raising `NameNotFound` on a miss.
    pub fn get_partition(&self, dn: &Dn) -> Result<Arc<dyn Partition>> {
        let ndn = self.registry.normalize_dn(dn)?;
        self.resolve(&ndn)
            .ok_or_else(|| DirectoryError::NameNotFound { dn: dn.to_string() })
    }

    /// A clone of the canonical root DSE with its full attribute set.
    pub fn root_dse(&self) -> Entry {
        self.topology.read().root_dse.entry().clone()
    }

    pub fn register_extensions(&self, oids: &[String]) {
        self.topology.write().root_dse.register_extensions(oids);
    }

    pub fn register_sasl_mechanisms(&self, mechanisms: &[String]) {
        self.topology
            .write()
            .root_dse
            .register_sasl_mechanisms(mechanisms);
    }

    /// The longest DN prefix, shortening one RDN at a time from the leaf
    /// end, naming an entry that actually exists; the empty DN when nothing
    /// matches. Queries the resolved partition's live data, not suffix
    /// topology.
    pub fn get_matched_name(&self, dn: &Dn) -> Result<Dn> {
        let mut candidate = dn.clone();
        while !candidate.is_empty() {
            let ndn = self.registry.normalize_dn(&candidate)?;
            if let Some(partition) = self.resolve(&ndn) {
                if matches!(partition.has_entry(&candidate), Ok(true)) {
                    return Ok(candidate);
                }
            }
            candidate = candidate.parent().unwrap_or_default();
        }
        Ok(Dn::root())
    }

    /// Compare one attribute of the target entry against a value: direct
    /// match first, then normalizer-based matching value-by-value,
    /// short-circuiting on the first hit. Bytes are compared after UTF-8
    /// conversion, so text and binary values can match each other.
    pub fn compare(&self, dn: &Dn, attribute: &str, value: &Value) -> Result<bool> {
        let Some(at) = self.registry.attribute_type(attribute) else {
            return Err(DirectoryError::InvalidAttributeIdentifier {
                id: attribute.to_string(),
            });
        };
        let entry = if dn.is_empty() {
            self.root_dse()
        } else {
            self.get_partition(dn)?
                .lookup(dn, &AttributeSelection::All)?
        };
        let attr = find_attribute(&entry, attribute, &at).ok_or_else(|| {
            DirectoryError::NoSuchAttribute {
                id: attribute.to_string(),
            }
        })?;

        if attr.values().contains(value) {
            return Ok(true);
        }
        let normalizer = at.equality();
        let wanted = normalizer.normalize(value);
        Ok(attr
            .values()
            .iter()
            .any(|v| normalizer.normalize(v).as_bytes() == wanted.as_bytes()))
    }

    /// Dispatch one operation: empty target DN goes to the root DSE,
    /// everything else resolves through the trie and is forwarded unchanged.
    /// Partition errors propagate unwrapped.
    pub fn execute(&self, op: &DirectoryOperation) -> Result<OperationOutcome> {
        if op.target_dn().is_empty() {
            return self.execute_root_dse(op);
        }
        debug!(kind = %op.kind(), dn = %op.target_dn(), "dispatching operation");
        match op {
            DirectoryOperation::Add { entry } => {
                self.get_partition(entry.dn())?.add(entry.clone())?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Delete { dn } => {
                self.get_partition(dn)?.delete(dn)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Modify { dn, mods } => {
                self.get_partition(dn)?.modify(dn, mods)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Rename {
                dn,
                new_rdn,
                delete_old_rdn,
            } => {
                self.get_partition(dn)?
                    .rename(dn, new_rdn, *delete_old_rdn)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Move { dn, new_parent } => {
                let partition = self.same_partition(dn, new_parent)?;
                partition.move_entry(dn, new_parent)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::MoveAndRename {
                dn,
                new_parent,
                new_rdn,
                delete_old_rdn,
            } => {
                let partition = self.same_partition(dn, new_parent)?;
                partition.move_and_rename(dn, new_parent, new_rdn, *delete_old_rdn)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::List { dn } => {
                Ok(OperationOutcome::Entries(self.get_partition(dn)?.list(dn)?))
            }
            DirectoryOperation::Search {
                base,
                scope,
                filter,
                attrs,
            } => Ok(OperationOutcome::Entries(
                self.get_partition(base)?
                    .search(base, *scope, filter, attrs)?,
            )),
            DirectoryOperation::Lookup { dn, attrs } => Ok(OperationOutcome::Entry(
                self.get_partition(dn)?.lookup(dn, attrs)?,
            )),
            DirectoryOperation::HasEntry { dn } => Ok(OperationOutcome::Bool(
                self.get_partition(dn)?.has_entry(dn)?,
            )),
            DirectoryOperation::Bind { dn, credentials } => {
                self.get_partition(dn)?.bind(dn, credentials)?;
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Unbind { dn } => {
                // Unbind is best-effort: a DN no partition owns has no
                // session state to discard.
                if let Ok(ndn) = self.registry.normalize_dn(dn) {
                    if let Some(partition) = self.resolve(&ndn) {
                        partition.unbind(dn)?;
                    }
                }
                Ok(OperationOutcome::Done)
            }
            DirectoryOperation::Compare {
                dn,
                attribute,
                value,
            } => Ok(OperationOutcome::Bool(self.compare(dn, attribute, value)?)),
            DirectoryOperation::GetMatchedName { dn } => {
                Ok(OperationOutcome::Dn(self.get_matched_name(dn)?))
            }
        }
    }

    /// Resolve source and destination-parent; a move whose ends land in
    /// different partitions cannot be serviced by either one.
    fn same_partition(&self, source: &Dn, destination: &Dn) -> Result<Arc<dyn Partition>> {
        let src = self.get_partition(source)?;
        let dst = self.get_partition(destination)?;
        if !Arc::ptr_eq(&src, &dst) {
            return Err(DirectoryError::AffectsMultipleStores {
                source_dn: source.to_string(),
                destination_dn: destination.to_string(),
            });
        }
        Ok(src)
    }

    fn execute_root_dse(&self, op: &DirectoryOperation) -> Result<OperationOutcome> {
        match op {
            DirectoryOperation::Lookup { attrs, .. } => {
                let top = self.topology.read();
                Ok(OperationOutcome::Entry(
                    top.root_dse.lookup(attrs, self.registry.as_ref()),
                ))
            }
            DirectoryOperation::Search {
                scope,
                filter,
                attrs,
                ..
            } => {
                if *scope == SearchScope::Object && is_object_class_presence(filter) {
                    let top = self.topology.read();
                    Ok(OperationOutcome::Entries(vec![
                        top.root_dse.search_projection(attrs, self.registry.as_ref()),
                    ]))
                } else {
                    // There is nothing below the root DSE to search.
                    Err(DirectoryError::NameNotFound { dn: String::new() })
                }
            }
            DirectoryOperation::HasEntry { .. } => Ok(OperationOutcome::Bool(true)),
            DirectoryOperation::Unbind { .. } => Ok(OperationOutcome::Done),
            DirectoryOperation::Compare {
                attribute, value, ..
            } => Ok(OperationOutcome::Bool(self.compare(
                &Dn::root(),
                attribute,
                value,
            )?)),
            DirectoryOperation::GetMatchedName { .. } => Ok(OperationOutcome::Dn(Dn::root())),
            DirectoryOperation::List { .. } | DirectoryOperation::Bind { .. } => {
                Err(DirectoryError::NameNotFound { dn: String::new() })
            }
            DirectoryOperation::Add { .. }
            | DirectoryOperation::Delete { .. }
            | DirectoryOperation::Modify { .. }
            | DirectoryOperation::Rename { .. }
            | DirectoryOperation::Move { .. }
            | DirectoryOperation::MoveAndRename { .. } => {
                Err(DirectoryError::UnsupportedOperation {
                    message: format!("the root DSE is read-only; {} rejected", op.kind()),
                })
            }
        }
    }
}

fn is_object_class_presence(filter: &Filter) -> bool {
    matches!(filter, Filter::Present(id) if id.eq_ignore_ascii_case("objectClass"))
}

fn find_attribute<'a>(
    entry: &'a Entry,
    id: &str,
    at: &dirdb_schema::AttributeType,
) -> Option<&'a Attribute> {
    if let Some(attr) = entry.get(id) {
        return Some(attr);
    }
    if let Some(attr) = entry.get(at.oid()) {
        return Some(attr);
    }
    at.names().iter().find_map(|name| entry.get(name))
}

/// Drop-rollback reservation for one suffix: committing installs the trie
/// leaf, the map entry and the naming context under one write lock; dropping
/// without commit only releases the reservation.
#[derive(Debug)]
struct RegistrationHandle<'a> {
    nexus: &'a PartitionNexus,
    suffix: NormalizedDn,
    partition: Arc<dyn Partition>,
    committed: bool,
}

impl RegistrationHandle<'_> {
    fn commit(mut self) -> Result<()> {
        self.committed = true;
        let mut top = self.nexus.topology.write();
        top.reservations.remove(&self.suffix);
        // Trie conflicts (nested suffixes) surface here, before anything
        // else is mutated.
        top.trie
            .register(&self.suffix, Arc::clone(&self.partition))?;
        top.partitions
            .insert(self.suffix.clone(), Arc::clone(&self.partition));
        top.root_dse
            .add_naming_context(&self.partition.up_suffix_dn().to_string());
        info!(suffix = %self.suffix, id = self.partition.id(), "registered partition");
        Ok(())
    }
}

impl Drop for RegistrationHandle<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.nexus
                .topology
                .write()
                .reservations
                .remove(&self.suffix);
            debug!(suffix = %self.suffix, "rolled back partition reservation");
        }
    }
}

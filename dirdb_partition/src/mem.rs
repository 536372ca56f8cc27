//! An in-memory partition: a sorted map of normalized DN → entry behind a
//! read-write lock. Suitable for embedders that want a directory without a
//! disk, and the workhorse of the test suite.

use crate::{Partition, ServiceContext};
use dirdb_schema::{SchemaRegistry, projection::Projection};
use dirdb_types::dn::{Dn, NormalizedDn, Rdn};
use dirdb_types::entry::{Attribute, Entry};
use dirdb_types::error::{DirectoryError, Result};
use dirdb_types::ops::{AttributeSelection, Filter, Modification, ModificationKind, SearchScope};
use dirdb_types::value::Value;
use observability_deps::tracing::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct State {
    initialized: bool,
    registry: Arc<dyn SchemaRegistry>,
    entries: BTreeMap<NormalizedDn, Entry>,
}

/// A complete in-memory [`Partition`].
#[derive(Debug)]
pub struct MemPartition {
    id: String,
    suffix: NormalizedDn,
    up_suffix: Dn,
    state: RwLock<State>,
}

impl MemPartition {
    /// Create an unconfigured partition owning `suffix`. The registry is
    /// used to normalize the suffix now and entry DNs later; `init` adopts
    /// the service-wide registry in its place.
    pub fn new(
        id: impl Into<String>,
        suffix: &str,
        registry: Arc<dyn SchemaRegistry>,
    ) -> Result<Self> {
        let up_suffix = Dn::parse(suffix)?;
        let suffix = registry.normalize_dn(&up_suffix)?;
        if suffix.is_empty() {
            return Err(DirectoryError::Configuration {
                message: "partition suffix must not be empty".to_string(),
            });
        }
        Ok(Self {
            id: id.into(),
            suffix,
            up_suffix,
            state: RwLock::new(State {
                initialized: false,
                registry,
                entries: BTreeMap::new(),
            }),
        })
    }

    fn registry(&self) -> Arc<dyn SchemaRegistry> {
        Arc::clone(&self.state.read().registry)
    }

    fn norm(&self, dn: &Dn) -> Result<NormalizedDn> {
        self.registry().normalize_dn(dn)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.state.read().initialized {
            return Err(DirectoryError::ServiceUnavailable);
        }
        Ok(())
    }

    /// Re-key `source` and its whole subtree below `target`, rewriting the
    /// stored entry DNs on the way.
    fn relocate(&self, source: &Dn, target: &Dn) -> Result<()> {
        self.ensure_initialized()?;
        let registry = self.registry();
        let src = registry.normalize_dn(source)?;
        let dst = registry.normalize_dn(target)?;
        let mut state = self.state.write();
        if !state.entries.contains_key(&src) {
            return Err(DirectoryError::NameNotFound {
                dn: source.to_string(),
            });
        }
        if state.entries.contains_key(&dst) {
            return Err(DirectoryError::EntryAlreadyExists {
                dn: target.to_string(),
            });
        }
        if src.is_prefix_of(&dst) {
            return Err(DirectoryError::UnsupportedOperation {
                message: format!("cannot move {source} below itself"),
            });
        }
        if dst != self.suffix {
            let parent = dst.parent().unwrap_or_default();
            if !state.entries.contains_key(&parent) {
                return Err(DirectoryError::NameNotFound {
                    dn: parent.to_string(),
                });
            }
        }

        let keys: Vec<NormalizedDn> = state
            .entries
            .keys()
            .filter(|k| src.is_prefix_of(k))
            .cloned()
            .collect();
        for key in keys {
            let Some(mut entry) = state.entries.remove(&key) else {
                continue;
            };
            let tail = key.components()[src.len()..].to_vec();
            let mut components = dst.components().to_vec();
            components.extend(tail);
            let new_key = NormalizedDn::from_components(components);

            let mut rdns = target.rdns().to_vec();
            rdns.extend_from_slice(&entry.dn().rdns()[source.len().min(entry.dn().len())..]);
            entry.set_dn(Dn::from_rdns(rdns));
            state.entries.insert(new_key, entry);
        }
        Ok(())
    }

    /// After a rename, make the entry's attributes reflect its new RDN.
    fn apply_rdn_change(
        &self,
        new_dn: &Dn,
        old_rdn: &Rdn,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
    ) -> Result<()> {
        let ndn = self.norm(new_dn)?;
        let mut state = self.state.write();
        let Some(entry) = state.entries.get_mut(&ndn) else {
            return Err(DirectoryError::NameNotFound {
                dn: new_dn.to_string(),
            });
        };
        if delete_old_rdn {
            for ava in old_rdn.avas() {
                entry.remove_value(ava.attribute(), &Value::text(ava.value()));
            }
        }
        for ava in new_rdn.avas() {
            entry.add_value(ava.attribute(), Value::text(ava.value()));
        }
        Ok(())
    }
}

impl Partition for MemPartition {
    fn id(&self) -> &str {
        &self.id
    }

    fn suffix_dn(&self) -> &NormalizedDn {
        &self.suffix
    }

    fn up_suffix_dn(&self) -> &Dn {
        &self.up_suffix
    }

    fn init(&self, ctx: &ServiceContext) -> Result<()> {
        let mut state = self.state.write();
        if state.initialized {
            return Ok(());
        }
        state.registry = Arc::clone(ctx.schema_registry());
        state.initialized = true;
        // Seed the context entry at the suffix so the partition is never
        // rooted on a missing parent.
        if !state.entries.contains_key(&self.suffix) {
            let mut entry = Entry::new(self.up_suffix.clone());
            entry.put(Attribute::new(
                "objectClass",
                [Value::text("top"), Value::text("extensibleObject")],
            ));
            if let Some(rdn) = self.up_suffix.rdn() {
                for ava in rdn.avas() {
                    entry.add_value(ava.attribute(), Value::text(ava.value()));
                }
            }
            state.entries.insert(self.suffix.clone(), entry);
        }
        info!(id = %self.id, suffix = %self.suffix, "initialized in-memory partition");
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        let mut state = self.state.write();
        state.entries.clear();
        state.initialized = false;
        info!(id = %self.id, suffix = %self.suffix, "destroyed in-memory partition");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    fn sync(&self) -> Result<()> {
        // Nothing durable to flush.
        debug!(id = %self.id, "sync");
        Ok(())
    }

    fn add(&self, entry: Entry) -> Result<()> {
        self.ensure_initialized()?;
        let ndn = self.norm(entry.dn())?;
        if !self.suffix.is_prefix_of(&ndn) {
            return Err(DirectoryError::NameNotFound {
                dn: entry.dn().to_string(),
            });
        }
        let mut state = self.state.write();
        if state.entries.contains_key(&ndn) {
            return Err(DirectoryError::EntryAlreadyExists {
                dn: entry.dn().to_string(),
            });
        }
        if ndn != self.suffix {
            let parent = ndn.parent().unwrap_or_default();
            if !state.entries.contains_key(&parent) {
                return Err(DirectoryError::NameNotFound {
                    dn: parent.to_string(),
                });
            }
        }
        state.entries.insert(ndn, entry);
        Ok(())
    }

    fn delete(&self, dn: &Dn) -> Result<()> {
        self.ensure_initialized()?;
        let ndn = self.norm(dn)?;
        let mut state = self.state.write();
        if !state.entries.contains_key(&ndn) {
            return Err(DirectoryError::NameNotFound { dn: dn.to_string() });
        }
        let has_children = state
            .entries
            .keys()
            .any(|k| ndn.is_prefix_of(k) && *k != ndn);
        if has_children {
            return Err(DirectoryError::NotAllowedOnNonLeaf { dn: dn.to_string() });
        }
        state.entries.remove(&ndn);
        Ok(())
    }

    fn modify(&self, dn: &Dn, mods: &[Modification]) -> Result<()> {
        self.ensure_initialized()?;
        let ndn = self.norm(dn)?;
        let mut state = self.state.write();
        let Some(entry) = state.entries.get_mut(&ndn) else {
            return Err(DirectoryError::NameNotFound { dn: dn.to_string() });
        };
        for m in mods {
            match m.kind {
                ModificationKind::Add => {
                    for value in &m.values {
                        entry.add_value(&m.attribute, value.clone());
                    }
                }
                ModificationKind::Replace => {
                    if m.values.is_empty() {
                        entry.remove(&m.attribute);
                    } else {
                        entry.put(Attribute::new(&m.attribute, m.values.iter().cloned()));
                    }
                }
                ModificationKind::Remove => {
                    if !entry.has_attribute(&m.attribute) {
                        return Err(DirectoryError::NoSuchAttribute {
                            id: m.attribute.clone(),
                        });
                    }
                    if m.values.is_empty() {
                        entry.remove(&m.attribute);
                    } else {
                        for value in &m.values {
                            entry.remove_value(&m.attribute, value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn rename(&self, dn: &Dn, new_rdn: &Rdn, delete_old_rdn: bool) -> Result<()> {
        let (Some(parent), Some(old_rdn)) = (dn.parent(), dn.rdn().cloned()) else {
            return Err(DirectoryError::UnsupportedOperation {
                message: "cannot rename the zero-length DN".to_string(),
            });
        };
        let target = parent.child(new_rdn.clone());
        self.relocate(dn, &target)?;
        self.apply_rdn_change(&target, &old_rdn, new_rdn, delete_old_rdn)
    }

    fn move_entry(&self, dn: &Dn, new_parent: &Dn) -> Result<()> {
        let Some(rdn) = dn.rdn().cloned() else {
            return Err(DirectoryError::UnsupportedOperation {
                message: "cannot move the zero-length DN".to_string(),
            });
        };
        self.relocate(dn, &new_parent.child(rdn))
    }

    fn move_and_rename(
        &self,
        dn: &Dn,
        new_parent: &Dn,
        new_rdn: &Rdn,
        delete_old_rdn: bool,
    ) -> Result<()> {
        let Some(old_rdn) = dn.rdn().cloned() else {
            return Err(DirectoryError::UnsupportedOperation {
                message: "cannot move the zero-length DN".to_string(),
            });
        };
        let target = new_parent.child(new_rdn.clone());
        self.relocate(dn, &target)?;
        self.apply_rdn_change(&target, &old_rdn, new_rdn, delete_old_rdn)
    }

    fn list(&self, dn: &Dn) -> Result<Vec<Entry>> {
        self.ensure_initialized()?;
        let ndn = self.norm(dn)?;
        let state = self.state.read();
        if !state.entries.contains_key(&ndn) {
            return Err(DirectoryError::NameNotFound { dn: dn.to_string() });
        }
        Ok(state
            .entries
            .iter()
            .filter(|(k, _)| k.len() == ndn.len() + 1 && ndn.is_prefix_of(k))
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn search(
        &self,
        base: &Dn,
        scope: SearchScope,
        filter: &Filter,
        attrs: &AttributeSelection,
    ) -> Result<Vec<Entry>> {
        self.ensure_initialized()?;
        let registry = self.registry();
        let nbase = registry.normalize_dn(base)?;
        let state = self.state.read();
        if !state.entries.contains_key(&nbase) {
            return Err(DirectoryError::NameNotFound {
                dn: base.to_string(),
            });
        }
        let projection = Projection::evaluate(attrs);
        let results = state
            .entries
            .iter()
            .filter(|(k, _)| match scope {
                SearchScope::Object => **k == nbase,
                SearchScope::OneLevel => k.len() == nbase.len() + 1 && nbase.is_prefix_of(k),
                SearchScope::Subtree => nbase.is_prefix_of(k),
            })
            .filter(|(_, e)| matches_filter(e, filter, registry.as_ref()))
            .map(|(_, e)| projection.apply(e, registry.as_ref()))
            .collect();
        Ok(results)
    }

    fn lookup(&self, dn: &Dn, attrs: &AttributeSelection) -> Result<Entry> {
        self.ensure_initialized()?;
        let registry = self.registry();
        let ndn = registry.normalize_dn(dn)?;
        let state = self.state.read();
        let Some(entry) = state.entries.get(&ndn) else {
            return Err(DirectoryError::NameNotFound { dn: dn.to_string() });
        };
        match attrs {
            AttributeSelection::All => Ok(entry.clone()),
            AttributeSelection::Ids(_) => {
                Ok(Projection::evaluate(attrs).apply(entry, registry.as_ref()))
            }
        }
    }

    fn has_entry(&self, dn: &Dn) -> Result<bool> {
        self.ensure_initialized()?;
        let ndn = self.norm(dn)?;
        Ok(self.state.read().entries.contains_key(&ndn))
    }

    fn bind(&self, dn: &Dn, credentials: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        let ndn = self.norm(dn)?;
        let state = self.state.read();
        let Some(entry) = state.entries.get(&ndn) else {
            return Err(DirectoryError::InvalidCredentials);
        };
        let matched = entry
            .get("userPassword")
            .map(|attr| attr.values().iter().any(|v| v.as_bytes() == credentials))
            .unwrap_or(false);
        if matched {
            Ok(())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    fn unbind(&self, _dn: &Dn) -> Result<()> {
        Ok(())
    }
}

/// Evaluate the assertion tree against one entry. Identifiers resolve
/// through the registry, so a filter on `commonName` matches a stored `cn`.
fn matches_filter(entry: &Entry, filter: &Filter, registry: &dyn SchemaRegistry) -> bool {
    match filter {
        Filter::Present(id) => find_attribute(entry, id, registry).is_some(),
        Filter::Equality(id, value) => find_attribute(entry, id, registry)
            .map(|attr| {
                let wanted = registry.normalize_value(id, value);
                attr.values()
                    .iter()
                    .any(|v| registry.normalize_value(id, v).as_bytes() == wanted.as_bytes())
            })
            .unwrap_or(false),
        Filter::And(filters) => filters.iter().all(|f| matches_filter(entry, f, registry)),
        Filter::Or(filters) => filters.iter().any(|f| matches_filter(entry, f, registry)),
        Filter::Not(inner) => !matches_filter(entry, inner, registry),
    }
}

fn find_attribute<'a>(
    entry: &'a Entry,
    id: &str,
    registry: &dyn SchemaRegistry,
) -> Option<&'a Attribute> {
    if let Some(attr) = entry.get(id) {
        return Some(attr);
    }
    let at = registry.attribute_type(id)?;
    if let Some(attr) = entry.get(at.oid()) {
        return Some(attr);
    }
    at.names().iter().find_map(|name| entry.get(name))
}

//! Shared fixtures for the nexus integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use dirdb_nexus::{NexusConfig, PartitionNexus};
use dirdb_partition::{MemPartition, Partition, ServiceContext};
use dirdb_schema::{CoreSchema, SchemaRegistry};
use dirdb_types::dn::{Dn, NormalizedDn, Rdn};
use dirdb_types::entry::Entry;
use dirdb_types::error::{DirectoryError, Result};
use dirdb_types::ops::{AttributeSelection, Filter, Modification, SearchScope};
use dirdb_types::value::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) fn registry() -> Arc<dyn SchemaRegistry> {
    Arc::new(CoreSchema::new())
}

pub(crate) fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

pub(crate) fn norm(s: &str) -> NormalizedDn {
    registry().normalize_dn(&dn(s)).unwrap()
}

/// An unconfigured in-memory partition; the nexus initializes it at
/// registration time.
pub(crate) fn mem_partition(id: &str, suffix: &str) -> Arc<dyn Partition> {
    Arc::new(MemPartition::new(id, suffix, registry()).unwrap())
}

pub(crate) fn entry(dn_str: &str, attrs: &[(&str, &str)]) -> Entry {
    let mut e = Entry::new(dn(dn_str));
    for (id, value) in attrs {
        e.add_value(id, Value::text(*value));
    }
    e
}

/// A running nexus with the system partition plus `others`.
pub(crate) fn running_nexus(others: Vec<Arc<dyn Partition>>) -> Arc<PartitionNexus> {
    test_helpers::maybe_start_logging();
    let nexus = Arc::new(PartitionNexus::new(registry()));
    nexus
        .init(NexusConfig {
            system_partition: mem_partition("system", "ou=system"),
            partitions: others,
        })
        .unwrap();
    nexus
}

/// A partition test double whose lifecycle hooks can be made to fail.
#[derive(Debug)]
pub(crate) struct FlakyPartition {
    id: String,
    suffix: NormalizedDn,
    up_suffix: Dn,
    fail_init: bool,
    fail_destroy: bool,
    initialized: AtomicBool,
}

impl FlakyPartition {
    pub(crate) fn failing_init(id: &str, suffix: &str) -> Arc<Self> {
        Arc::new(Self::new(id, suffix, true, false))
    }

    pub(crate) fn failing_destroy(id: &str, suffix: &str) -> Arc<Self> {
        Arc::new(Self::new(id, suffix, false, true))
    }

    fn new(id: &str, suffix: &str, fail_init: bool, fail_destroy: bool) -> Self {
        let up_suffix = Dn::parse(suffix).unwrap();
        let suffix = registry().normalize_dn(&up_suffix).unwrap();
        Self {
            id: id.to_string(),
            suffix,
            up_suffix,
            fail_init,
            fail_destroy,
            initialized: AtomicBool::new(false),
        }
    }

    fn unsupported(&self) -> DirectoryError {
        DirectoryError::UnsupportedOperation {
            message: format!("flaky partition {} holds no entries", self.id),
        }
    }
}

impl Partition for FlakyPartition {
    fn id(&self) -> &str {
        &self.id
    }

    fn suffix_dn(&self) -> &NormalizedDn {
        &self.suffix
    }

    fn up_suffix_dn(&self) -> &Dn {
        &self.up_suffix
    }

    fn init(&self, _ctx: &ServiceContext) -> Result<()> {
        if self.fail_init {
            return Err(DirectoryError::Configuration {
                message: format!("partition {} refuses to initialize", self.id),
            });
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        if self.fail_destroy {
            return Err(DirectoryError::Configuration {
                message: format!("partition {} refuses to shut down", self.id),
            });
        }
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn add(&self, _entry: Entry) -> Result<()> {
        Err(self.unsupported())
    }

    fn delete(&self, _dn: &Dn) -> Result<()> {
        Err(self.unsupported())
    }

    fn modify(&self, _dn: &Dn, _mods: &[Modification]) -> Result<()> {
        Err(self.unsupported())
    }

    fn rename(&self, _dn: &Dn, _new_rdn: &Rdn, _delete_old_rdn: bool) -> Result<()> {
        Err(self.unsupported())
    }

    fn move_entry(&self, _dn: &Dn, _new_parent: &Dn) -> Result<()> {
        Err(self.unsupported())
    }

    fn move_and_rename(
        &self,
        _dn: &Dn,
        _new_parent: &Dn,
        _new_rdn: &Rdn,
        _delete_old_rdn: bool,
    ) -> Result<()> {
        Err(self.unsupported())
    }

    fn list(&self, _dn: &Dn) -> Result<Vec<Entry>> {
        Err(self.unsupported())
    }

    fn search(
        &self,
        _base: &Dn,
        _scope: SearchScope,
        _filter: &Filter,
        _attrs: &AttributeSelection,
    ) -> Result<Vec<Entry>> {
        Err(self.unsupported())
    }

    fn lookup(&self, _dn: &Dn, _attrs: &AttributeSelection) -> Result<Entry> {
        Err(self.unsupported())
    }

    fn has_entry(&self, _dn: &Dn) -> Result<bool> {
        Ok(false)
    }

    fn bind(&self, _dn: &Dn, _credentials: &[u8]) -> Result<()> {
        Err(self.unsupported())
    }

    fn unbind(&self, _dn: &Dn) -> Result<()> {
        Ok(())
    }
}

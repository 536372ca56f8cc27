//! The suffix routing trie: an in-memory tree keyed by normalized RDN
//! strings (root-to-leaf order) whose leaves reference registered
//! partitions. Resolution returns the partition at the first leaf reached,
//! even with RDN components left unconsumed, which is exactly
//! longest-registered-suffix (ancestor) matching.
//!
//! Deregistration is handled by the nexus rebuilding the whole trie from the
//! remaining suffix map. Partition topology changes are rare administrative
//! events, so whole-trie consistency is preferred over surgical node
//! deletion.

use dirdb_partition::Partition;
use dirdb_types::dn::NormalizedDn;
use dirdb_types::error::{DirectoryError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
enum Node {
    Branch(BTreeMap<String, Node>),
    Leaf(Arc<dyn Partition>),
}

impl Default for Node {
    fn default() -> Self {
        Self::Branch(BTreeMap::new())
    }
}

/// One path per registered suffix, root to leaf; branches exist only to the
/// depth required to disambiguate suffixes.
#[derive(Debug, Default)]
pub struct SuffixTrie {
    root: Node,
}

impl SuffixTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a leaf for `suffix`. Registering the empty suffix, a suffix
    /// at or below an existing leaf, or a suffix above an existing one is a
    /// `Configuration` error; the trie is left unchanged on failure.
    pub fn register(&mut self, suffix: &NormalizedDn, partition: Arc<dyn Partition>) -> Result<()> {
        if suffix.is_empty() {
            return Err(DirectoryError::Configuration {
                message: "cannot register a partition at the empty suffix".to_string(),
            });
        }
        Self::insert(&mut self.root, suffix.components(), partition, suffix)
    }

    fn insert(
        node: &mut Node,
        components: &[String],
        partition: Arc<dyn Partition>,
        suffix: &NormalizedDn,
    ) -> Result<()> {
        let children = match node {
            Node::Leaf(_) => {
                return Err(DirectoryError::Configuration {
                    message: format!("a partition is already registered above suffix {suffix}"),
                });
            }
            Node::Branch(children) => children,
        };
        let Some((first, rest)) = components.split_first() else {
            return Err(DirectoryError::Configuration {
                message: format!("suffix {suffix} has no components"),
            });
        };
        if rest.is_empty() {
            if children.contains_key(first) {
                // Either a leaf already owns this suffix or a branch marks
                // partitions registered below it.
                return Err(DirectoryError::Configuration {
                    message: format!("a partition is already registered at or below suffix {suffix}"),
                });
            }
            children.insert(first.clone(), Node::Leaf(partition));
            return Ok(());
        }
        let child = children.entry(first.clone()).or_default();
        Self::insert(child, rest, partition, suffix)
    }

    /// Resolve a DN to its owning partition by longest-registered-suffix
    /// match; `None` when the walk exhausts the DN without reaching a leaf.
    pub fn resolve(&self, dn: &NormalizedDn) -> Option<Arc<dyn Partition>> {
        let mut node = &self.root;
        for component in dn.components() {
            match node {
                Node::Leaf(partition) => return Some(Arc::clone(partition)),
                Node::Branch(children) => node = children.get(component)?,
            }
        }
        match node {
            Node::Leaf(partition) => Some(Arc::clone(partition)),
            Node::Branch(_) => None,
        }
    }

    /// Rebuild a fresh trie from a suffix map.
    pub fn rebuild(partitions: &BTreeMap<NormalizedDn, Arc<dyn Partition>>) -> Result<Self> {
        let mut trie = Self::new();
        for (suffix, partition) in partitions {
            trie.register(suffix, Arc::clone(partition))?;
        }
        Ok(trie)
    }
}

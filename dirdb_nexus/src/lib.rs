//! The routing and naming-context core: resolves every DN-bearing directory
//! operation to the storage partition owning it, synthesizes the root DSE at
//! the zero-length DN, and manages atomic partition registration and
//! deregistration with rollback on partial failure.
//!
//! Control flow: external caller → [`NexusProxy`] (context push, pipeline
//! invocation) → pipeline stages → [`PartitionNexus`] (trie resolution or
//! root DSE handling) → target partition.

pub mod bypass;
pub mod context;
pub mod nexus;
pub mod pipeline;
pub mod proxy;
pub mod root_dse;
pub mod trie;

pub use bypass::{BypassSet, InterceptorId};
pub use context::OperationContext;
pub use nexus::{NexusConfig, PartitionNexus, SYSTEM_PARTITION_SUFFIX, Stage};
pub use pipeline::{Interceptor, InterceptorChain, OperationOutcome};
pub use proxy::NexusProxy;
pub use root_dse::RootDse;
pub use trie::SuffixTrie;

//! The interceptor pipeline seam. This crate ships no production stages;
//! it owns only the chain that runs non-bypassed stage hooks around nexus
//! dispatch, and the trait those stages implement. Tests install recording
//! stages to prove bypass filtering and re-entrancy behavior.

use crate::bypass::InterceptorId;
use crate::context::OperationContext;
use crate::nexus::PartitionNexus;
use dirdb_types::dn::Dn;
use dirdb_types::entry::Entry;
use dirdb_types::error::Result;
use dirdb_types::ops::DirectoryOperation;
use std::fmt::Debug;
use std::sync::Arc;

/// What a dispatched operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// The operation completed with nothing to return.
    Done,
    Entry(Entry),
    Entries(Vec<Entry>),
    Bool(bool),
    Dn(Dn),
}

/// One cross-cutting pipeline stage.
pub trait Interceptor: Debug + Send + Sync {
    fn id(&self) -> InterceptorId;

    /// Runs before dispatch, in chain order.
    fn before(&self, _op: &DirectoryOperation) -> Result<()> {
        Ok(())
    }

    /// Runs after dispatch, in reverse chain order.
    fn after(&self, _op: &DirectoryOperation, _outcome: &OperationOutcome) -> Result<()> {
        Ok(())
    }
}

/// Runs every non-bypassed stage's hooks around nexus dispatch; the nexus is
/// effectively the final stage of the pipeline.
#[derive(Debug)]
pub struct InterceptorChain {
    nexus: Arc<PartitionNexus>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new(nexus: Arc<PartitionNexus>, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            nexus,
            interceptors,
        }
    }

    pub fn nexus(&self) -> &Arc<PartitionNexus> {
        &self.nexus
    }

    pub fn run(&self, ctx: &OperationContext) -> Result<OperationOutcome> {
        for interceptor in &self.interceptors {
            if !ctx.is_bypassed(interceptor.id()) {
                interceptor.before(ctx.operation())?;
            }
        }
        let outcome = self.nexus.execute(ctx.operation())?;
        for interceptor in self.interceptors.iter().rev() {
            if !ctx.is_bypassed(interceptor.id()) {
                interceptor.after(ctx.operation(), &outcome)?;
            }
        }
        Ok(outcome)
    }
}

//! This crate exists to coordinate versions of `tracing` used by every other
//! crate in the workspace, so that all members log through one pinned version.

// Export tracing publicly so other crates can `use observability_deps::tracing`.
pub use tracing;

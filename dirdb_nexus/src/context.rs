//! The per-operation invocation context and its thread-scoped stack.
//!
//! One context exists per operation attempt and carries the operation
//! payload plus an optional bypass set. The stack is thread-local; pushing
//! returns an RAII guard whose `Drop` pops, so the stack unwinds on every
//! exit path, panics included.

use crate::bypass::{BypassSet, InterceptorId};
use dirdb_types::ops::DirectoryOperation;
use std::cell::RefCell;

/// Ephemeral, per-attempt operation context. Never persisted.
#[derive(Debug, Clone)]
pub struct OperationContext {
    operation: DirectoryOperation,
    bypass: Option<BypassSet>,
}

impl OperationContext {
    pub fn new(operation: DirectoryOperation) -> Self {
        Self {
            operation,
            bypass: None,
        }
    }

    pub fn with_bypass(operation: DirectoryOperation, bypass: BypassSet) -> Self {
        Self {
            operation,
            bypass: Some(bypass),
        }
    }

    pub fn operation(&self) -> &DirectoryOperation {
        &self.operation
    }

    pub fn bypass(&self) -> Option<&BypassSet> {
        self.bypass.as_ref()
    }

    /// Whether the given stage must be skipped for this operation.
    pub fn is_bypassed(&self, id: InterceptorId) -> bool {
        self.bypass.map(|set| set.contains(id)).unwrap_or(false)
    }
}

thread_local! {
    static STACK: RefCell<Vec<OperationContext>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`push`]; pops the context when dropped.
#[derive(Debug)]
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push a context onto the calling thread's stack.
pub fn push(ctx: OperationContext) -> ContextGuard {
    STACK.with(|stack| stack.borrow_mut().push(ctx));
    ContextGuard { _private: () }
}

/// Current stack depth for the calling thread.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Run `f` with the top-most context, if any.
pub fn with_current<R>(f: impl FnOnce(Option<&OperationContext>) -> R) -> R {
    STACK.with(|stack| f(stack.borrow().last()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bypass::{HAS_ENTRY_BYPASS, InterceptorId};
    use dirdb_types::dn::Dn;
    use dirdb_types::ops::DirectoryOperation;

    fn op(dn: &str) -> DirectoryOperation {
        DirectoryOperation::HasEntry {
            dn: Dn::parse(dn).unwrap(),
        }
    }

    #[test]
    fn push_and_pop_nest() {
        assert_eq!(depth(), 0);
        let outer = push(OperationContext::new(op("ou=system")));
        assert_eq!(depth(), 1);
        {
            let _inner = push(OperationContext::with_bypass(
                op("cn=x,ou=system"),
                HAS_ENTRY_BYPASS,
            ));
            assert_eq!(depth(), 2);
            with_current(|ctx| {
                let ctx = ctx.unwrap();
                assert!(ctx.is_bypassed(InterceptorId::Schema));
                assert_eq!(ctx.operation().target_dn().to_string(), "cn=x,ou=system");
            });
        }
        assert_eq!(depth(), 1);
        with_current(|ctx| assert!(!ctx.unwrap().is_bypassed(InterceptorId::Schema)));
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn stack_unwinds_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = push(OperationContext::new(op("ou=system")));
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }
}

//! Attribute projection: turning a requested attribute selection into the
//! subset of an entry's attributes that gets returned.
//!
//! The selection precedence is evaluated once per call into a [`Projection`]
//! plan, then applied to each result entry; the root DSE and partition
//! search paths share it.

use crate::SchemaRegistry;
use dirdb_types::entry::Entry;
use dirdb_types::ops::{
    ALL_OPERATIONAL_ATTRIBUTES, ALL_USER_ATTRIBUTES, AttributeSelection, NO_ATTRIBUTES,
};

/// The precomputed result of evaluating the attribute-selection precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The `1.1` marker was present: zero attributes.
    None,
    /// Both `*` and `+` were present: everything, unfiltered.
    All,
    /// `*` (or nothing) was requested: user-application attributes plus any
    /// explicitly named ones.
    User { named: Vec<String> },
    /// `+` was requested: non-user-application attributes plus any
    /// explicitly named ones.
    Operational { named: Vec<String> },
    /// Only explicitly named attributes.
    Named(Vec<String>),
}

impl Projection {
    /// Evaluate the precedence, in order: `1.1` wins outright; then `*`+`+`;
    /// then `*` alone; then `+` alone; otherwise the named list. A selection
    /// naming nothing behaves as `*`, the LDAP default.
    pub fn evaluate(selection: &AttributeSelection) -> Self {
        let ids = match selection {
            AttributeSelection::All => return Self::User { named: Vec::new() },
            AttributeSelection::Ids(ids) => ids,
        };
        if ids.iter().any(|id| id == NO_ATTRIBUTES) {
            return Self::None;
        }
        let all_user = ids.iter().any(|id| id == ALL_USER_ATTRIBUTES);
        let all_operational = ids.iter().any(|id| id == ALL_OPERATIONAL_ATTRIBUTES);
        let named: Vec<String> = ids
            .iter()
            .filter(|id| {
                id.as_str() != ALL_USER_ATTRIBUTES && id.as_str() != ALL_OPERATIONAL_ATTRIBUTES
            })
            .cloned()
            .collect();
        match (all_user, all_operational) {
            (true, true) => Self::All,
            (true, false) => Self::User { named },
            (false, true) => Self::Operational { named },
            (false, false) if named.is_empty() => Self::User { named },
            (false, false) => Self::Named(named),
        }
    }

    /// Apply the plan to an entry, producing a fresh entry holding only the
    /// selected attributes.
    pub fn apply(&self, entry: &Entry, registry: &dyn SchemaRegistry) -> Entry {
        let mut out = Entry::new(entry.dn().clone());
        for attr in entry.attributes() {
            if self.includes(attr.id(), registry) {
                out.put(attr.clone());
            }
        }
        out
    }

    fn includes(&self, id: &str, registry: &dyn SchemaRegistry) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::User { named } => is_user(id, registry) || named_matches(named, id, registry),
            Self::Operational { named } => {
                !is_user(id, registry) || named_matches(named, id, registry)
            }
            Self::Named(named) => named_matches(named, id, registry),
        }
    }
}

/// Usage of the attribute per the registry; unknown types count as user
/// attributes so schemaless data still comes back for `*`.
fn is_user(id: &str, registry: &dyn SchemaRegistry) -> bool {
    registry
        .attribute_type(id)
        .map(|at| at.usage().is_user_applications())
        .unwrap_or(true)
}

/// Does any requested identifier name this attribute, directly or through a
/// registry alias/OID?
fn named_matches(named: &[String], id: &str, registry: &dyn SchemaRegistry) -> bool {
    named.iter().any(|wanted| {
        wanted.eq_ignore_ascii_case(id)
            || registry
                .attribute_type(wanted)
                .map(|at| at.matches_id(id))
                .unwrap_or(false)
    })
}

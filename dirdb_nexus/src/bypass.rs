//! Named, precomputed sets of pipeline-stage identifiers that may safely be
//! skipped when the nexus (or a stage) re-enters the router for an internal
//! sub-operation. A schema-stage-internal lookup must bypass the schema
//! stage itself or recurse forever, but still runs normalization so the DN
//! it receives is well-formed.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Identifier of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptorId {
    Normalization,
    Authentication,
    Authorization,
    Referral,
    Schema,
    OperationalAttributes,
    CollectiveAttributes,
    Subentry,
    Event,
    Trigger,
}

impl InterceptorId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalization => "normalization",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Referral => "referral",
            Self::Schema => "schema",
            Self::OperationalAttributes => "operationalAttributes",
            Self::CollectiveAttributes => "collectiveAttributes",
            Self::Subentry => "subentry",
            Self::Event => "event",
            Self::Trigger => "trigger",
        }
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named set of stages to skip for one internal call path. Pure and
/// immutable; computed once at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BypassSet {
    name: &'static str,
    stages: &'static [InterceptorId],
}

impl BypassSet {
    pub const fn new(name: &'static str, stages: &'static [InterceptorId]) -> Self {
        Self { name, stages }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> &'static [InterceptorId] {
        self.stages
    }

    pub fn contains(&self, id: InterceptorId) -> bool {
        self.stages.contains(&id)
    }
}

use InterceptorId::*;

/// Raw entry lookup: only normalization and collective-attribute decoration
/// still run.
pub const LOOKUP_BYPASS: BypassSet = BypassSet::new(
    "lookup",
    &[
        Authentication,
        Authorization,
        Referral,
        Schema,
        OperationalAttributes,
        Subentry,
        Event,
        Trigger,
    ],
);

/// Raw entry lookup that additionally skips collective-attribute
/// decoration.
pub const LOOKUP_EXCLUDING_COLLECTIVE_BYPASS: BypassSet = BypassSet::new(
    "lookupExcludingCollective",
    &[
        Authentication,
        Authorization,
        Referral,
        Schema,
        OperationalAttributes,
        CollectiveAttributes,
        Subentry,
        Event,
        Trigger,
    ],
);

/// Existence check: everything except normalization.
pub const HAS_ENTRY_BYPASS: BypassSet = BypassSet::new(
    "hasEntry",
    &[
        Authentication,
        Authorization,
        Referral,
        Schema,
        OperationalAttributes,
        CollectiveAttributes,
        Subentry,
        Event,
        Trigger,
    ],
);

/// Matched-DN resolution: everything except normalization.
pub const GET_MATCHED_NAME_BYPASS: BypassSet = BypassSet::new(
    "getMatchedName",
    &[
        Authentication,
        Authorization,
        Referral,
        Schema,
        OperationalAttributes,
        CollectiveAttributes,
        Subentry,
        Event,
        Trigger,
    ],
);

/// Root DSE construction: everything except normalization.
pub const GET_ROOT_DSE_BYPASS: BypassSet = BypassSet::new(
    "getRootDse",
    &[
        Authentication,
        Authorization,
        Referral,
        Schema,
        OperationalAttributes,
        CollectiveAttributes,
        Subentry,
        Event,
        Trigger,
    ],
);

static BYPASS_REGISTRY: Lazy<HashMap<&'static str, BypassSet>> = Lazy::new(|| {
    [
        LOOKUP_BYPASS,
        LOOKUP_EXCLUDING_COLLECTIVE_BYPASS,
        HAS_ENTRY_BYPASS,
        GET_MATCHED_NAME_BYPASS,
        GET_ROOT_DSE_BYPASS,
    ]
    .into_iter()
    .map(|set| (set.name(), set))
    .collect()
});

/// The fixed name → set table.
pub fn bypass_registry() -> &'static HashMap<&'static str, BypassSet> {
    &BYPASS_REGISTRY
}

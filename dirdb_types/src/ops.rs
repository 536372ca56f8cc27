//! Operation payloads: one variant per directory operation, carrying that
//! operation's parameters. The router dispatches on the target DN; pipeline
//! stages see the payload unchanged.

use crate::dn::{Dn, Rdn};
use crate::entry::Entry;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requests no attributes at all (RFC 4511 `1.1`).
pub const NO_ATTRIBUTES: &str = "1.1";
/// Requests every user-application attribute.
pub const ALL_USER_ATTRIBUTES: &str = "*";
/// Requests every operational attribute.
pub const ALL_OPERATIONAL_ATTRIBUTES: &str = "+";

/// Search scope relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchScope {
    /// The base entry only.
    Object,
    /// Immediate children of the base, excluding the base itself.
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// A minimal assertion tree: only what partitions and the root-DSE check
/// need. Filter syntax parsing and the full matching-rule set live outside
/// this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Present(String),
    Equality(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn present(id: impl Into<String>) -> Self {
        Self::Present(id.into())
    }

    pub fn equality(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equality(id.into(), value.into())
    }
}

/// Which attributes an operation wants returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttributeSelection {
    /// Nothing explicitly requested.
    #[default]
    All,
    /// An explicit identifier list; may contain the [`NO_ATTRIBUTES`],
    /// [`ALL_USER_ATTRIBUTES`] and [`ALL_OPERATIONAL_ATTRIBUTES`] markers.
    Ids(Vec<String>),
}

impl AttributeSelection {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationKind {
    Add,
    Replace,
    Remove,
}

/// One modification within a modify operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModificationKind,
    pub attribute: String,
    pub values: Vec<Value>,
}

impl Modification {
    pub fn new(
        kind: ModificationKind,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            kind,
            attribute: attribute.into(),
            values: values.into_iter().collect(),
        }
    }
}

/// The kind of a [`DirectoryOperation`], without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Add,
    Delete,
    Modify,
    Rename,
    Move,
    MoveAndRename,
    List,
    Search,
    Lookup,
    HasEntry,
    Bind,
    Unbind,
    Compare,
    GetMatchedName,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Modify => "modify",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::MoveAndRename => "moveAndRename",
            Self::List => "list",
            Self::Search => "search",
            Self::Lookup => "lookup",
            Self::HasEntry => "hasEntry",
            Self::Bind => "bind",
            Self::Unbind => "unbind",
            Self::Compare => "compare",
            Self::GetMatchedName => "getMatchedName",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directory operation with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryOperation {
    Add {
        entry: Entry,
    },
    Delete {
        dn: Dn,
    },
    Modify {
        dn: Dn,
        mods: Vec<Modification>,
    },
    Rename {
        dn: Dn,
        new_rdn: Rdn,
        delete_old_rdn: bool,
    },
    Move {
        dn: Dn,
        new_parent: Dn,
    },
    MoveAndRename {
        dn: Dn,
        new_parent: Dn,
        new_rdn: Rdn,
        delete_old_rdn: bool,
    },
    List {
        dn: Dn,
    },
    Search {
        base: Dn,
        scope: SearchScope,
        filter: Filter,
        attrs: AttributeSelection,
    },
    Lookup {
        dn: Dn,
        attrs: AttributeSelection,
    },
    HasEntry {
        dn: Dn,
    },
    Bind {
        dn: Dn,
        credentials: Vec<u8>,
    },
    Unbind {
        dn: Dn,
    },
    Compare {
        dn: Dn,
        attribute: String,
        value: Value,
    },
    GetMatchedName {
        dn: Dn,
    },
}

impl DirectoryOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Modify { .. } => OperationKind::Modify,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Move { .. } => OperationKind::Move,
            Self::MoveAndRename { .. } => OperationKind::MoveAndRename,
            Self::List { .. } => OperationKind::List,
            Self::Search { .. } => OperationKind::Search,
            Self::Lookup { .. } => OperationKind::Lookup,
            Self::HasEntry { .. } => OperationKind::HasEntry,
            Self::Bind { .. } => OperationKind::Bind,
            Self::Unbind { .. } => OperationKind::Unbind,
            Self::Compare { .. } => OperationKind::Compare,
            Self::GetMatchedName { .. } => OperationKind::GetMatchedName,
        }
    }

    /// The DN the operation targets: the entry DN for add, the base for
    /// search, the source DN for move and rename.
    pub fn target_dn(&self) -> &Dn {
        match self {
            Self::Add { entry } => entry.dn(),
            Self::Delete { dn }
            | Self::Modify { dn, .. }
            | Self::Rename { dn, .. }
            | Self::Move { dn, .. }
            | Self::MoveAndRename { dn, .. }
            | Self::List { dn }
            | Self::Lookup { dn, .. }
            | Self::HasEntry { dn }
            | Self::Bind { dn, .. }
            | Self::Unbind { dn }
            | Self::Compare { dn, .. }
            | Self::GetMatchedName { dn } => dn,
            Self::Search { base, .. } => base,
        }
    }
}

//! The schema interface the router consumes: attribute-type lookup, the
//! usage taxonomy that governs `*`/`+` attribute selection, equality
//! normalizers and schema-driven DN normalization.
//!
//! Schema *validation* is a pipeline stage outside this core; this crate
//! only answers the questions the router and partitions ask.

pub mod projection;

use dirdb_types::dn::{Dn, NormalizedDn, escape_value};
use dirdb_types::error::Result;
use dirdb_types::value::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Where an attribute is used, per the X.501 taxonomy. Only
/// [`AttributeUsage::UserApplications`] attributes are returned for the `*`
/// selection marker; everything else counts as operational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeUsage {
    UserApplications,
    DirectoryOperation,
    DistributedOperation,
    DsaOperation,
}

impl AttributeUsage {
    pub fn is_user_applications(&self) -> bool {
        matches!(self, Self::UserApplications)
    }
}

/// Equality-matching normalizer for an attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalizer {
    /// Trim, collapse internal whitespace runs, lowercase.
    CaseIgnore,
    /// Trim and collapse whitespace, preserving case.
    CaseExact,
    /// Identity; bytes match exactly.
    Octet,
}

impl Normalizer {
    pub fn normalize_str(&self, s: &str) -> String {
        match self {
            Self::CaseIgnore => collapse_whitespace(s).to_lowercase(),
            Self::CaseExact => collapse_whitespace(s),
            Self::Octet => s.to_string(),
        }
    }

    /// Normalize a value of either kind. Binary values are normalized
    /// through UTF-8 when they decode; otherwise they pass through
    /// untouched, as does anything under [`Normalizer::Octet`].
    pub fn normalize(&self, value: &Value) -> Value {
        match value {
            Value::Text(s) => Value::Text(self.normalize_str(s)),
            Value::Binary(b) => match self {
                Self::Octet => value.clone(),
                _ => match std::str::from_utf8(b) {
                    Ok(s) => Value::Binary(self.normalize_str(s).into_bytes()),
                    Err(_) => value.clone(),
                },
            },
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Descriptor for one attribute type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    oid: String,
    names: Vec<String>,
    usage: AttributeUsage,
    equality: Normalizer,
    single_valued: bool,
}

impl AttributeType {
    pub fn new(
        oid: impl Into<String>,
        names: &[&str],
        usage: AttributeUsage,
        equality: Normalizer,
        single_valued: bool,
    ) -> Self {
        Self {
            oid: oid.into(),
            names: names.iter().map(|n| n.to_string()).collect(),
            usage,
            equality,
            single_valued,
        }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// All names; the first is canonical.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The canonical name, falling back to the OID for nameless types.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    pub fn usage(&self) -> AttributeUsage {
        self.usage
    }

    pub fn equality(&self) -> Normalizer {
        self.equality
    }

    pub fn is_single_valued(&self) -> bool {
        self.single_valued
    }

    /// Whether `id` names this type, by any name or the OID,
    /// case-insensitively.
    pub fn matches_id(&self, id: &str) -> bool {
        self.oid.eq_ignore_ascii_case(id)
            || self.names.iter().any(|n| n.eq_ignore_ascii_case(id))
    }
}

/// Attribute-type lookup and schema-driven normalization.
///
/// Unknown identifiers are an answerable condition (`None`), not a panic;
/// `compare` surfaces them as `InvalidAttributeIdentifier`. DN normalization
/// deliberately tolerates unknown attribute types (falling back to
/// case-ignore matching) since full schema checking happens in a pipeline
/// stage outside this core.
pub trait SchemaRegistry: Debug + Send + Sync {
    /// Look up an attribute type by any of its names or its OID,
    /// case-insensitively.
    fn attribute_type(&self, id: &str) -> Option<Arc<AttributeType>>;

    /// Normalize one value with the attribute's equality normalizer,
    /// falling back to case-ignore for unknown attribute types.
    fn normalize_value(&self, id: &str, value: &Value) -> Value {
        let normalizer = self
            .attribute_type(id)
            .map(|at| at.equality())
            .unwrap_or(Normalizer::CaseIgnore);
        normalizer.normalize(value)
    }

    /// Normalize a DN: per AVA, the canonical lowercased attribute name plus
    /// the equality-normalized value; AVAs of a multi-valued RDN sorted.
    fn normalize_dn(&self, dn: &Dn) -> Result<NormalizedDn> {
        let mut components = Vec::with_capacity(dn.len());
        for rdn in dn.rdns() {
            let mut avas = Vec::with_capacity(rdn.avas().len());
            for ava in rdn.avas() {
                let (name, normalizer) = match self.attribute_type(ava.attribute()) {
                    Some(at) => (at.name().to_lowercase(), at.equality()),
                    None => (ava.attribute().to_lowercase(), Normalizer::CaseIgnore),
                };
                let value = normalizer.normalize_str(ava.value());
                avas.push(format!("{name}={}", escape_value(&value)));
            }
            avas.sort_unstable();
            components.push(avas.join("+"));
        }
        Ok(NormalizedDn::from_components(components))
    }
}

/// The built-in registry: the standard user attribute types plus the
/// operational attributes the root DSE carries.
#[derive(Debug)]
pub struct CoreSchema {
    by_id: HashMap<String, Arc<AttributeType>>,
}

impl CoreSchema {
    pub fn new() -> Self {
        use AttributeUsage::*;
        use Normalizer::*;

        let mut schema = Self {
            by_id: HashMap::new(),
        };

        let user = [
            ("2.5.4.0", &["objectClass"][..], CaseIgnore, false),
            ("2.5.4.3", &["cn", "commonName"], CaseIgnore, false),
            ("2.5.4.4", &["sn", "surname"], CaseIgnore, false),
            ("2.5.4.10", &["o", "organizationName"], CaseIgnore, false),
            ("2.5.4.11", &["ou", "organizationalUnitName"], CaseIgnore, false),
            ("2.5.4.13", &["description"], CaseIgnore, false),
            ("2.5.4.31", &["member"], CaseIgnore, false),
            ("2.5.4.35", &["userPassword"], Octet, false),
            ("2.5.4.41", &["name"], CaseIgnore, false),
            ("0.9.2342.19200300.100.1.1", &["uid", "userid"], CaseIgnore, false),
            ("0.9.2342.19200300.100.1.3", &["mail", "rfc822Mailbox"], CaseIgnore, false),
            ("0.9.2342.19200300.100.1.25", &["dc", "domainComponent"], CaseIgnore, true),
        ];
        for (oid, names, equality, single) in user {
            schema.register(AttributeType::new(oid, names, UserApplications, equality, single));
        }

        let operational = [
            ("1.3.6.1.4.1.1466.101.120.5", &["namingContexts"][..], DsaOperation, false),
            ("1.3.6.1.4.1.1466.101.120.6", &["altServer"], DsaOperation, false),
            ("1.3.6.1.4.1.1466.101.120.7", &["supportedExtension"], DsaOperation, false),
            ("1.3.6.1.4.1.1466.101.120.13", &["supportedControl"], DsaOperation, false),
            ("1.3.6.1.4.1.1466.101.120.14", &["supportedSASLMechanisms"], DsaOperation, false),
            ("1.3.6.1.4.1.1466.101.120.15", &["supportedLDAPVersion"], DsaOperation, false),
            ("1.3.6.1.4.1.4203.1.3.5", &["supportedFeatures"], DsaOperation, false),
            ("1.3.6.1.1.4", &["vendorName"], DsaOperation, true),
            ("1.3.6.1.1.5", &["vendorVersion"], DsaOperation, true),
            ("2.5.18.1", &["createTimestamp"], DirectoryOperation, true),
            ("2.5.18.2", &["modifyTimestamp"], DirectoryOperation, true),
            ("2.5.18.3", &["creatorsName"], DirectoryOperation, true),
            ("2.5.18.4", &["modifiersName"], DirectoryOperation, true),
            ("2.5.18.10", &["subschemaSubentry"], DirectoryOperation, true),
            ("1.3.6.1.1.16.4", &["entryUUID"], DirectoryOperation, true),
        ];
        for (oid, names, usage, single) in operational {
            schema.register(AttributeType::new(oid, names, usage, CaseIgnore, single));
        }

        schema
    }

    fn register(&mut self, attribute_type: AttributeType) {
        let at = Arc::new(attribute_type);
        self.by_id.insert(at.oid().to_lowercase(), Arc::clone(&at));
        for name in at.names() {
            self.by_id.insert(name.to_lowercase(), Arc::clone(&at));
        }
    }
}

impl Default for CoreSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry for CoreSchema {
    fn attribute_type(&self, id: &str) -> Option<Arc<AttributeType>> {
        self.by_id.get(&id.to_lowercase()).map(Arc::clone)
    }
}

//! The root DSE: the singleton pseudo-entry at the zero-length DN holding
//! server-wide operational attributes. It lives for the lifetime of the
//! nexus, is never stored in any partition, and is administratively
//! read-only; only partition registration and the supported-OID admin
//! operations mutate it.

use dirdb_schema::{SchemaRegistry, projection::Projection};
use dirdb_types::dn::Dn;
use dirdb_types::entry::{Attribute, Entry};
use dirdb_types::ops::AttributeSelection;
use dirdb_types::value::Value;

/// The fixed vendor string advertised in `vendorName`.
pub const VENDOR_NAME: &str = "dirdb";

const VENDOR_VERSION: &str = env!("CARGO_PKG_VERSION");

const SUPPORTED_FEATURES: &[&str] = &[
    // All Operational Attributes (RFC 3673)
    "1.3.6.1.4.1.4203.1.5.1",
];

const SUPPORTED_CONTROLS: &[&str] = &[
    // ManageDsaIT
    "2.16.840.1.113730.3.4.2",
    // Subentries
    "1.3.6.1.4.1.4203.1.10.1",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    // StartTLS
    "1.3.6.1.4.1.1466.20037",
];

const SUPPORTED_SASL_MECHANISMS: &[&str] = &["SIMPLE", "CRAM-MD5", "DIGEST-MD5"];

/// The canonical root DSE entry and its mutators.
#[derive(Debug)]
pub struct RootDse {
    entry: Entry,
}

impl RootDse {
    /// Seed the fixed operational attributes; `namingContexts` starts empty
    /// (the attribute materializes with its first value).
    pub fn new() -> Self {
        let mut entry = Entry::new(Dn::root());
        entry.put(Attribute::new(
            "objectClass",
            [Value::text("top"), Value::text("extensibleObject")],
        ));
        entry.put(Attribute::new(
            "subschemaSubentry",
            [Value::text("cn=schema")],
        ));
        entry.put(Attribute::new(
            "supportedLDAPVersion",
            [Value::text("3")],
        ));
        entry.put(Attribute::new(
            "supportedFeatures",
            SUPPORTED_FEATURES.iter().map(|oid| Value::text(*oid)),
        ));
        entry.put(Attribute::new(
            "supportedControl",
            SUPPORTED_CONTROLS.iter().map(|oid| Value::text(*oid)),
        ));
        entry.put(Attribute::new(
            "supportedExtension",
            SUPPORTED_EXTENSIONS.iter().map(|oid| Value::text(*oid)),
        ));
        entry.put(Attribute::new(
            "supportedSASLMechanisms",
            SUPPORTED_SASL_MECHANISMS.iter().map(|m| Value::text(*m)),
        ));
        entry.put(Attribute::new("vendorName", [Value::text(VENDOR_NAME)]));
        entry.put(Attribute::new(
            "vendorVersion",
            [Value::text(VENDOR_VERSION)],
        ));
        Self { entry }
    }

    /// The canonical entry. Callers must clone before handing it out.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Advertised naming contexts, i.e. the registered partitions'
    /// user-provided suffixes.
    pub fn naming_contexts(&self) -> Vec<String> {
        self.entry
            .get("namingContexts")
            .map(|attr| attr.values().iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn add_naming_context(&mut self, suffix: &str) {
        self.entry.add_value("namingContexts", Value::text(suffix));
    }

    pub fn remove_naming_context(&mut self, suffix: &str) {
        self.entry
            .remove_value("namingContexts", &Value::text(suffix));
    }

    pub fn clear_naming_contexts(&mut self) {
        self.entry.remove("namingContexts");
    }

    pub fn register_extensions(&mut self, oids: &[String]) {
        for oid in oids {
            self.entry
                .add_value("supportedExtension", Value::text(oid.clone()));
        }
    }

    pub fn register_sasl_mechanisms(&mut self, mechanisms: &[String]) {
        for mechanism in mechanisms {
            self.entry
                .add_value("supportedSASLMechanisms", Value::text(mechanism.clone()));
        }
    }

    /// A lookup-shaped clone: the full attribute set when nothing was
    /// requested, otherwise filtered to the requested identifiers.
    pub fn lookup(&self, attrs: &AttributeSelection, registry: &dyn SchemaRegistry) -> Entry {
        match attrs {
            AttributeSelection::All => self.entry.clone(),
            AttributeSelection::Ids(_) => {
                Projection::evaluate(attrs).apply(&self.entry, registry)
            }
        }
    }

    /// A search-shaped clone: the `*`/`+`/`1.1` precedence applies, and an
    /// empty selection behaves as `*`.
    pub fn search_projection(
        &self,
        attrs: &AttributeSelection,
        registry: &dyn SchemaRegistry,
    ) -> Entry {
        Projection::evaluate(attrs).apply(&self.entry, registry)
    }
}

impl Default for RootDse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirdb_schema::CoreSchema;

    #[test]
    fn seeded_attributes() {
        let dse = RootDse::new();
        let entry = dse.entry();
        assert!(entry.dn().is_empty());
        assert_eq!(
            entry.get("vendorName").unwrap().values(),
            &[Value::text(VENDOR_NAME)]
        );
        assert!(entry.get("objectClass").unwrap().contains(&Value::text("extensibleObject")));
        assert!(entry.has_attribute("supportedSASLMechanisms"));
        assert!(dse.naming_contexts().is_empty());
    }

    #[test]
    fn naming_contexts_mirror_membership() {
        let mut dse = RootDse::new();
        dse.add_naming_context("ou=system");
        dse.add_naming_context("dc=example,dc=com");
        assert_eq!(
            dse.naming_contexts(),
            vec!["ou=system".to_string(), "dc=example,dc=com".to_string()]
        );
        dse.remove_naming_context("ou=system");
        assert_eq!(dse.naming_contexts(), vec!["dc=example,dc=com".to_string()]);
        dse.remove_naming_context("dc=example,dc=com");
        assert!(dse.naming_contexts().is_empty());
        assert!(!dse.entry().has_attribute("namingContexts"));
    }

    #[test]
    fn lookup_clone_is_independent() {
        let dse = RootDse::new();
        let schema = CoreSchema::new();
        let mut clone = dse.lookup(&AttributeSelection::All, &schema);
        clone.remove("vendorName");
        assert!(dse.entry().has_attribute("vendorName"));
        let again = dse.lookup(&AttributeSelection::All, &schema);
        assert_eq!(&again, dse.entry());
    }

    #[test]
    fn search_projection_no_attributes_marker() {
        let dse = RootDse::new();
        let schema = CoreSchema::new();
        let out = dse.search_projection(&AttributeSelection::ids(["1.1"]), &schema);
        assert_eq!(out.attribute_count(), 0);
    }

    #[test]
    fn search_projection_named() {
        let mut dse = RootDse::new();
        dse.add_naming_context("ou=system");
        let schema = CoreSchema::new();
        let out = dse.search_projection(
            &AttributeSelection::ids(["namingContexts", "vendorName"]),
            &schema,
        );
        assert_eq!(out.attribute_count(), 2);
        assert_eq!(
            out.get("vendorName").unwrap().values(),
            &[Value::text(VENDOR_NAME)]
        );
        assert_eq!(
            out.get("namingContexts").unwrap().values(),
            &[Value::text("ou=system")]
        );
    }

    #[test]
    fn register_extension_oids() {
        let mut dse = RootDse::new();
        dse.register_extensions(&["1.3.6.1.4.1.4203.1.11.1".to_string()]);
        assert!(dse
            .entry()
            .get("supportedExtension")
            .unwrap()
            .contains(&Value::text("1.3.6.1.4.1.4203.1.11.1")));
        dse.register_sasl_mechanisms(&["GSSAPI".to_string()]);
        assert!(dse
            .entry()
            .get("supportedSASLMechanisms")
            .unwrap()
            .contains(&Value::text("GSSAPI")));
    }
}

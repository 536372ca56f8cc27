//! Entries: an attribute set bound to a DN.

use crate::dn::Dn;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One attribute of an entry: an attribute-type identifier (user-provided
/// casing preserved) plus a duplicate-free, insertion-ordered value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    id: String,
    values: Vec<Value>,
}

impl Attribute {
    pub fn new(id: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        let mut attr = Self {
            id: id.into(),
            values: Vec::new(),
        };
        for value in values {
            attr.add_value(value);
        }
        attr
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Add a value; returns false (and leaves the list unchanged) if it is
    /// already present.
    pub fn add_value(&mut self, value: Value) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Remove a value; returns whether it was present.
    pub fn remove_value(&mut self, value: &Value) -> bool {
        let before = self.values.len();
        self.values.retain(|v| v != value);
        self.values.len() != before
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An entry: a DN plus attributes keyed case-insensitively by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    dn: Dn,
    // Keyed by the lowercased identifier; the attribute itself preserves the
    // user-provided casing.
    attrs: BTreeMap<String, Attribute>,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attrs: BTreeMap::new(),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn set_dn(&mut self, dn: Dn) {
        self.dn = dn;
    }

    pub fn get(&self, id: &str) -> Option<&Attribute> {
        self.attrs.get(&id.to_ascii_lowercase())
    }

    pub fn has_attribute(&self, id: &str) -> bool {
        self.attrs.contains_key(&id.to_ascii_lowercase())
    }

    /// Install an attribute wholesale, replacing any attribute with the same
    /// (case-insensitive) identifier; the replaced attribute is returned.
    pub fn put(&mut self, attribute: Attribute) -> Option<Attribute> {
        self.attrs
            .insert(attribute.id().to_ascii_lowercase(), attribute)
    }

    /// Add one value to an attribute, creating the attribute if absent.
    pub fn add_value(&mut self, id: &str, value: Value) {
        self.attrs
            .entry(id.to_ascii_lowercase())
            .or_insert_with(|| Attribute::new(id, []))
            .add_value(value);
    }

    pub fn remove(&mut self, id: &str) -> Option<Attribute> {
        self.attrs.remove(&id.to_ascii_lowercase())
    }

    /// Remove one value from an attribute; the attribute itself is removed
    /// once its last value goes. Returns whether the value was present.
    pub fn remove_value(&mut self, id: &str, value: &Value) -> bool {
        let key = id.to_ascii_lowercase();
        let Some(attr) = self.attrs.get_mut(&key) else {
            return false;
        };
        let removed = attr.remove_value(value);
        if attr.is_empty() {
            self.attrs.remove(&key);
        }
        removed
    }

    pub fn attribute_count(&self) -> usize {
        self.attrs.len()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        let mut e = Entry::new(Dn::parse("cn=x,ou=system").unwrap());
        e.put(Attribute::new(
            "objectClass",
            [Value::text("top"), Value::text("person")],
        ));
        e.add_value("cn", Value::text("x"));
        e
    }

    #[test]
    fn case_insensitive_lookup() {
        let e = entry();
        assert!(e.has_attribute("objectclass"));
        assert!(e.has_attribute("OBJECTCLASS"));
        // User-provided casing is preserved.
        assert_eq!(e.get("objectclass").unwrap().id(), "objectClass");
    }

    #[test]
    fn values_are_duplicate_free() {
        let mut e = entry();
        e.add_value("cn", Value::text("x"));
        assert_eq!(e.get("cn").unwrap().len(), 1);
    }

    #[test]
    fn remove_last_value_drops_attribute() {
        let mut e = entry();
        assert!(e.remove_value("cn", &Value::text("x")));
        assert!(!e.has_attribute("cn"));
        assert!(!e.remove_value("cn", &Value::text("x")));
    }

    #[test]
    fn clones_are_independent() {
        let original = entry();
        let mut clone = original.clone();
        clone.remove("objectClass");
        clone.add_value("sn", Value::text("y"));
        assert!(original.has_attribute("objectClass"));
        assert!(!original.has_attribute("sn"));
    }
}

//! Distinguished names.
//!
//! A [`Dn`] is an ordered sequence of [`Rdn`] components stored root-most
//! first; the LDAP string form (`Display` and [`Dn::parse`]) is leaf-first
//! with `,` separators, so `"cn=x,ou=users,ou=system"` has `ou=system` as its
//! root-most component. Each RDN is a non-empty set of attribute-value
//! assertions; multi-valued RDNs (`cn=a+sn=b`) are legal.
//!
//! Equality of user-provided DNs is literal. Semantic equality goes through
//! [`NormalizedDn`], which is produced by schema-driven normalization and is
//! the only form used for map keys and routing.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DnError {
    #[error("empty RDN component in {dn:?}")]
    EmptyComponent { dn: String },

    #[error("empty RDN")]
    EmptyRdn,

    #[error("attribute value assertion {ava:?} has no '='")]
    MissingEquals { ava: String },

    #[error("empty attribute type in {ava:?}")]
    EmptyAttributeType { ava: String },

    #[error("truncated escape sequence in {value:?}")]
    TruncatedEscape { value: String },

    #[error("invalid hex escape in {value:?}")]
    InvalidHexEscape { value: String },
}

pub type Result<T, E = DnError> = std::result::Result<T, E>;

/// One attribute-value assertion within an RDN, in user-provided form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape_value(&self.value))
    }
}

/// One relative distinguished name: a non-empty set of AVAs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    /// Build an RDN from a non-empty AVA list.
    pub fn new(avas: Vec<Ava>) -> Result<Self> {
        if avas.is_empty() {
            return Err(DnError::EmptyRdn);
        }
        Ok(Self { avas })
    }

    /// Build a single-valued RDN.
    pub fn single(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            avas: vec![Ava::new(attribute, value)],
        }
    }

    /// Parse one RDN from its string form, e.g. `cn=a` or `cn=a+sn=b`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut avas = Vec::new();
        for part in split_unescaped(s, '+') {
            let part = trim_unescaped(part);
            let Some(eq) = find_unescaped(part, '=') else {
                return Err(DnError::MissingEquals {
                    ava: part.to_string(),
                });
            };
            let attribute = part[..eq].trim();
            if attribute.is_empty() {
                return Err(DnError::EmptyAttributeType {
                    ava: part.to_string(),
                });
            }
            let value = unescape_value(trim_unescaped(&part[eq + 1..]))?;
            avas.push(Ava::new(attribute, value));
        }
        Self::new(avas)
    }

    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{ava}")?;
        }
        Ok(())
    }
}

/// A distinguished name in user-provided form. RDNs are stored root-most
/// first; the zero-length DN (the root DSE target) is [`Dn::root`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The zero-length DN.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a DN from a root-first RDN sequence.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self { rdns }
    }

    /// Parse the LDAP string form. Handles RFC 4514-style escapes (`\,`
    /// `\+` `\\` and friends, plus two-hex-digit byte escapes) and trims
    /// unescaped whitespace around separators. The empty string parses to
    /// the zero-length DN; an empty component (`"cn=a,,dc=b"`) is an error.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut rdns = Vec::new();
        for part in split_unescaped(s, ',') {
            let part = trim_unescaped(part);
            if part.is_empty() {
                return Err(DnError::EmptyComponent { dn: s.to_string() });
            }
            rdns.push(Rdn::parse(part)?);
        }
        // The string form is leaf-first.
        rdns.reverse();
        Ok(Self { rdns })
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Root-first RDN sequence.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leaf-most RDN, if any.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.last()
    }

    /// The DN with the leaf-most RDN removed; `None` for the zero-length DN.
    pub fn parent(&self) -> Option<Self> {
        if self.rdns.is_empty() {
            return None;
        }
        Some(Self {
            rdns: self.rdns[..self.rdns.len() - 1].to_vec(),
        })
    }

    /// The DN one level below `self` at `rdn`.
    pub fn child(&self, rdn: Rdn) -> Self {
        let mut rdns = self.rdns.clone();
        rdns.push(rdn);
        Self { rdns }
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The canonical form of a DN, used for equality, ordering, map keys and
/// routing: one normalized component string per RDN (root-first, AVAs of a
/// multi-valued RDN sorted) plus the joined leaf-first string.
///
/// Produced by schema-driven normalization; two DNs are equal iff their
/// normalized forms are equal component-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct NormalizedDn {
    // Root-first; `joined` is a pure function of `components`, so derived
    // equality and ordering remain component-wise.
    components: Vec<String>,
    joined: String,
}

impl NormalizedDn {
    /// The zero-length DN.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build from a root-first normalized component sequence.
    pub fn from_components(components: Vec<String>) -> Self {
        let joined = components
            .iter()
            .rev()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        Self { components, joined }
    }

    /// Root-first normalized components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The joined leaf-first string form.
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// The name with the leaf-most component removed; `None` for the
    /// zero-length DN.
    pub fn parent(&self) -> Option<Self> {
        if self.components.is_empty() {
            return None;
        }
        Some(Self::from_components(
            self.components[..self.components.len() - 1].to_vec(),
        ))
    }

    /// True when `self` is a component-wise ancestor of `other` (or equal to
    /// it): every component of `self` matches the corresponding root-side
    /// component of `other`.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.components.starts_with(&self.components)
    }
}

impl fmt::Display for NormalizedDn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined)
    }
}

/// Escape an attribute value for inclusion in a DN string: specials get a
/// leading backslash, as do leading `#` and leading/trailing spaces.
pub fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let escape = matches!(c, '\\' | ',' | '+' | '"' | '<' | '>' | ';')
            || (c == '#' && i == 0)
            || (c == ' ' && (i == 0 || i == chars.len() - 1));
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split on every unescaped occurrence of `sep`.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Byte index of the first unescaped occurrence of `sep`.
fn find_unescaped(s: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some(i);
        }
    }
    None
}

/// Trim unescaped whitespace from both ends; an escaped trailing space
/// (`"foo\ "`) is part of the value and survives.
fn trim_unescaped(s: &str) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = s.len();
    while end > 0 && bytes[end - 1] == b' ' {
        let mut backslashes = 0;
        let mut i = end - 1;
        while i > 0 && bytes[i - 1] == b'\\' {
            backslashes += 1;
            i -= 1;
        }
        if backslashes % 2 == 1 {
            break;
        }
        end -= 1;
    }
    &s[..end]
}

fn unescape_value(s: &str) -> Result<String> {
    let mut bytes = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        if c != '\\' {
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(first) = chars.next() else {
            return Err(DnError::TruncatedEscape {
                value: s.to_string(),
            });
        };
        if first.is_ascii_hexdigit() {
            let second = chars.next().filter(char::is_ascii_hexdigit).ok_or_else(|| {
                DnError::InvalidHexEscape {
                    value: s.to_string(),
                }
            })?;
            let high = first.to_digit(16).unwrap_or(0) as u8;
            let low = second.to_digit(16).unwrap_or(0) as u8;
            bytes.push(high << 4 | low);
        } else {
            bytes.extend_from_slice(first.encode_utf8(&mut buf).as_bytes());
        }
    }
    String::from_utf8(bytes).map_err(|_| DnError::InvalidHexEscape {
        value: s.to_string(),
    })
}

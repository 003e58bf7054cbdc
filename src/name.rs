//! Distinguished names.
//!
//! A [`Name`] is an ordered sequence of relative distinguished names, each
//! of which is a set of attribute-value pairs. Names decode from their DER
//! representation and compare through a total order that applies the
//! directory-string normalization rules: printable strings compare
//! case-insensitively, UTF-8 and IA5 strings compare exactly, and anything
//! else compares by its raw encoding.
//!
//! Names never reference the certificate they came from; they can be
//! cloned, held and compared independently.

use std::cmp::Ordering;
use std::fmt;
use bcder::{decode, Captured, Oid, Tag};
use bcder::decode::Constructed;
use bytes::Bytes;
use crate::oid;


//------------ Name ----------------------------------------------------------

/// A distinguished name.
#[derive(Clone, Debug)]
pub struct Name {
    /// The sequence of relative distinguished names.
    rdns: Vec<Rdn>,
}

impl Name {
    /// Creates a name from its relative distinguished names.
    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Name { rdns }
    }

    /// Takes an encoded name from the beginning of a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            let mut rdns = Vec::new();
            while let Some(rdn) = Rdn::take_opt_from(cons)? {
                rdns.push(rdn)
            }
            Ok(Name { rdns })
        })
    }

    /// Returns whether this is the null name, i.e., has no components.
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Returns the relative distinguished names in order.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Returns the last relative distinguished name, if any.
    pub fn last_rdn(&self) -> Option<&Rdn> {
        self.rdns.last()
    }

    /// Returns a copy of the name with the last component removed.
    pub fn without_last_rdn(&self) -> Name {
        let mut rdns = self.rdns.clone();
        rdns.pop();
        Name { rdns }
    }

    /// Compares two names, producing a total order.
    pub fn cmp_names(&self, other: &Self) -> Ordering {
        self.rdns.len().cmp(&other.rdns.len()).then_with(|| {
            for (left, right) in self.rdns.iter().zip(other.rdns.iter()) {
                let ord = left.cmp_rdns(right);
                if ord != Ordering::Equal {
                    return ord
                }
            }
            Ordering::Equal
        })
    }

    /// Returns whether this name is a prefix of `other`.
    ///
    /// Every component of this name must be identical to the component of
    /// `other` at the same position; `other` may carry further components.
    /// This is the matching rule for directoryName name constraints.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.rdns.len() > other.rdns.len() {
            return false
        }
        self.rdns.iter().zip(other.rdns.iter()).all(|(left, right)| {
            left.cmp_rdns(right) == Ordering::Equal
        })
    }
}


//--- PartialEq and Eq

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_names(other) == Ordering::Equal
    }
}

impl Eq for Name { }


//--- Display

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for rdn in &self.rdns {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}


//------------ Rdn -----------------------------------------------------------

/// A relative distinguished name: a set of attribute-value pairs.
#[derive(Clone, Debug)]
pub struct Rdn {
    /// The attributes in encoding order.
    atvs: Vec<AttributeTypeAndValue>,
}

impl Rdn {
    /// Creates a relative distinguished name from its attributes.
    pub fn from_atvs(atvs: Vec<AttributeTypeAndValue>) -> Self {
        Rdn { atvs }
    }

    /// Takes an optional relative distinguished name from a value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_set(|cons| {
            let mut atvs = Vec::new();
            while let Some(atv)
                = AttributeTypeAndValue::take_opt_from(cons)?
            {
                atvs.push(atv)
            }
            Ok(Rdn { atvs })
        })
    }

    /// Returns the attributes of this component.
    pub fn atvs(&self) -> &[AttributeTypeAndValue] {
        &self.atvs
    }

    /// Returns whether this component is a lone commonName attribute.
    pub fn is_single_cn(&self) -> bool {
        self.atvs.len() == 1
            && self.atvs[0].attr_type == oid::AT_COMMON_NAME
    }

    /// Compares two components position-wise.
    pub fn cmp_rdns(&self, other: &Self) -> Ordering {
        self.atvs.len().cmp(&other.atvs.len()).then_with(|| {
            for (left, right) in self.atvs.iter().zip(other.atvs.iter()) {
                let ord = left.cmp_atvs(right);
                if ord != Ordering::Equal {
                    return ord
                }
            }
            Ordering::Equal
        })
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for atv in &self.atvs {
            if !first {
                write!(f, "+")?;
            }
            first = false;
            write!(f, "{}", atv)?;
        }
        Ok(())
    }
}


//------------ AttributeTypeAndValue -----------------------------------------

/// A single attribute of a relative distinguished name.
#[derive(Clone, Debug)]
pub struct AttributeTypeAndValue {
    /// The attribute type.
    attr_type: Oid<Bytes>,

    /// The attribute value.
    value: AttributeValue,
}

impl AttributeTypeAndValue {
    /// Creates an attribute from type and value.
    pub fn new(attr_type: Oid<Bytes>, value: AttributeValue) -> Self {
        AttributeTypeAndValue { attr_type, value }
    }

    /// Takes an optional attribute from a constructed value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_sequence(|cons| {
            let attr_type = Oid::take_from(cons)?;
            let raw = cons.capture_one()?;
            Ok(AttributeTypeAndValue {
                attr_type,
                value: AttributeValue::from_captured(raw),
            })
        })
    }

    /// Returns the attribute type.
    pub fn attr_type(&self) -> &Oid<Bytes> {
        &self.attr_type
    }

    /// Returns the attribute value.
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Compares two attributes by type, then by normalized value.
    pub fn cmp_atvs(&self, other: &Self) -> Ordering {
        self.attr_type.0.as_ref().cmp(other.attr_type.0.as_ref())
            .then_with(|| self.value.cmp_values(&other.value))
    }
}

impl fmt::Display for AttributeTypeAndValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.attr_type.0.as_ref();
        if bytes == oid::AT_COMMON_NAME.0 {
            write!(f, "CN")?;
        }
        else if bytes == oid::AT_COUNTRY_NAME.0 {
            write!(f, "C")?;
        }
        else if bytes == oid::AT_ORGANIZATION_NAME.0 {
            write!(f, "O")?;
        }
        else if bytes == oid::AT_ORGANIZATIONAL_UNIT_NAME.0 {
            write!(f, "OU")?;
        }
        else {
            fmt_oid(f, bytes)?;
        }
        write!(f, "={}", self.value)
    }
}


//------------ AttributeValue ------------------------------------------------

/// The value of a name attribute.
///
/// The common directory-string forms are carried as strings; everything
/// else keeps its captured encoding and participates in comparisons as
/// opaque data.
#[derive(Clone, Debug)]
pub enum AttributeValue {
    /// A PrintableString. Compares case-insensitively.
    Printable(String),

    /// A UTF8String. Compares exactly.
    Utf8(String),

    /// An IA5String. Compares exactly.
    Ia5(String),

    /// Any other value, as its captured encoding.
    Other(Captured),
}

impl AttributeValue {
    /// Classifies a captured attribute value.
    ///
    /// Values that are not one of the understood string forms, or whose
    /// content is not valid UTF-8, stay opaque.
    pub fn from_captured(raw: Captured) -> Self {
        let parsed = raw.clone().decode(|cons| {
            cons.take_primitive(|tag, prim| {
                let content = prim.take_all()?;
                let kind = if tag == Tag::PRINTABLE_STRING {
                    Kind::Printable
                }
                else if tag == Tag::UTF8_STRING {
                    Kind::Utf8
                }
                else if tag == Tag::IA5_STRING {
                    Kind::Ia5
                }
                else {
                    return Err(decode::Malformed.into())
                };
                Ok((kind, content))
            })
        });
        let (kind, content) = match parsed {
            Ok(parsed) => parsed,
            Err(_) => return AttributeValue::Other(raw)
        };
        let text = match String::from_utf8(content.as_ref().to_vec()) {
            Ok(text) => text,
            Err(_) => return AttributeValue::Other(raw)
        };
        match kind {
            Kind::Printable => AttributeValue::Printable(text),
            Kind::Utf8 => AttributeValue::Utf8(text),
            Kind::Ia5 => AttributeValue::Ia5(text),
        }
    }

    /// Returns the textual content if there is one.
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            AttributeValue::Printable(ref text) => Some(text),
            AttributeValue::Utf8(ref text) => Some(text),
            AttributeValue::Ia5(ref text) => Some(text),
            AttributeValue::Other(_) => None,
        }
    }

    /// Compares two values, producing a total order.
    pub fn cmp_values(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| {
            match (self, other) {
                (
                    AttributeValue::Printable(left),
                    AttributeValue::Printable(right)
                ) => cmp_caseless(left, right),
                (
                    AttributeValue::Utf8(left),
                    AttributeValue::Utf8(right)
                ) => left.cmp(right),
                (
                    AttributeValue::Ia5(left),
                    AttributeValue::Ia5(right)
                ) => left.cmp(right),
                (
                    AttributeValue::Other(left),
                    AttributeValue::Other(right)
                ) => AsRef::<[u8]>::as_ref(left).cmp(AsRef::<[u8]>::as_ref(right)),
                _ => Ordering::Equal,
            }
        })
    }

    /// Returns the ordering rank of the variant.
    fn rank(&self) -> u8 {
        match *self {
            AttributeValue::Printable(_) => 0,
            AttributeValue::Utf8(_) => 1,
            AttributeValue::Ia5(_) => 2,
            AttributeValue::Other(_) => 3,
        }
    }
}

/// The understood string forms.
enum Kind {
    Printable,
    Utf8,
    Ia5,
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AttributeValue::Printable(ref text) => f.write_str(text),
            AttributeValue::Utf8(ref text) => f.write_str(text),
            AttributeValue::Ia5(ref text) => f.write_str(text),
            AttributeValue::Other(ref raw) => {
                write!(f, "#")?;
                for octet in AsRef::<[u8]>::as_ref(raw) {
                    write!(f, "{:02x}", octet)?;
                }
                Ok(())
            }
        }
    }
}


//------------ Helpers -------------------------------------------------------

/// Compares two strings ignoring ASCII case.
fn cmp_caseless(left: &str, right: &str) -> Ordering {
    left.bytes().map(|ch| ch.to_ascii_lowercase())
        .cmp(right.bytes().map(|ch| ch.to_ascii_lowercase()))
}

/// Formats the content octets of an object identifier in dotted form.
fn fmt_oid(f: &mut fmt::Formatter, bytes: &[u8]) -> fmt::Result {
    let mut component = 0u32;
    let mut first = true;
    for &octet in bytes {
        component = (component << 7) | u32::from(octet & 0x7f);
        if octet & 0x80 == 0 {
            if first {
                let x = if component < 80 { component / 40 } else { 2 };
                write!(f, "{}.{}", x, component - x * 40)?;
                first = false;
            }
            else {
                write!(f, ".{}", component)?;
            }
            component = 0;
        }
    }
    Ok(())
}


//============ Tests =========================================================

//! The certificate data model.
//!
//! This module contains the types that make up a decoded certificate:
//! [`Certificate`] with its [`TbsCertificate`], the [`AlgorithmIdentifier`],
//! [`SubjectPublicKeyInfo`], [`Validity`], [`Time`], [`Serial`], and the raw
//! [`Extension`] list. Decoding happens through bcder; the encoded form of
//! both the complete certificate and the TBS portion is captured during
//! decoding so that signatures can be checked over the exact octets that
//! were signed and so that re-encoding reproduces the input bit for bit.
//!
//! Typed access to individual extensions lives in the [`ext`][crate::ext]
//! module; this module only locates extensions by identifier.

use std::cmp::Ordering;
use bcder::{decode, BitString, Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::Constructed;
use bytes::Bytes;
use chrono::{DateTime, LocalResult, TimeZone, Utc};
use crate::name::Name;


//------------ Certificate ---------------------------------------------------

/// A decoded certificate.
///
/// The value owns the captured DER encoding it was decoded from. All parts
/// of the certificate are reachable through accessor methods; the raw
/// encoding is available via [`to_bytes`][Self::to_bytes].
#[derive(Clone, Debug)]
pub struct Certificate {
    /// The captured encoding of the complete certificate.
    raw: Captured,

    /// The to-be-signed portion.
    tbs: TbsCertificate,

    /// The algorithm the signature was created with.
    signature_algorithm: AlgorithmIdentifier,

    /// The signature itself.
    signature_value: BitString,
}

impl Certificate {
    /// Decodes a DER-encoded certificate from a source.
    pub fn decode<S: decode::Source>(source: S) -> Result<Self, S::Err> {
        Mode::Der.decode(source, Self::take_from)
    }

    /// Takes a certificate from the beginning of a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let raw = cons.capture_one()?;
        raw.clone().decode(|cons| {
            cons.take_sequence(|cons| {
                Ok(Certificate {
                    raw: raw.clone(),
                    tbs: TbsCertificate::take_from(cons)?,
                    signature_algorithm: AlgorithmIdentifier::take_from(cons)?,
                    signature_value: BitString::take_from(cons)?,
                })
            })
        }).map_err(Into::into)
    }

    /// Returns the version number of the certificate.
    ///
    /// This is the human version, i.e., the default is 1 and certificates
    /// with extensions are version 3.
    pub fn version(&self) -> u8 {
        self.tbs.version.map(|v| v + 1).unwrap_or(1)
    }

    /// Returns the serial number.
    pub fn serial(&self) -> &Serial {
        &self.tbs.serial_number
    }

    /// Returns the issuer name.
    pub fn issuer(&self) -> &Name {
        &self.tbs.issuer
    }

    /// Returns the subject name.
    pub fn subject(&self) -> &Name {
        &self.tbs.subject
    }

    /// Returns the validity period.
    pub fn validity(&self) -> &Validity {
        &self.tbs.validity
    }

    /// Returns the subject public key info.
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfo {
        &self.tbs.subject_public_key_info
    }

    /// Returns the signature algorithm of the certificate.
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    /// Returns the signature value.
    pub fn signature_value(&self) -> &BitString {
        &self.signature_value
    }

    /// Returns the raw encoding of the to-be-signed portion.
    pub fn tbs_raw(&self) -> &[u8] {
        self.tbs.raw.as_ref()
    }

    /// Returns the extensions of the certificate.
    ///
    /// Version 1 and 2 certificates return an empty slice.
    pub fn extensions(&self) -> &[Extension] {
        match self.tbs.extensions {
            Some(ref some) => some.as_slice(),
            None => &[]
        }
    }

    /// Finds an extension by identifier, starting at `cursor`.
    ///
    /// On a match, `cursor` is advanced past the matching extension so a
    /// follow-up call continues the scan. Returns `None` for certificates
    /// below version 3 and when no further extension matches.
    pub fn find_extension<U: AsRef<[u8]>>(
        &self, id: &Oid<U>, cursor: &mut usize
    ) -> Option<&Extension> {
        if self.version() < 3 {
            return None
        }
        let extensions = self.tbs.extensions.as_ref()?;
        while *cursor < extensions.len() {
            let ext = &extensions[*cursor];
            *cursor += 1;
            if ext.id == *id {
                return Some(ext)
            }
        }
        None
    }

    /// Returns a copy of the DER encoding of the certificate.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.raw.as_ref())
    }

    /// Compares two certificates, producing a total order.
    ///
    /// The order compares the signature value first, then the signature
    /// algorithm, then the raw encoding of the to-be-signed portion. Two
    /// certificates comparing equal are byte-identical in all parts that
    /// were signed.
    pub fn cmp_cert(&self, other: &Self) -> Ordering {
        cmp_bit_string(&self.signature_value, &other.signature_value)
            .then_with(|| {
                self.signature_algorithm.cmp_alg(&other.signature_algorithm)
            })
            .then_with(|| AsRef::<[u8]>::as_ref(&self.tbs.raw).cmp(AsRef::<[u8]>::as_ref(&other.tbs.raw)))
    }
}


//------------ TbsCertificate ------------------------------------------------

/// The signed portion of a certificate.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    /// The captured encoding of the TBS sequence.
    raw: Captured,

    /// The raw version field. `None` means version 1.
    version: Option<u8>,

    /// The serial number.
    serial_number: Serial,

    /// The signature algorithm as stated inside the signed portion.
    signature: AlgorithmIdentifier,

    /// The name of the issuing entity.
    issuer: Name,

    /// The validity period.
    validity: Validity,

    /// The name of the subject.
    subject: Name,

    /// The public key and its algorithm.
    subject_public_key_info: SubjectPublicKeyInfo,

    /// The issuer unique identifier, kept raw.
    issuer_unique_id: Option<Bytes>,

    /// The subject unique identifier, kept raw.
    subject_unique_id: Option<Bytes>,

    /// The extension list. `None` when the field is absent.
    extensions: Option<Vec<Extension>>,
}

impl TbsCertificate {
    /// Takes a TBS certificate from the beginning of a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let raw = cons.capture_one()?;
        raw.clone().decode(|cons| {
            cons.take_sequence(|cons| {
                let version = cons.take_opt_constructed_if(
                    Tag::CTX_0, |cons| {
                        cons.take_primitive_if(Tag::INTEGER, |prim| {
                            let content = prim.take_all()?;
                            if content.len() != 1 {
                                return Err(decode::Malformed.into())
                            }
                            Ok(content[0])
                        })
                    }
                )?;
                Ok(TbsCertificate {
                    raw: raw.clone(),
                    version,
                    serial_number: Serial::take_from(cons)?,
                    signature: AlgorithmIdentifier::take_from(cons)?,
                    issuer: Name::take_from(cons)?,
                    validity: Validity::take_from(cons)?,
                    subject: Name::take_from(cons)?,
                    subject_public_key_info:
                        SubjectPublicKeyInfo::take_from(cons)?,
                    issuer_unique_id: cons.take_opt_primitive_if(
                        Tag::CTX_1, |prim| prim.take_all()
                    )?,
                    subject_unique_id: cons.take_opt_primitive_if(
                        Tag::CTX_2, |prim| prim.take_all()
                    )?,
                    extensions: cons.take_opt_constructed_if(
                        Tag::CTX_3, |cons| {
                            cons.take_sequence(|cons| {
                                let mut extensions = Vec::new();
                                while let Some(ext)
                                    = Extension::take_opt_from(cons)?
                                {
                                    extensions.push(ext)
                                }
                                Ok(extensions)
                            })
                        }
                    )?,
                })
            })
        }).map_err(Into::into)
    }
}


//------------ Extension -----------------------------------------------------

/// A single certificate extension with its value kept undecoded.
#[derive(Clone, Debug)]
pub struct Extension {
    /// The extension identifier.
    id: Oid<Bytes>,

    /// Whether the extension was marked critical.
    critical: bool,

    /// The raw extension value.
    value: OctetString,
}

impl Extension {
    /// Takes an optional extension from a constructed value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_sequence(|cons| {
            Ok(Extension {
                id: Oid::take_from(cons)?,
                critical: cons.take_opt_bool()?.unwrap_or(false),
                value: OctetString::take_from(cons)?,
            })
        })
    }

    /// Returns the extension identifier.
    pub fn id(&self) -> &Oid<Bytes> {
        &self.id
    }

    /// Returns whether the extension was marked critical.
    pub fn critical(&self) -> bool {
        self.critical
    }

    /// Returns the raw value of the extension.
    pub fn value(&self) -> &OctetString {
        &self.value
    }
}


//------------ AlgorithmIdentifier -------------------------------------------

/// An algorithm identifier: an object identifier plus opaque parameters.
///
/// The parameters are kept as their captured encoding. The engine never
/// interprets them; they only participate in comparisons.
#[derive(Clone, Debug)]
pub struct AlgorithmIdentifier {
    /// The object identifier of the algorithm.
    algorithm: Oid<Bytes>,

    /// The captured parameters, if present.
    parameters: Option<Captured>,
}

impl AlgorithmIdentifier {
    /// Creates an identifier for an algorithm without parameters.
    pub fn new(algorithm: Oid<Bytes>) -> Self {
        AlgorithmIdentifier { algorithm, parameters: None }
    }

    /// Takes an algorithm identifier from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            let algorithm = Oid::take_from(cons)?;
            let parameters = cons.capture_all()?;
            let parameters = if AsRef::<[u8]>::as_ref(&parameters).is_empty() {
                None
            }
            else {
                Some(parameters)
            };
            Ok(AlgorithmIdentifier { algorithm, parameters })
        })
    }

    /// Returns the object identifier of the algorithm.
    pub fn algorithm(&self) -> &Oid<Bytes> {
        &self.algorithm
    }

    /// Compares two algorithm identifiers.
    ///
    /// The identifiers are compared by object identifier first. Parameters
    /// are opaque: two absent parameter fields are equal, an absent field
    /// orders before a present one, two present fields compare by their
    /// encoding.
    pub fn cmp_alg(&self, other: &Self) -> Ordering {
        self.algorithm.0.as_ref().cmp(other.algorithm.0.as_ref())
            .then_with(|| {
                match (self.parameters.as_ref(), other.parameters.as_ref()) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(left), Some(right)) => {
                        AsRef::<[u8]>::as_ref(left).cmp(AsRef::<[u8]>::as_ref(right))
                    }
                }
            })
    }
}


//------------ SubjectPublicKeyInfo ------------------------------------------

/// The public key of a certificate together with its algorithm.
#[derive(Clone, Debug)]
pub struct SubjectPublicKeyInfo {
    /// The algorithm of the key.
    algorithm: AlgorithmIdentifier,

    /// The key itself.
    subject_public_key: BitString,
}

impl SubjectPublicKeyInfo {
    /// Takes a subject public key info from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            Ok(SubjectPublicKeyInfo {
                algorithm: AlgorithmIdentifier::take_from(cons)?,
                subject_public_key: BitString::take_from(cons)?,
            })
        })
    }

    /// Returns the algorithm of the key.
    pub fn algorithm(&self) -> &AlgorithmIdentifier {
        &self.algorithm
    }

    /// Returns the bit string holding the public key.
    pub fn subject_public_key(&self) -> &BitString {
        &self.subject_public_key
    }

    /// Returns the octets of the public key.
    ///
    /// The length of the returned slice is the bit length of the key
    /// divided by eight. Returns an empty slice for a key with dangling
    /// bits, which no real-world key has.
    pub fn key_octets(&self) -> &[u8] {
        self.subject_public_key.octet_slice().unwrap_or(&[])
    }
}


//------------ Serial --------------------------------------------------------

/// A certificate serial number.
///
/// RFC 5280 requires support for serial numbers of up to twenty octets,
/// so the value is kept as the raw content octets of the INTEGER.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Serial(Bytes);

impl Serial {
    /// Creates a serial number from its content octets.
    pub fn new(bytes: Bytes) -> Self {
        Serial(bytes)
    }

    /// Takes a serial number from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_primitive_if(Tag::INTEGER, |prim| {
            let content = prim.take_all()?;
            if content.is_empty() {
                return Err(decode::Malformed.into())
            }
            Ok(Serial(content))
        })
    }

    /// Returns the content octets of the serial number.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Ord for Serial {
    fn cmp(&self, other: &Self) -> Ordering {
        // Minimal DER integers of equal sign order numerically when the
        // shorter encoding orders first.
        self.0.len().cmp(&other.0.len())
            .then_with(|| self.0.as_ref().cmp(other.0.as_ref()))
    }
}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}


//------------ Validity ------------------------------------------------------

/// The validity period of a certificate.
#[derive(Clone, Copy, Debug)]
pub struct Validity {
    not_before: Time,
    not_after: Time,
}

impl Validity {
    /// Creates a validity period from its two boundaries.
    pub fn new(not_before: Time, not_after: Time) -> Self {
        Validity { not_before, not_after }
    }

    /// Takes a validity period from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            Ok(Validity::new(
                Time::take_from(cons)?,
                Time::take_from(cons)?,
            ))
        })
    }

    /// Returns the beginning of the period.
    pub fn not_before(&self) -> Time {
        self.not_before
    }

    /// Returns the end of the period.
    pub fn not_after(&self) -> Time {
        self.not_after
    }

    /// Returns whether the period contains the given time.
    pub fn covers(&self, time: Time) -> bool {
        self.not_before <= time && time <= self.not_after
    }
}


//------------ Time ----------------------------------------------------------

/// A point in time as used inside certificates.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Time(DateTime<Utc>);

impl Time {
    /// Returns the current time.
    pub fn now() -> Self {
        Time(Utc::now())
    }

    /// Creates a time value from seconds since the Unix epoch.
    pub fn from_secs(secs: i64) -> Self {
        Time(Utc.timestamp(secs, 0))
    }

    /// Returns the time as seconds since the Unix epoch.
    pub fn to_secs(self) -> i64 {
        self.0.timestamp()
    }

    /// Takes a time value from a constructed value.
    ///
    /// Accepts both the UTCTime and the GeneralizedTime form, each in the
    /// Zulu-only format RFC 5280 requires.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_primitive(|tag, prim| {
            let content = prim.take_all()?;
            let parts = match tag {
                Tag::UTC_TIME => Self::parse_utc(content.as_ref()),
                Tag::GENERALIZED_TIME => {
                    Self::parse_generalized(content.as_ref())
                }
                _ => None
            };
            let (year, month, day, hour, minute, second) = match parts {
                Some(parts) => parts,
                None => return Err(decode::Malformed.into())
            };
            let date = match Utc.ymd_opt(year, month, day) {
                LocalResult::Single(date) => date,
                _ => return Err(decode::Malformed.into())
            };
            match date.and_hms_opt(hour, minute, second) {
                Some(time) => Ok(Time(time)),
                None => Err(decode::Malformed.into())
            }
        })
    }

    /// Parses the content of a UTCTime: `YYMMDDHHMMSSZ`.
    fn parse_utc(content: &[u8]) -> Option<(i32, u32, u32, u32, u32, u32)> {
        if content.len() != 13 || content[12] != b'Z' {
            return None
        }
        let year = two_digits(content, 0)? as i32;
        let year = if year >= 50 { year + 1900 } else { year + 2000 };
        Some((
            year,
            two_digits(content, 2)?,
            two_digits(content, 4)?,
            two_digits(content, 6)?,
            two_digits(content, 8)?,
            two_digits(content, 10)?,
        ))
    }

    /// Parses the content of a GeneralizedTime: `YYYYMMDDHHMMSSZ`.
    fn parse_generalized(
        content: &[u8]
    ) -> Option<(i32, u32, u32, u32, u32, u32)> {
        if content.len() != 15 || content[14] != b'Z' {
            return None
        }
        let year = (two_digits(content, 0)? * 100 + two_digits(content, 2)?)
            as i32;
        Some((
            year,
            two_digits(content, 4)?,
            two_digits(content, 6)?,
            two_digits(content, 8)?,
            two_digits(content, 10)?,
            two_digits(content, 12)?,
        ))
    }
}

/// Reads two decimal digits from `content` at `pos`.
fn two_digits(content: &[u8], pos: usize) -> Option<u32> {
    let high = content[pos];
    let low = content[pos + 1];
    if !high.is_ascii_digit() || !low.is_ascii_digit() {
        return None
    }
    Some(u32::from(high - b'0') * 10 + u32::from(low - b'0'))
}


//------------ Helpers -------------------------------------------------------

/// Compares two bit strings.
pub fn cmp_bit_string(left: &BitString, right: &BitString) -> Ordering {
    left.octet_slice().unwrap_or(&[])
        .cmp(right.octet_slice().unwrap_or(&[]))
        .then_with(|| left.unused().cmp(&right.unused()))
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utc_time_windowing() {
        assert_eq!(
            Time::parse_utc(b"490101000000Z").unwrap().0,
            2049
        );
        assert_eq!(
            Time::parse_utc(b"500101000000Z").unwrap().0,
            1950
        );
        assert!(Time::parse_utc(b"49010100000Z").is_none());
        assert!(Time::parse_utc(b"4901010000005").is_none());
    }

    #[test]
    fn generalized_time() {
        let (y, mo, d, h, mi, s)
            = Time::parse_generalized(b"20380119031407Z").unwrap();
        assert_eq!((y, mo, d, h, mi, s), (2038, 1, 19, 3, 14, 7));
        assert!(Time::parse_generalized(b"20380119031407").is_none());
    }

    #[test]
    fn validity_covers_boundaries() {
        let validity = Validity::new(
            Time::from_secs(1000), Time::from_secs(2000)
        );
        assert!(validity.covers(Time::from_secs(1000)));
        assert!(validity.covers(Time::from_secs(2000)));
        assert!(!validity.covers(Time::from_secs(999)));
        assert!(!validity.covers(Time::from_secs(2001)));
    }

    #[test]
    fn serial_order() {
        let one = Serial::new(Bytes::from_static(&[1]));
        let big = Serial::new(Bytes::from_static(&[1, 0]));
        assert!(one < big);
        assert_eq!(one, Serial::new(Bytes::from_static(&[1])));
    }
}

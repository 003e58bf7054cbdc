//! Typed certificate extensions.
//!
//! The certificate model keeps extensions as raw identifier-value pairs;
//! this module decodes the ones the engine understands into typed values
//! and provides the finder functions used by the verification code. Every
//! finder distinguishes "the extension is not there", reported as
//! [`Code::ExtensionNotFound`], from "the extension is there but does not
//! decode", so callers can treat optional extensions as optional without
//! ever accepting a malformed one.

use bcder::{decode, BitString, Captured, Mode, Oid, Tag};
use bcder::decode::{Constructed, Content};
use bytes::Bytes;
use crate::error::{Code, Error};
use crate::name::Name;
use crate::oid;
use crate::x509::{Certificate, Serial};


//------------ Key usage bits ------------------------------------------------

pub const KU_DIGITAL_SIGNATURE: u16 = 1 << 0;
pub const KU_NON_REPUDIATION: u16 = 1 << 1;
pub const KU_KEY_ENCIPHERMENT: u16 = 1 << 2;
pub const KU_DATA_ENCIPHERMENT: u16 = 1 << 3;
pub const KU_KEY_AGREEMENT: u16 = 1 << 4;
pub const KU_KEY_CERT_SIGN: u16 = 1 << 5;
pub const KU_CRL_SIGN: u16 = 1 << 6;
pub const KU_ENCIPHER_ONLY: u16 = 1 << 7;
pub const KU_DECIPHER_ONLY: u16 = 1 << 8;

/// The names of the key usage bits in bit order.
const KU_NAMES: [&str; 9] = [
    "digitalSignature", "nonRepudiation", "keyEncipherment",
    "dataEncipherment", "keyAgreement", "keyCertSign", "cRLSign",
    "encipherOnly", "decipherOnly",
];


//------------ KeyUsage ------------------------------------------------------

/// The decoded key usage extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyUsage(u16);

impl KeyUsage {
    /// Takes a key usage value from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        let bits = BitString::take_from(cons)?;
        let mut flags = 0;
        for i in 0..KU_NAMES.len() {
            if bits.bit(i) {
                flags |= 1 << i;
            }
        }
        Ok(KeyUsage(flags))
    }

    /// Returns the usage bits as a mask.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Returns whether the keyCertSign bit is set.
    pub fn key_cert_sign(self) -> bool {
        self.0 & KU_KEY_CERT_SIGN != 0
    }
}

/// Renders the named bits of a key usage mask for diagnostics.
fn ku_names(mask: u16) -> String {
    let mut res = String::new();
    for (i, name) in KU_NAMES.iter().enumerate() {
        if mask & (1 << i) != 0 {
            if !res.is_empty() {
                res.push(',');
            }
            res.push_str(name);
        }
    }
    res
}


//------------ AuthorityKeyIdentifier ----------------------------------------

/// The decoded authority key identifier extension.
#[derive(Clone, Debug)]
pub struct AuthorityKeyIdentifier {
    /// The key identifier of the issuing key, if present.
    key_identifier: Option<Bytes>,

    /// The names of the issuer of the issuing certificate, if present.
    authority_cert_issuer: Option<Vec<GeneralName>>,

    /// The serial of the issuing certificate, if present.
    authority_cert_serial: Option<Serial>,
}

impl AuthorityKeyIdentifier {
    /// Takes an authority key identifier from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            Ok(AuthorityKeyIdentifier {
                key_identifier: cons.take_opt_primitive_if(
                    Tag::CTX_0, |prim| prim.take_all()
                )?,
                authority_cert_issuer: cons.take_opt_constructed_if(
                    Tag::CTX_1, GeneralName::take_multiple
                )?,
                authority_cert_serial: cons.take_opt_primitive_if(
                    Tag::CTX_2, |prim| {
                        let content = prim.take_all()?;
                        if content.is_empty() {
                            return Err(decode::Malformed.into())
                        }
                        Ok(Serial::new(content))
                    }
                )?,
            })
        })
    }

    /// Returns the key identifier, if present.
    pub fn key_identifier(&self) -> Option<&Bytes> {
        self.key_identifier.as_ref()
    }

    /// Returns the authority certificate issuer names, if present.
    pub fn authority_cert_issuer(&self) -> Option<&[GeneralName]> {
        self.authority_cert_issuer.as_deref()
    }

    /// Returns the authority certificate serial, if present.
    pub fn authority_cert_serial(&self) -> Option<&Serial> {
        self.authority_cert_serial.as_ref()
    }
}


//------------ SubjectKeyIdentifier ------------------------------------------

/// The decoded subject key identifier extension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubjectKeyIdentifier(Bytes);

impl SubjectKeyIdentifier {
    /// Takes a subject key identifier from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_primitive_if(Tag::OCTET_STRING, |prim| {
            prim.take_all().map(SubjectKeyIdentifier)
        })
    }

    /// Returns the key identifier octets.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//------------ BasicConstraints ----------------------------------------------

/// The decoded basic constraints extension.
#[derive(Clone, Copy, Debug)]
pub struct BasicConstraints {
    /// Whether the certificate is a CA certificate.
    ca: bool,

    /// The maximum number of intermediate certificates below this CA.
    path_len_constraint: Option<u32>,
}

impl BasicConstraints {
    /// Takes a basic constraints value from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            Ok(BasicConstraints {
                ca: cons.take_opt_bool()?.unwrap_or(false),
                path_len_constraint: take_opt_u32(cons)?,
            })
        })
    }

    /// Returns whether the cA flag is set.
    pub fn ca(self) -> bool {
        self.ca
    }

    /// Returns the path length constraint, if present.
    pub fn path_len_constraint(self) -> Option<u32> {
        self.path_len_constraint
    }
}


//------------ ExtKeyUsage ---------------------------------------------------

/// The decoded extended key usage extension.
#[derive(Clone, Debug)]
pub struct ExtKeyUsage(Vec<Oid<Bytes>>);

impl ExtKeyUsage {
    /// Takes an extended key usage value from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            let mut purposes = Vec::new();
            while let Some(purpose) = cons.take_opt_primitive_if(
                Tag::OID, |prim| prim.take_all().map(Oid)
            )? {
                purposes.push(purpose)
            }
            if purposes.is_empty() {
                return Err(decode::Malformed.into())
            }
            Ok(ExtKeyUsage(purposes))
        })
    }

    /// Returns the key purposes.
    pub fn purposes(&self) -> &[Oid<Bytes>] {
        &self.0
    }

    /// Returns whether the given purpose is among the listed ones.
    pub fn contains<U: AsRef<[u8]>>(&self, purpose: &Oid<U>) -> bool {
        self.0.iter().any(|item| *item == *purpose)
    }
}


//------------ GeneralName ---------------------------------------------------

/// A single general name.
///
/// Only the alternatives the engine can act upon are modeled. The x400 and
/// EDI party forms fail to decode; name constraint evaluation additionally
/// rejects the URI, IP address and registered identifier forms.
#[derive(Clone, Debug)]
pub enum GeneralName {
    /// An otherName: a type identifier with an opaque value.
    OtherName {
        type_id: Oid<Bytes>,
        value: Captured,
    },

    /// An rfc822Name, i.e., an email address.
    Rfc822Name(String),

    /// A dNSName.
    DnsName(String),

    /// A directoryName.
    DirectoryName(Name),

    /// A uniformResourceIdentifier.
    Uri(String),

    /// An iPAddress, kept as its raw address octets.
    IpAddress(Bytes),

    /// A registeredID.
    RegisteredId(Oid<Bytes>),
}

impl GeneralName {
    /// Takes an optional general name from a constructed value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_value(|tag, content| Self::from_content(tag, content))
    }

    /// Takes general names until the end of a constructed value.
    pub fn take_multiple<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Vec<Self>, S::Err> {
        let mut names = Vec::new();
        while let Some(name) = Self::take_opt_from(cons)? {
            names.push(name)
        }
        Ok(names)
    }

    /// Builds a general name from a tagged content value.
    fn from_content<S: decode::Source>(
        tag: Tag, content: &mut Content<S>
    ) -> Result<Self, S::Err> {
        if tag == Tag::CTX_0 {
            let cons = content.as_constructed()?;
            let type_id = Oid::take_from(cons)?;
            let value = cons.take_constructed_if(
                Tag::CTX_0, |cons| cons.capture_all()
            )?;
            Ok(GeneralName::OtherName { type_id, value })
        }
        else if tag == Tag::CTX_1 {
            take_string(content).map(GeneralName::Rfc822Name)
        }
        else if tag == Tag::CTX_2 {
            take_string(content).map(GeneralName::DnsName)
        }
        else if tag == Tag::CTX_4 {
            let cons = content.as_constructed()?;
            Name::take_from(cons).map(GeneralName::DirectoryName)
        }
        else if tag == Tag::CTX_6 {
            take_string(content).map(GeneralName::Uri)
        }
        else if tag == Tag::ctx(7) {
            content.as_primitive()?.take_all().map(GeneralName::IpAddress)
        }
        else if tag == Tag::ctx(8) {
            content.as_primitive()?.take_all()
                .map(|bytes| GeneralName::RegisteredId(Oid(bytes)))
        }
        else {
            Err(decode::Malformed.into())
        }
    }

    /// Returns whether two names use the same alternative.
    pub fn same_variant(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Takes the content of an IA5String-shaped primitive as a string.
fn take_string<S: decode::Source>(
    content: &mut Content<S>
) -> Result<String, S::Err> {
    let bytes = content.as_primitive()?.take_all()?;
    String::from_utf8(bytes.as_ref().to_vec())
        .map_err(|_| decode::Malformed.into())
}


//------------ NameConstraints -----------------------------------------------

/// The decoded name constraints extension.
#[derive(Clone, Debug)]
pub struct NameConstraints {
    /// The permitted subtrees, if present.
    permitted: Option<Vec<GeneralSubtree>>,

    /// The excluded subtrees, if present.
    excluded: Option<Vec<GeneralSubtree>>,
}

impl NameConstraints {
    /// Takes a name constraints value from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            Ok(NameConstraints {
                permitted: cons.take_opt_constructed_if(
                    Tag::CTX_0, GeneralSubtree::take_multiple
                )?,
                excluded: cons.take_opt_constructed_if(
                    Tag::CTX_1, GeneralSubtree::take_multiple
                )?,
            })
        })
    }

    /// Returns the permitted subtrees, if present.
    pub fn permitted(&self) -> Option<&[GeneralSubtree]> {
        self.permitted.as_deref()
    }

    /// Returns the excluded subtrees, if present.
    pub fn excluded(&self) -> Option<&[GeneralSubtree]> {
        self.excluded.as_deref()
    }
}


//------------ GeneralSubtree ------------------------------------------------

/// A single subtree of a name constraint.
#[derive(Clone, Debug)]
pub struct GeneralSubtree {
    /// The base name of the subtree.
    base: GeneralName,

    /// The minimum distance. Zero in every certificate seen in practice.
    minimum: u32,

    /// The maximum distance. Absent in every certificate seen in practice.
    maximum: Option<u32>,
}

impl GeneralSubtree {
    /// Takes an optional subtree from a constructed value.
    pub fn take_opt_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<Self>, S::Err> {
        cons.take_opt_sequence(|cons| {
            let base = match GeneralName::take_opt_from(cons)? {
                Some(base) => base,
                None => return Err(decode::Malformed.into())
            };
            let minimum = cons.take_opt_primitive_if(
                Tag::CTX_0, |prim| {
                    let content = prim.take_all()?;
                    parse_u32(content.as_ref())
                        .ok_or_else(|| decode::Malformed.into())
                }
            )?.unwrap_or(0);
            let maximum = cons.take_opt_primitive_if(
                Tag::CTX_1, |prim| {
                    let content = prim.take_all()?;
                    parse_u32(content.as_ref())
                        .ok_or_else(|| decode::Malformed.into())
                }
            )?;
            Ok(GeneralSubtree { base, minimum, maximum })
        })
    }

    /// Takes subtrees until the end of a constructed value.
    pub fn take_multiple<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Vec<Self>, S::Err> {
        let mut subtrees = Vec::new();
        while let Some(subtree) = Self::take_opt_from(cons)? {
            subtrees.push(subtree)
        }
        Ok(subtrees)
    }

    /// Returns the base name.
    pub fn base(&self) -> &GeneralName {
        &self.base
    }

    /// Returns the minimum distance.
    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    /// Returns the maximum distance, if present.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }
}


//------------ ProxyCertInfo -------------------------------------------------

/// The decoded proxy certificate information extension.
#[derive(Clone, Debug)]
pub struct ProxyCertInfo {
    /// The maximum number of proxy certificates below this one.
    path_len_constraint: Option<u32>,

    /// The policy language identifier.
    policy_language: Oid<Bytes>,

    /// The policy itself, opaque to the engine.
    policy: Option<Bytes>,
}

impl ProxyCertInfo {
    /// Takes a proxy certificate info value from a constructed value.
    pub fn take_from<S: decode::Source>(
        cons: &mut Constructed<S>
    ) -> Result<Self, S::Err> {
        cons.take_sequence(|cons| {
            let path_len_constraint = take_opt_u32(cons)?;
            let (policy_language, policy) = cons.take_sequence(|cons| {
                let language = Oid::take_from(cons)?;
                let policy = cons.take_opt_primitive_if(
                    Tag::OCTET_STRING, |prim| prim.take_all()
                )?;
                Ok((language, policy))
            })?;
            Ok(ProxyCertInfo { path_len_constraint, policy_language, policy })
        })
    }

    /// Returns the proxy path length constraint, if present.
    pub fn path_len_constraint(&self) -> Option<u32> {
        self.path_len_constraint
    }

    /// Returns the policy language identifier.
    pub fn policy_language(&self) -> &Oid<Bytes> {
        &self.policy_language
    }

    /// Returns the raw policy, if present.
    pub fn policy(&self) -> Option<&Bytes> {
        self.policy.as_ref()
    }
}


//------------ Finder functions ----------------------------------------------

/// Finds and decodes the authority key identifier of a certificate.
pub fn find_authority_key_id(
    cert: &Certificate
) -> Result<AuthorityKeyIdentifier, Error> {
    decode_extension(
        cert, &oid::CE_AUTHORITY_KEY_IDENTIFIER,
        AuthorityKeyIdentifier::take_from
    )
}

/// Finds and decodes the subject key identifier of a certificate.
pub fn find_subject_key_id(
    cert: &Certificate
) -> Result<SubjectKeyIdentifier, Error> {
    decode_extension(
        cert, &oid::CE_SUBJECT_KEY_IDENTIFIER,
        SubjectKeyIdentifier::take_from
    )
}

/// Finds and decodes the basic constraints of a certificate.
pub fn find_basic_constraints(
    cert: &Certificate
) -> Result<BasicConstraints, Error> {
    decode_extension(
        cert, &oid::CE_BASIC_CONSTRAINTS, BasicConstraints::take_from
    )
}

/// Finds and decodes the name constraints of a certificate.
pub fn find_name_constraints(
    cert: &Certificate
) -> Result<NameConstraints, Error> {
    decode_extension(
        cert, &oid::CE_NAME_CONSTRAINTS, NameConstraints::take_from
    )
}

/// Finds and decodes the extended key usage of a certificate.
pub fn find_ext_key_usage(cert: &Certificate) -> Result<ExtKeyUsage, Error> {
    decode_extension(cert, &oid::CE_EXT_KEY_USAGE, ExtKeyUsage::take_from)
}

/// Finds and decodes the key usage of a certificate.
pub fn find_key_usage(cert: &Certificate) -> Result<KeyUsage, Error> {
    decode_extension(cert, &oid::CE_KEY_USAGE, KeyUsage::take_from)
}

/// Finds and decodes a subject alternative name extension.
///
/// The scan starts at `cursor` which is advanced past the match, so
/// repeated calls walk all subject alternative name extensions of a
/// certificate. Returns [`Code::ExtensionNotFound`] when the scan is
/// exhausted.
pub fn find_subject_alt_name(
    cert: &Certificate, cursor: &mut usize
) -> Result<Vec<GeneralName>, Error> {
    let ext = match cert.find_extension(
        &oid::CE_SUBJECT_ALT_NAME, cursor
    ) {
        Some(ext) => ext,
        None => return Err(Error::from(Code::ExtensionNotFound))
    };
    Mode::Der.decode(ext.value().to_bytes(), |cons| {
        cons.take_sequence(GeneralName::take_multiple)
    }).map_err(Into::into)
}

/// Finds and decodes the proxy certificate information of a certificate.
///
/// Trailing octets after the decoded structure are an error of their own
/// kind since they historically indicated hand-assembled extensions.
pub fn find_proxy_cert_info(
    cert: &Certificate
) -> Result<ProxyCertInfo, Error> {
    let mut cursor = 0;
    let ext = match cert.find_extension(
        &oid::PE_PROXY_CERT_INFO, &mut cursor
    ) {
        Some(ext) => ext,
        None => return Err(Error::from(Code::ExtensionNotFound))
    };
    let (raw, trailing) = Mode::Der.decode(ext.value().to_bytes(), |cons| {
        let raw = cons.capture_one()?;
        let trailing = cons.capture_all()?;
        Ok((raw, trailing))
    })?;
    if !AsRef::<[u8]>::as_ref(&trailing).is_empty() {
        return Err(Error::from(Code::ExtraDataAfterStructure))
    }
    raw.decode(|cons| ProxyCertInfo::take_from(cons)).map_err(Into::into)
}

/// Checks that a certificate carries the given key usage bits.
///
/// Certificates below version 3 pass unconditionally. A missing key usage
/// extension passes unless `required` is set.
pub fn check_key_usage(
    cert: &Certificate, flags: u16, required: bool
) -> Result<(), Error> {
    if cert.version() < 3 {
        return Ok(())
    }
    let usage = match find_key_usage(cert) {
        Ok(usage) => usage,
        Err(err) => {
            if err.code() != Code::ExtensionNotFound {
                return Err(err)
            }
            if required {
                return Err(Error::new(
                    Code::KeyUsageMissing,
                    "Required extension key usage missing from certificate"
                ))
            }
            return Ok(())
        }
    };
    if usage.bits() & flags != flags {
        let missing = !usage.bits() & flags;
        return Err(Error::new(
            Code::KeyUsageMissing,
            format!(
                "Key usage {} required but missing from certificate {}",
                ku_names(missing), cert.subject()
            )
        ))
    }
    Ok(())
}


//------------ Helpers -------------------------------------------------------

/// Finds an extension and decodes its value with the given function.
fn decode_extension<T, F>(
    cert: &Certificate, id: &Oid<&'static [u8]>, op: F
) -> Result<T, Error>
where F: FnOnce(&mut Constructed<Bytes>) -> Result<T, decode::Error> {
    let mut cursor = 0;
    let ext = match cert.find_extension(id, &mut cursor) {
        Some(ext) => ext,
        None => return Err(Error::from(Code::ExtensionNotFound))
    };
    Mode::Der.decode(ext.value().to_bytes(), op).map_err(Into::into)
}

/// Takes an optional INTEGER as a u32 from a constructed value.
fn take_opt_u32<S: decode::Source>(
    cons: &mut Constructed<S>
) -> Result<Option<u32>, S::Err> {
    cons.take_opt_primitive_if(Tag::INTEGER, |prim| {
        let content = prim.take_all()?;
        parse_u32(content.as_ref()).ok_or_else(|| decode::Malformed.into())
    })
}

/// Parses the content octets of a non-negative INTEGER fitting a u32.
fn parse_u32(content: &[u8]) -> Option<u32> {
    if content.is_empty() || content[0] & 0x80 != 0 {
        return None
    }
    let content = if content[0] == 0 { &content[1..] } else { content };
    if content.len() > 4 {
        return None
    }
    let mut res = 0u32;
    for &octet in content {
        res = (res << 8) | u32::from(octet);
    }
    Some(res)
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::test;

    #[test]
    fn parse_u32_content() {
        assert_eq!(parse_u32(&[0]), Some(0));
        assert_eq!(parse_u32(&[5]), Some(5));
        assert_eq!(parse_u32(&[1, 0]), Some(256));
        assert_eq!(parse_u32(&[0, 0xff]), Some(255));
        assert_eq!(parse_u32(&[0x80]), None);
        assert_eq!(parse_u32(&[]), None);
        assert_eq!(parse_u32(&[1, 0, 0, 0, 0]), None);
    }

    #[test]
    fn basic_constraints_of_ca() {
        let ca = test::ca_cert("Alpha CA");
        let bc = find_basic_constraints(ca.certificate()).unwrap();
        assert!(bc.ca());
        assert_eq!(bc.path_len_constraint(), None);
    }

    #[test]
    fn key_usage_of_ca() {
        let ca = test::ca_cert("Alpha CA");
        let usage = find_key_usage(ca.certificate()).unwrap();
        assert!(usage.key_cert_sign());
        assert!(
            check_key_usage(
                ca.certificate(), KU_KEY_CERT_SIGN, true
            ).is_ok()
        );
        assert_eq!(
            check_key_usage(
                ca.certificate(),
                KU_KEY_CERT_SIGN | KU_DATA_ENCIPHERMENT, true
            ).unwrap_err().code(),
            Code::KeyUsageMissing
        );
    }

    #[test]
    fn missing_extension_is_distinguishable() {
        let ca = test::ca_cert("Alpha CA");
        assert_eq!(
            find_proxy_cert_info(ca.certificate()).unwrap_err().code(),
            Code::ExtensionNotFound
        );
        assert_eq!(
            find_name_constraints(ca.certificate()).unwrap_err().code(),
            Code::ExtensionNotFound
        );
    }

    #[test]
    fn aki_and_ski_link() {
        let (ca, leaf) = test::ca_and_leaf();
        let ski = find_subject_key_id(ca.certificate()).unwrap();
        let aki = find_authority_key_id(leaf.certificate()).unwrap();
        assert_eq!(
            aki.key_identifier().unwrap().as_ref(), ski.as_slice()
        );
    }

    #[test]
    fn subject_alt_name_walk() {
        let cert = test::leaf_with_dns_san("host.example");
        let mut cursor = 0;
        let names
            = find_subject_alt_name(cert.certificate(), &mut cursor)
                .unwrap();
        assert_eq!(names.len(), 1);
        match names[0] {
            GeneralName::DnsName(ref name) => {
                assert_eq!(name, "host.example")
            }
            _ => panic!("expected dNSName")
        }
        assert_eq!(
            find_subject_alt_name(cert.certificate(), &mut cursor)
                .unwrap_err().code(),
            Code::ExtensionNotFound
        );
    }
}

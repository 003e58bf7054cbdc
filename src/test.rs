#![cfg(test)]
//! Certificate fixtures for testing.
//!
//! The fixtures are real DER certificates assembled with bcder's encoders
//! and signed with fresh Ed25519 keys, then pushed through the crate's own
//! decoder. This keeps every test honest: whatever a test observes went
//! through the same decoding path production data takes, and the signature
//! verification stage runs against genuine signatures.

use std::io;
use bcder::{encode, BitString, Captured, Mode, Oid, Tag};
use bcder::encode::{Constructed, PrimitiveContent, Values};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use crate::cert::Cert;
use crate::ext::{KU_DIGITAL_SIGNATURE, KU_CRL_SIGN, KU_KEY_CERT_SIGN};
use crate::oid;
use crate::oid::ConstOid;
use crate::x509::Time;


//------------ Validity window -----------------------------------------------

/// The notBefore of all fixture certificates.
const NOT_BEFORE: i64 = 1_500_000_000;

/// The notAfter of all fixture certificates.
const NOT_AFTER: i64 = 2_500_000_000;

/// A time inside the fixture validity window.
pub fn in_window() -> Time {
    Time::from_secs(2_000_000_000)
}

/// A time before the fixture validity window.
pub fn before_window() -> Time {
    Time::from_secs(1_400_000_000)
}

/// A time after the fixture validity window.
pub fn after_window() -> Time {
    Time::from_secs(2_600_000_000)
}


//------------ Key -----------------------------------------------------------

/// A fixture signing key.
pub struct Key(Ed25519KeyPair);

impl Key {
    /// Generates a fresh key.
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        Key(Ed25519KeyPair::from_pkcs8(doc.as_ref()).unwrap())
    }

    /// Returns the raw public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.0.public_key().as_ref().to_vec()
    }

    /// Returns the SHA-1 key identifier of the public key.
    pub fn key_id(&self) -> Vec<u8> {
        digest::digest(
            &digest::SHA1_FOR_LEGACY_USE_ONLY, &self.public_key()
        ).as_ref().to_vec()
    }

    /// Signs data with the key.
    fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.0.sign(data).as_ref().to_vec()
    }
}


//------------ Primitive encoders --------------------------------------------

/// Raw content octets under a caller-chosen tag.
struct Blob<'a>(&'a [u8]);

impl<'a> PrimitiveContent for Blob<'a> {
    const TAG: Tag = Tag::OCTET_STRING;

    fn encoded_len(&self, _: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.0)
    }
}

/// A BOOLEAN.
struct Flag(bool);

impl PrimitiveContent for Flag {
    const TAG: Tag = Tag::BOOLEAN;

    fn encoded_len(&self, _: Mode) -> usize {
        1
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&[if self.0 { 0xff } else { 0 }])
    }
}

/// A non-negative INTEGER in minimal encoding.
struct Uint(Vec<u8>);

fn uint(value: u64) -> Uint {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 && bytes[start] == 0 {
        start += 1
    }
    let mut content = bytes[start..].to_vec();
    if content[0] & 0x80 != 0 {
        content.insert(0, 0)
    }
    Uint(content)
}

impl PrimitiveContent for Uint {
    const TAG: Tag = Tag::INTEGER;

    fn encoded_len(&self, _: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&self.0)
    }
}

/// A GeneralizedTime.
struct TimeStamp(String);

fn timestamp(secs: i64) -> TimeStamp {
    TimeStamp(
        Utc.timestamp(secs, 0).format("%Y%m%d%H%M%SZ").to_string()
    )
}

impl PrimitiveContent for TimeStamp {
    const TAG: Tag = Tag::GENERALIZED_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        self.0.len()
    }

    fn write_encoded<W: io::Write>(
        &self, _: Mode, target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.0.as_bytes())
    }
}


//------------ Names ---------------------------------------------------------

fn attr_oid(short: &str) -> ConstOid {
    match short {
        "CN" => oid::AT_COMMON_NAME,
        "C" => oid::AT_COUNTRY_NAME,
        "O" => oid::AT_ORGANIZATION_NAME,
        "OU" => oid::AT_ORGANIZATIONAL_UNIT_NAME,
        _ => panic!("unknown attribute {}", short),
    }
}

/// Encodes a name from attribute pairs, one RDN per pair.
pub fn name(atvs: &[(&str, &str)]) -> Captured {
    let rdns: Vec<Captured> = atvs.iter().map(|&(ty, value)| {
        Captured::from_values(Mode::Der, encode::set(
            encode::sequence((
                attr_oid(ty).encode(),
                Blob(value.as_bytes()).encode_as(Tag::UTF8_STRING),
            ))
        ))
    }).collect();
    Captured::from_values(
        Mode::Der, encode::sequence(encode::iter(rdns.iter()))
    )
}

/// Encodes a single-CN name carried as a PrintableString.
pub fn printable_name(value: &str) -> Captured {
    Captured::from_values(Mode::Der, encode::sequence(
        encode::set(encode::sequence((
            oid::AT_COMMON_NAME.encode(),
            Blob(value.as_bytes()).encode_as(Tag::PRINTABLE_STRING),
        )))
    ))
}

/// Encodes the null name.
pub fn empty_name() -> Captured {
    let none: Option<&Captured> = None;
    Captured::from_values(Mode::Der, encode::sequence(none))
}


//------------ Extension values ----------------------------------------------

fn extension(id: ConstOid, critical: bool, content: Captured) -> Captured {
    let critical = if critical { Some(Flag(true).encode()) } else { None };
    Captured::from_values(Mode::Der, encode::sequence((
        id.encode(),
        critical,
        Blob(content.as_ref()).encode(),
    )))
}

fn basic_constraints_ext(ca: bool, path_len: Option<u32>) -> Captured {
    let ca = if ca { Some(Flag(true).encode()) } else { None };
    let path_len = path_len.map(|value| uint(value.into()).encode());
    extension(
        oid::CE_BASIC_CONSTRAINTS, true,
        Captured::from_values(Mode::Der, encode::sequence((ca, path_len)))
    )
}

fn key_usage_ext(bits: u16) -> Captured {
    let mut data = [0u8; 2];
    let mut highest = 0;
    for n in 0..9 {
        if bits & (1 << n) != 0 {
            data[n / 8] |= 0x80 >> (n % 8);
            highest = n;
        }
    }
    let len = highest / 8 + 1;
    let unused = (len * 8 - (highest + 1)) as u8;
    extension(
        oid::CE_KEY_USAGE, true,
        Captured::from_values(
            Mode::Der,
            BitString::new(
                unused, Bytes::copy_from_slice(&data[..len])
            ).encode()
        )
    )
}

fn ski_ext(key_id: &[u8]) -> Captured {
    extension(
        oid::CE_SUBJECT_KEY_IDENTIFIER, false,
        Captured::from_values(Mode::Der, Blob(key_id).encode())
    )
}

fn aki_ext(key_id: &[u8]) -> Captured {
    extension(
        oid::CE_AUTHORITY_KEY_IDENTIFIER, false,
        Captured::from_values(Mode::Der, encode::sequence(
            Blob(key_id).encode_as(Tag::CTX_0)
        ))
    )
}

fn san_dns_ext(names: &[&str]) -> Captured {
    let entries: Vec<Captured> = names.iter().map(|name| {
        Captured::from_values(
            Mode::Der, Blob(name.as_bytes()).encode_as(Tag::CTX_2)
        )
    }).collect();
    extension(
        oid::CE_SUBJECT_ALT_NAME, false,
        Captured::from_values(
            Mode::Der, encode::sequence(encode::iter(entries.iter()))
        )
    )
}

fn name_constraints_ext(
    permitted_dns: &[&str], excluded_dns: &[&str]
) -> Captured {
    fn subtrees(names: &[&str], tag: Tag) -> Option<Captured> {
        if names.is_empty() {
            return None
        }
        let items: Vec<Captured> = names.iter().map(|name| {
            Captured::from_values(Mode::Der, encode::sequence(
                Blob(name.as_bytes()).encode_as(Tag::CTX_2)
            ))
        }).collect();
        Some(Captured::from_values(
            Mode::Der,
            encode::sequence_as(tag, encode::iter(items.iter()))
        ))
    }
    let permitted = subtrees(permitted_dns, Tag::CTX_0);
    let excluded = subtrees(excluded_dns, Tag::CTX_1);
    extension(
        oid::CE_NAME_CONSTRAINTS, true,
        Captured::from_values(
            Mode::Der, encode::sequence((permitted, excluded))
        )
    )
}

/// 1.3.6.1.5.5.7.21.1: id-ppl-inheritAll.
const PL_INHERIT_ALL: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 21, 1]);

fn proxy_info_ext(path_len: Option<u32>) -> Captured {
    let path_len = path_len.map(|value| uint(value.into()).encode());
    extension(
        oid::PE_PROXY_CERT_INFO, true,
        Captured::from_values(Mode::Der, encode::sequence((
            path_len,
            encode::sequence(PL_INHERIT_ALL.encode()),
        )))
    )
}


//------------ CertSpec ------------------------------------------------------

/// The recipe for one fixture certificate.
pub struct CertSpec {
    pub subject: Captured,
    pub issuer: Captured,
    pub serial: u64,
    pub not_before: i64,
    pub not_after: i64,
    pub extensions: Vec<Captured>,
}

impl CertSpec {
    /// Starts a recipe with the default validity window.
    pub fn new(subject: Captured, issuer: Captured, serial: u64) -> Self {
        CertSpec {
            subject, issuer, serial,
            not_before: NOT_BEFORE,
            not_after: NOT_AFTER,
            extensions: Vec::new(),
        }
    }

    /// Appends an encoded extension.
    pub fn push_ext(&mut self, ext: Captured) {
        self.extensions.push(ext)
    }

    /// Builds the certificate, signing with `issuer_key`.
    pub fn build(&self, subject_key: &Key, issuer_key: &Key) -> Cert {
        let extensions = if self.extensions.is_empty() {
            None
        }
        else {
            Some(Constructed::new(
                Tag::CTX_3,
                encode::sequence(encode::iter(self.extensions.iter()))
            ))
        };
        let tbs = Captured::from_values(Mode::Der, encode::sequence((
            (
                Constructed::new(Tag::CTX_0, uint(2).encode()),
                uint(self.serial).encode(),
                alg_ed25519(),
                &self.issuer,
            ),
            (
                encode::sequence((
                    timestamp(self.not_before).encode(),
                    timestamp(self.not_after).encode(),
                )),
                &self.subject,
                spki(subject_key),
                extensions,
            ),
        )));
        let sig = issuer_key.sign(tbs.as_ref());
        let mut der = Vec::new();
        encode::sequence((
            &tbs,
            alg_ed25519(),
            BitString::new(0, Bytes::from(sig)).encode(),
        )).write_encoded(Mode::Der, &mut der).unwrap();
        Cert::decode(Bytes::from(der)).unwrap()
    }
}

fn alg_ed25519() -> impl Values {
    encode::sequence(oid::ED25519.encode())
}

fn spki(key: &Key) -> Captured {
    Captured::from_values(Mode::Der, encode::sequence((
        encode::sequence(oid::ED25519.encode()),
        BitString::new(0, Bytes::from(key.public_key())).encode(),
    )))
}


//------------ Fixtures ------------------------------------------------------

fn ca_with_key(cn: &str) -> (Cert, Key) {
    let key = Key::generate();
    let subject = name(&[("CN", cn)]);
    let mut spec = CertSpec::new(subject.clone(), subject, 1);
    spec.push_ext(basic_constraints_ext(true, None));
    spec.push_ext(key_usage_ext(KU_KEY_CERT_SIGN | KU_CRL_SIGN));
    spec.push_ext(ski_ext(&key.key_id()));
    let cert = spec.build(&key, &key);
    (cert, key)
}

/// A self-signed CA certificate with the given common name.
pub fn ca_cert(cn: &str) -> Cert {
    ca_with_key(cn).0
}

/// A CA and a leaf certificate issued by it.
pub fn ca_and_leaf() -> (Cert, Cert) {
    let (ca, ca_key) = ca_with_key("Alpha CA");
    let leaf_key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("CN", "Leaf")]), name(&[("CN", "Alpha CA")]), 2
    );
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(ski_ext(&leaf_key.key_id()));
    spec.push_ext(aki_ext(&ca_key.key_id()));
    let leaf = spec.build(&leaf_key, &ca_key);
    (ca, leaf)
}


//------------ Chain ---------------------------------------------------------

/// A three-certificate chain: root, intermediate, leaf.
pub struct Chain {
    pub anchor: Cert,
    pub inter: Cert,
    pub leaf: Cert,
    pub anchor_key: Key,
    pub inter_key: Key,
    pub leaf_key: Key,
}

/// Builds a root CA, an intermediate CA and a leaf below them.
pub fn chain3() -> Chain {
    let (anchor, anchor_key) = ca_with_key("Root CA");

    let inter_key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("CN", "Intermediate CA")]), name(&[("CN", "Root CA")]), 10
    );
    spec.push_ext(basic_constraints_ext(true, None));
    spec.push_ext(key_usage_ext(KU_KEY_CERT_SIGN));
    spec.push_ext(ski_ext(&inter_key.key_id()));
    spec.push_ext(aki_ext(&anchor_key.key_id()));
    let inter = spec.build(&inter_key, &anchor_key);

    let leaf_key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("CN", "Leaf")]), name(&[("CN", "Intermediate CA")]), 11
    );
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(ski_ext(&leaf_key.key_id()));
    spec.push_ext(aki_ext(&inter_key.key_id()));
    let leaf = spec.build(&leaf_key, &inter_key);

    Chain { anchor, inter, leaf, anchor_key, inter_key, leaf_key }
}

/// A leaf certificate with a dNSName subject alternative name.
pub fn leaf_with_dns_san(dns: &str) -> Cert {
    let (_, ca_key) = ca_with_key("SAN CA");
    let key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("CN", "Host")]), name(&[("CN", "SAN CA")]), 20
    );
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(san_dns_ext(&[dns]));
    spec.build(&key, &ca_key)
}

/// An anchor excluding a DNS subtree and a leaf with a dNSName below it.
pub fn constrained_chain(
    excluded_dns: &str, leaf_dns: &str
) -> (Cert, Cert) {
    let anchor_key = Key::generate();
    let anchor_name = name(&[("CN", "Constrained Root")]);
    let mut spec = CertSpec::new(anchor_name.clone(), anchor_name, 1);
    spec.push_ext(basic_constraints_ext(true, None));
    spec.push_ext(key_usage_ext(KU_KEY_CERT_SIGN));
    spec.push_ext(ski_ext(&anchor_key.key_id()));
    spec.push_ext(name_constraints_ext(&[], &[excluded_dns]));
    let anchor = spec.build(&anchor_key, &anchor_key);

    let leaf_key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("CN", "Constrained Leaf")]),
        name(&[("CN", "Constrained Root")]),
        2
    );
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(ski_ext(&leaf_key.key_id()));
    spec.push_ext(aki_ext(&anchor_key.key_id()));
    spec.push_ext(san_dns_ext(&[leaf_dns]));
    let leaf = spec.build(&leaf_key, &anchor_key);

    (anchor, leaf)
}

/// A leaf with an empty subject and no authority key identifier.
pub fn subjectless_leaf_without_aki(chain: &Chain) -> Cert {
    let key = Key::generate();
    let mut spec = CertSpec::new(
        empty_name(), name(&[("CN", "Intermediate CA")]), 40
    );
    spec.push_ext(san_dns_ext(&["anon.example"]));
    spec.build(&key, &chain.inter_key)
}


//------------ Proxy chains --------------------------------------------------

/// An anchor, an end entity below it, and a proxy derived from the
/// end entity.
pub struct ProxyChain {
    pub anchor: Cert,
    pub ee: Cert,
    pub proxy: Cert,
}

/// Like [`ProxyChain`] with a second proxy derived from the first.
pub struct ProxyChain2 {
    pub anchor: Cert,
    pub ee: Cert,
    pub proxy: Cert,
    pub proxy2: Cert,
}

fn ee_under_anchor() -> (Cert, Cert, Key) {
    let (anchor, anchor_key) = ca_with_key("Proxy Root");
    let ee_key = Key::generate();
    let mut spec = CertSpec::new(
        name(&[("O", "Example"), ("CN", "EE")]),
        name(&[("CN", "Proxy Root")]),
        30
    );
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(ski_ext(&ee_key.key_id()));
    spec.push_ext(aki_ext(&anchor_key.key_id()));
    let ee = spec.build(&ee_key, &anchor_key);
    (anchor, ee, ee_key)
}

fn proxy_under(
    base: &[(&str, &str)],
    cn: &str,
    serial: u64,
    path_len: Option<u32>,
    issuer_key: &Key,
) -> (Cert, Key) {
    let key = Key::generate();
    let mut subject = base.to_vec();
    subject.push(("CN", cn));
    let mut spec = CertSpec::new(name(&subject), name(base), serial);
    spec.push_ext(proxy_info_ext(path_len));
    spec.push_ext(key_usage_ext(KU_DIGITAL_SIGNATURE));
    spec.push_ext(ski_ext(&key.key_id()));
    spec.push_ext(aki_ext(&issuer_key.key_id()));
    let cert = spec.build(&key, issuer_key);
    (cert, key)
}

/// Builds an anchor, an end entity and one proxy certificate.
pub fn proxy_chain() -> ProxyChain {
    let (anchor, ee, ee_key) = ee_under_anchor();
    let (proxy, _) = proxy_under(
        &[("O", "Example"), ("CN", "EE")], "proxy", 31, None, &ee_key
    );
    ProxyChain { anchor, ee, proxy }
}

/// Builds a two-proxy chain; the first proxy carries the given proxy
/// path length constraint.
pub fn proxy_chain_two(path_len: Option<u32>) -> ProxyChain2 {
    let (anchor, ee, ee_key) = ee_under_anchor();
    let (proxy, proxy_key) = proxy_under(
        &[("O", "Example"), ("CN", "EE")], "proxy", 31, path_len, &ee_key
    );
    let (proxy2, _) = proxy_under(
        &[("O", "Example"), ("CN", "EE"), ("CN", "proxy")], "p2", 32,
        None, &proxy_key
    );
    ProxyChain2 { anchor, ee, proxy, proxy2 }
}

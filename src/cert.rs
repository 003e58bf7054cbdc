//! Certificate handles.
//!
//! A [`Cert`] wraps a decoded [`Certificate`] together with the side data
//! the engine keeps about it: a friendly name, a small list of typed
//! attributes, an optional private key handle and the cached base name
//! produced by proxy canonicalization. Handles share the underlying data;
//! cloning a handle is the reference operation, dropping the last handle
//! releases everything. A release callback can be attached and runs exactly
//! once, before the decoded certificate itself goes away.
//!
//! The module also provides [`is_parent_cmp`], the issuer linkage test the
//! path builder and the stores rely on.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex};
use bcder::{decode, Mode, Oid};
use bytes::Bytes;
use crate::error::{Code, Error};
use crate::ext;
use crate::ext::{ExtKeyUsage, GeneralName, KeyUsage};
use crate::name::Name;
use crate::oid;
use crate::x509::{
    AlgorithmIdentifier, Certificate, Serial, SubjectPublicKeyInfo, Time,
    Validity,
};


//------------ ReleaseFn -----------------------------------------------------

/// A callback run when the last handle to a certificate is dropped.
pub type ReleaseFn = Box<dyn FnOnce(&Certificate) + Send>;


//------------ Cert ----------------------------------------------------------

/// A shared handle to a certificate.
///
/// Cloning the handle is cheap and shares the underlying certificate and
/// its side data. The side data can be modified through a shared handle;
/// the decoded certificate itself is immutable.
#[derive(Clone)]
pub struct Cert {
    data: Arc<CertData>,
}

impl Cert {
    /// Creates a fresh handle for a decoded certificate.
    pub fn new(cert: Certificate) -> Self {
        Cert {
            data: Arc::new(CertData {
                cert,
                side: Mutex::new(SideData::default()),
            })
        }
    }

    /// Decodes a certificate and wraps it into a handle.
    pub fn decode<S: decode::Source>(source: S) -> Result<Self, S::Err> {
        Certificate::decode(source).map(Self::new)
    }

    /// Returns the decoded certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.data.cert
    }

    /// Returns the subject name.
    pub fn subject(&self) -> &Name {
        self.data.cert.subject()
    }

    /// Returns the issuer name.
    pub fn issuer(&self) -> &Name {
        self.data.cert.issuer()
    }

    /// Returns the serial number.
    pub fn serial(&self) -> &Serial {
        self.data.cert.serial()
    }

    /// Returns the validity period.
    pub fn validity(&self) -> &Validity {
        self.data.cert.validity()
    }

    /// Returns the beginning of the validity period.
    pub fn not_before(&self) -> Time {
        self.data.cert.validity().not_before()
    }

    /// Returns the end of the validity period.
    pub fn not_after(&self) -> Time {
        self.data.cert.validity().not_after()
    }

    /// Returns the subject public key info.
    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfo {
        self.data.cert.subject_public_key_info()
    }

    /// Returns the signature algorithm.
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        self.data.cert.signature_algorithm()
    }

    /// Returns the version of the certificate.
    pub fn version(&self) -> u8 {
        self.data.cert.version()
    }

    /// Returns a copy of the DER encoding of the certificate.
    pub fn to_bytes(&self) -> Bytes {
        self.data.cert.to_bytes()
    }

    /// Returns whether the certificate is self-signed.
    ///
    /// A certificate counts as self-signed when it is a plausible issuer
    /// of itself.
    pub fn is_self_signed(&self) -> bool {
        is_parent_cmp(&self.data.cert, &self.data.cert, true)
            == Ordering::Equal
    }

    /// Attaches a release callback.
    ///
    /// The callback runs exactly once, when the last handle is dropped and
    /// before the decoded certificate is released.
    pub fn set_release(&self, release: ReleaseFn) {
        self.data.side.lock().unwrap().release = Some(release);
    }
}

/// # Side data
impl Cert {
    /// Sets the friendly name.
    pub fn set_friendly_name(&self, name: &str) {
        self.data.side.lock().unwrap().friendly_name
            = Some(name.into());
    }

    /// Returns the friendly name of the certificate.
    ///
    /// If no name was set explicitly, falls back to the PKCS#9
    /// friendlyName attribute if the certificate carries one. The decoded
    /// name is cached. Returns `None` when neither source yields a name.
    pub fn friendly_name(&self) -> Option<String> {
        let mut side = self.data.side.lock().unwrap();
        if let Some(ref name) = side.friendly_name {
            return Some(name.clone())
        }
        let data = side.attrs.iter()
            .find(|attr| attr.id == oid::PKCS9_FRIENDLY_NAME)
            .map(|attr| attr.data.clone())?;
        let name = decode_friendly_name(&data)?;
        side.friendly_name = Some(name.clone());
        Some(name)
    }

    /// Stores an attribute unless one with the same identifier exists.
    pub fn set_attribute(&self, id: Oid<Bytes>, data: Bytes) {
        let mut side = self.data.side.lock().unwrap();
        if side.attrs.iter().any(|attr| attr.id == id) {
            return
        }
        side.attrs.push(CertAttribute { id, data });
    }

    /// Returns the data of the attribute with the given identifier.
    pub fn attribute<U: AsRef<[u8]>>(&self, id: &Oid<U>) -> Option<Bytes> {
        self.data.side.lock().unwrap().attrs.iter()
            .find(|attr| attr.id == *id)
            .map(|attr| attr.data.clone())
    }

    /// Attaches a private key handle.
    pub fn assign_private_key(&self, key: Arc<PrivateKey>) {
        self.data.side.lock().unwrap().private_key = Some(key);
    }

    /// Returns whether a private key is attached.
    pub fn has_private_key(&self) -> bool {
        self.data.side.lock().unwrap().private_key.is_some()
    }

    /// Returns the attached private key.
    pub fn private_key(&self) -> Result<Arc<PrivateKey>, Error> {
        self.data.side.lock().unwrap().private_key.clone().ok_or_else(|| {
            Error::new(Code::PrivateKeyMissing, "Private key missing")
        })
    }

    /// Caches the base name of the certificate.
    pub(crate) fn set_base_name(&self, name: Name) {
        self.data.side.lock().unwrap().basename = Some(name);
    }

    /// Returns the base subject of the certificate.
    ///
    /// For a certificate that went through proxy canonicalization this is
    /// the subject of its first non-proxy ancestor. For an ordinary
    /// certificate it is the subject itself. A proxy certificate that has
    /// not been canonicalized yet has no base subject.
    pub fn base_subject(&self) -> Result<Name, Error> {
        if let Some(ref name) = self.data.side.lock().unwrap().basename {
            return Ok(name.clone())
        }
        if ext::find_proxy_cert_info(&self.data.cert).is_ok() {
            return Err(Error::new(
                Code::ProxyCertNotCanonicalized,
                "Proxy certificate has not been canonicalized yet, \
                 no base name"
            ))
        }
        Ok(self.data.cert.subject().clone())
    }
}

/// # Extension access
impl Cert {
    /// Returns the key usage of the certificate.
    pub fn key_usage(&self) -> Result<KeyUsage, Error> {
        ext::find_key_usage(&self.data.cert).map_err(|err| {
            if err.code() == Code::ExtensionNotFound {
                err.with_code(Code::KeyUsageMissing)
            }
            else {
                err
            }
        })
    }

    /// Returns the extended key usage if the certificate carries one.
    pub fn extended_key_usage(&self) -> Result<Option<ExtKeyUsage>, Error> {
        match ext::find_ext_key_usage(&self.data.cert) {
            Ok(eku) => Ok(Some(eku)),
            Err(err) if err.code() == Code::ExtensionNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Checks that the certificate lists the given key purpose.
    ///
    /// With `allow_any_eku`, the anyExtendedKeyUsage purpose is accepted
    /// in place of the specific one.
    pub fn check_eku<U: AsRef<[u8]>>(
        &self, purpose: &Oid<U>, allow_any_eku: bool
    ) -> Result<(), Error> {
        let eku = ext::find_ext_key_usage(&self.data.cert)?;
        if eku.contains(purpose) {
            return Ok(())
        }
        if allow_any_eku && eku.contains(&oid::CE_ANY_EKU) {
            return Ok(())
        }
        Err(Error::from(Code::MissingEku))
    }

    /// Returns the otherName values of the given type from all subject
    /// alternative name extensions.
    pub fn subject_alt_name_other_names<U: AsRef<[u8]>>(
        &self, type_id: &Oid<U>
    ) -> Result<Vec<Bytes>, Error> {
        let mut res = Vec::new();
        let mut cursor = 0;
        loop {
            let names = match ext::find_subject_alt_name(
                &self.data.cert, &mut cursor
            ) {
                Ok(names) => names,
                Err(err) if err.code() == Code::ExtensionNotFound => break,
                Err(err) => return Err(err),
            };
            for name in names {
                if let GeneralName::OtherName { type_id: id, value } = name {
                    if id == *type_id {
                        res.push(Bytes::copy_from_slice(value.as_ref()));
                    }
                }
            }
        }
        Ok(res)
    }
}


//--- Debug

impl fmt::Debug for Cert {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cert")
            .field("subject", &self.subject().to_string())
            .field("issuer", &self.issuer().to_string())
            .finish()
    }
}


//--- Comparisons
//
// The order is the certificate order: two handles compare equal exactly
// when their certificates are byte-identical in all signed parts, whether
// or not they share the underlying data.

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cert { }

impl PartialOrd for Cert {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cert {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data.cert.cmp_cert(&other.data.cert)
    }
}


//------------ CertData ------------------------------------------------------

/// The shared data behind certificate handles.
struct CertData {
    /// The decoded certificate.
    cert: Certificate,

    /// The mutable side data.
    side: Mutex<SideData>,
}

impl Drop for CertData {
    fn drop(&mut self) {
        if let Ok(side) = self.side.get_mut() {
            if let Some(release) = side.release.take() {
                release(&self.cert)
            }
        }
    }
}


//------------ SideData ------------------------------------------------------

/// The mutable data kept next to a certificate.
#[derive(Default)]
struct SideData {
    /// An explicitly set or cached friendly name.
    friendly_name: Option<String>,

    /// The attribute list.
    attrs: Vec<CertAttribute>,

    /// The cached base name after proxy canonicalization.
    basename: Option<Name>,

    /// The attached private key, shared with stores.
    private_key: Option<Arc<PrivateKey>>,

    /// The release callback.
    release: Option<ReleaseFn>,
}


//------------ CertAttribute -------------------------------------------------

/// A typed attribute attached to a certificate.
struct CertAttribute {
    /// The attribute identifier.
    id: Oid<Bytes>,

    /// The raw attribute data.
    data: Bytes,
}


//------------ PrivateKey ----------------------------------------------------

/// An opaque private key handle.
///
/// The engine never interprets key material; it only tracks whether a
/// certificate has a key attached. Stores that load keys wrap them into
/// this type and share the handle with the certificate.
pub struct PrivateKey {
    /// The raw key material.
    material: Bytes,
}

impl PrivateKey {
    /// Creates a key handle from raw key material.
    pub fn new(material: Bytes) -> Self {
        PrivateKey { material }
    }

    /// Returns the raw key material.
    pub fn material(&self) -> &[u8] {
        self.material.as_ref()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("PrivateKey(...)")
    }
}


//------------ is_parent_cmp -------------------------------------------------

/// Decides whether `issuer` is a plausible issuer of `subject`.
///
/// Returns [`Ordering::Equal`] on a match. The non-equal results form a
/// stable order so stores can use the function as a sort key.
///
/// The names must chain in any case. Key identifiers disambiguate issuers
/// with identical names: if the subject names an authority key identifier
/// and the issuer carries a subject key identifier, the two must agree.
/// An authority key identifier without a key identifier field must name
/// the issuer by directory name and serial number instead. A certificate
/// without a subject key identifier can only issue itself, and only when
/// `allow_self_signed` is set.
pub fn is_parent_cmp(
    subject: &Certificate,
    issuer: &Certificate,
    allow_self_signed: bool,
) -> Ordering {
    let diff = issuer.subject().cmp_names(subject.issuer());
    if diff != Ordering::Equal {
        return diff
    }

    let aki = match ext::find_authority_key_id(subject) {
        Ok(aki) => Some(aki),
        Err(err) if err.code() == Code::ExtensionNotFound => None,
        Err(_) => return Ordering::Greater,
    };
    let ski = match ext::find_subject_key_id(issuer) {
        Ok(ski) => Some(ski),
        Err(err) if err.code() == Code::ExtensionNotFound => None,
        Err(_) => return Ordering::Less,
    };

    // Without an authority key identifier on the subject the name match
    // above is all there is to check.
    let aki = match aki {
        Some(aki) => aki,
        None => return Ordering::Equal,
    };

    if ski.is_none() {
        if allow_self_signed {
            return Ordering::Equal
        }
        if aki.key_identifier().is_some() {
            return Ordering::Less
        }
    }

    match (aki.key_identifier(), ski) {
        (Some(kid), Some(ski)) => kid.as_ref().cmp(ski.as_slice()),
        (Some(_), None) => Ordering::Less,
        (None, _) => {
            // The identifier must name the issuer by directory name and
            // serial number instead.
            let names = match aki.authority_cert_issuer() {
                Some(names) => names,
                None => return Ordering::Less,
            };
            let serial = match aki.authority_cert_serial() {
                Some(serial) => serial,
                None => return Ordering::Less,
            };
            let diff = serial.cmp(issuer.serial());
            if diff != Ordering::Equal {
                return diff
            }
            if names.len() != 1 {
                return Ordering::Less
            }
            match names[0] {
                GeneralName::DirectoryName(ref name) => {
                    issuer.subject().cmp_names(name)
                }
                _ => Ordering::Less,
            }
        }
    }
}


//------------ Helpers -------------------------------------------------------

/// Decodes a PKCS#9 friendlyName attribute value.
///
/// The value is a set that must contain exactly one BMPString; anything
/// else is ignored. UTF-16 units above 0xFF have no byte equivalent and
/// become `'X'`.
fn decode_friendly_name(data: &Bytes) -> Option<String> {
    let values = Mode::Der.decode(data.clone(), |cons| {
        cons.take_set(|cons| {
            let mut values = Vec::new();
            while let Some(value) = cons.take_opt_primitive(
                |_, prim| prim.take_all()
            )? {
                values.push(value)
            }
            Ok(values)
        })
    }).ok()?;
    if values.len() != 1 {
        return None
    }
    let raw = values[0].as_ref();
    if raw.len() % 2 != 0 {
        return None
    }
    let mut res = String::with_capacity(raw.len() / 2);
    for pair in raw.chunks(2) {
        let unit = u16::from(pair[0]) << 8 | u16::from(pair[1]);
        if unit > 0xff {
            res.push('X')
        }
        else {
            res.push(unit as u8 as char)
        }
    }
    Some(res)
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use crate::test;

    #[test]
    fn release_runs_exactly_once() {
        static COUNT: AtomicUsize = AtomicUsize::new(0);

        let cert = test::ca_cert("Alpha CA");
        cert.set_release(Box::new(|_| {
            COUNT.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        let clone = cert.clone();
        drop(cert);
        assert_eq!(COUNT.load(AtomicOrdering::SeqCst), 0);
        drop(clone);
        assert_eq!(COUNT.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn binary_round_trip() {
        let cert = test::ca_cert("Alpha CA");
        let encoded = cert.to_bytes();
        let reloaded = Cert::decode(encoded.clone()).unwrap();
        assert_eq!(reloaded.to_bytes(), encoded);
        assert_eq!(reloaded, cert);
    }

    #[test]
    fn order_is_stable_under_sharing() {
        let alpha = test::ca_cert("Alpha CA");
        let beta = test::ca_cert("Beta CA");
        let ord = alpha.cmp(&beta);
        assert_ne!(ord, Ordering::Equal);
        let clone = alpha.clone();
        assert_eq!(clone.cmp(&beta), ord);
        assert_eq!(alpha.cmp(&clone), Ordering::Equal);
    }

    #[test]
    fn self_signed_detection() {
        let (ca, leaf) = test::ca_and_leaf();
        assert!(ca.is_self_signed());
        assert!(!leaf.is_self_signed());
        assert_eq!(
            is_parent_cmp(
                leaf.certificate(), ca.certificate(), false
            ),
            Ordering::Equal
        );
        assert_ne!(
            is_parent_cmp(
                ca.certificate(), leaf.certificate(), false
            ),
            Ordering::Equal
        );
    }

    #[test]
    fn friendly_name_fallback() {
        let cert = test::ca_cert("Alpha CA");
        assert_eq!(cert.friendly_name(), None);

        // A SET with a single BMPString "Axé" where the accented letter
        // is representable and an ideograph that is not.
        let attr = Bytes::from_static(&[
            0x31, 0x08,                         // SET, 8 octets
            0x1e, 0x06,                         // BMPString, 3 units
            0x00, 0x41, 0x00, 0xe9, 0x4e, 0x2d, // 'A', 'é', U+4E2D
        ]);
        cert.set_attribute(
            Oid(Bytes::from_static(crate::oid::PKCS9_FRIENDLY_NAME.0)), attr
        );
        assert_eq!(cert.friendly_name().unwrap(), "A\u{e9}X");

        cert.set_friendly_name("explicit");
        assert_eq!(cert.friendly_name().unwrap(), "explicit");
    }

    #[test]
    fn attributes_are_first_write_wins() {
        let cert = test::ca_cert("Alpha CA");
        let id = Oid(Bytes::from_static(crate::oid::PKCS9_LOCAL_KEY_ID.0));
        cert.set_attribute(id.clone(), Bytes::from_static(b"one"));
        cert.set_attribute(id.clone(), Bytes::from_static(b"two"));
        assert_eq!(
            cert.attribute(&id).unwrap(),
            Bytes::from_static(b"one")
        );
    }

    #[test]
    fn proxy_has_no_base_subject_before_verify() {
        let chain = test::proxy_chain();
        assert_eq!(
            chain.proxy.base_subject().unwrap_err().code(),
            Code::ProxyCertNotCanonicalized
        );
        let (_, leaf) = test::ca_and_leaf();
        assert_eq!(leaf.base_subject().unwrap(), *leaf.subject());
    }
}

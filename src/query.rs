//! Store queries.
//!
//! A [`Query`] is a composable match predicate over certificates. Each
//! criterion occupies one bit of a match mask and has a field carrying its
//! comparison value; a certificate matches the query when every selected
//! criterion holds. Stores evaluate queries through
//! [`matches_cert`][Query::matches_cert].
//!
//! A mask with a bit outside the recognized set never matches anything.
//! This keeps old stores honest when new criteria are introduced: a store
//! cannot accidentally treat a criterion it does not know as satisfied.

use std::cmp::Ordering;
use bcder::Oid;
use bytes::Bytes;
use crate::cert::{is_parent_cmp, Cert};
use crate::context::Context;
use crate::crypto;
use crate::ext;
use crate::name::Name;
use crate::oid;
use crate::verify::Path;
use crate::x509::{AlgorithmIdentifier, Serial, Time};


//------------ Match bits ----------------------------------------------------

pub const FIND_ISSUER_CERT: u32 = 1 << 0;
pub const MATCH_CERTIFICATE: u32 = 1 << 1;
pub const PRIVATE_KEY: u32 = 1 << 2;
pub const KU_ENCIPHERMENT: u32 = 1 << 3;
pub const KU_DIGITALSIGNATURE: u32 = 1 << 4;
pub const KU_KEYCERTSIGN: u32 = 1 << 5;
pub const KU_CRLSIGN: u32 = 1 << 6;
pub const KU_NONREPUDIATION: u32 = 1 << 7;
pub const KU_KEYAGREEMENT: u32 = 1 << 8;
pub const KU_DATAENCIPHERMENT: u32 = 1 << 9;
pub const ANCHOR: u32 = 1 << 10;
pub const MATCH_SERIALNUMBER: u32 = 1 << 11;
pub const MATCH_ISSUER_NAME: u32 = 1 << 12;
pub const MATCH_SUBJECT_NAME: u32 = 1 << 13;
pub const MATCH_SUBJECT_KEY_ID: u32 = 1 << 14;
pub const MATCH_ISSUER_ID: u32 = 1 << 15;
pub const NO_MATCH_PATH: u32 = 1 << 16;
pub const MATCH_FRIENDLY_NAME: u32 = 1 << 17;
pub const MATCH_FUNCTION: u32 = 1 << 18;
pub const MATCH_KEY_HASH_SHA1: u32 = 1 << 19;
pub const MATCH_LOCAL_KEY_ID: u32 = 1 << 20;
pub const MATCH_TIME: u32 = 1 << 21;

/// All bits the implementation recognizes.
pub const MASK: u32 = (1 << 22) - 1;


//------------ QueryOption ---------------------------------------------------

/// The pre-defined options for [`Query::match_option`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryOption {
    /// Only match certificates with a private key attached.
    PrivateKey,

    /// Only match certificates allowing key encipherment.
    KuEncipherment,

    /// Only match certificates allowing digital signatures.
    KuDigitalSignature,

    /// Only match certificates allowed to sign certificates.
    KuKeyCertSign,
}


//------------ QueryCmpFn ----------------------------------------------------

/// A user callback participating in query evaluation.
///
/// The callback returns whether the certificate matches.
pub type QueryCmpFn = Box<dyn Fn(&Context, &Cert) -> bool + Send + Sync>;


//------------ Query ---------------------------------------------------------

/// A match predicate over certificates.
#[derive(Default)]
pub struct Query {
    /// The selected criteria.
    mask: u32,

    /// The certificate whose issuer is searched for.
    subject: Option<Cert>,

    /// A certificate for whole-certificate matching.
    certificate: Option<Cert>,

    /// A serial number to match.
    serial: Option<Serial>,

    /// An issuer name to match.
    issuer_name: Option<Name>,

    /// A subject name to match.
    subject_name: Option<Name>,

    /// A subject key identifier to match.
    subject_id: Option<Bytes>,

    /// A local key identifier attribute to match.
    local_key_id: Option<Bytes>,

    /// A friendly name to match.
    friendly_name: Option<String>,

    /// The expected SHA-1 hash of the public key.
    key_hash_sha1: Option<Bytes>,

    /// The time certificates have to be valid at.
    time_now: Option<Time>,

    /// Certificates that must not be matched.
    excluded: Vec<Cert>,

    /// The user callback.
    cmp_func: Option<QueryCmpFn>,
}

impl Query {
    /// Creates an empty query matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the query to match everything again.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Enables one of the pre-defined options.
    pub fn match_option(&mut self, option: QueryOption) {
        self.mask |= match option {
            QueryOption::PrivateKey => PRIVATE_KEY,
            QueryOption::KuEncipherment => KU_ENCIPHERMENT,
            QueryOption::KuDigitalSignature => KU_DIGITALSIGNATURE,
            QueryOption::KuKeyCertSign => KU_KEYCERTSIGN,
        };
    }

    /// Matches certificates with the given issuer and serial number.
    pub fn match_issuer_serial(&mut self, issuer: Name, serial: Serial) {
        self.issuer_name = Some(issuer);
        self.serial = Some(serial);
        self.mask |= MATCH_ISSUER_NAME | MATCH_SERIALNUMBER;
    }

    /// Matches certificates with the given friendly name.
    pub fn match_friendly_name(&mut self, name: &str) {
        self.friendly_name = Some(name.into());
        self.mask |= MATCH_FRIENDLY_NAME;
    }

    /// Installs or removes a user callback.
    pub fn match_cmp_func(&mut self, func: Option<QueryCmpFn>) {
        if func.is_some() {
            self.mask |= MATCH_FUNCTION;
        }
        else {
            self.mask &= !MATCH_FUNCTION;
        }
        self.cmp_func = func;
    }

    /// Matches only the given certificate.
    pub fn match_certificate(&mut self, cert: Cert) {
        self.certificate = Some(cert);
        self.mask |= MATCH_CERTIFICATE;
    }

    /// Matches plausible issuers of the given certificate.
    pub fn find_issuer(&mut self, subject: Cert) {
        self.subject = Some(subject);
        self.mask |= FIND_ISSUER_CERT;
    }

    /// Matches certificates with the given subject name.
    pub fn match_subject_name(&mut self, name: Name) {
        self.subject_name = Some(name);
        self.mask |= MATCH_SUBJECT_NAME;
    }

    /// Matches certificates with the given subject key identifier.
    pub fn match_subject_key_id(&mut self, id: Bytes) {
        self.subject_id = Some(id);
        self.mask |= MATCH_SUBJECT_KEY_ID;
    }

    /// Matches certificates with the given local key identifier attribute.
    pub fn match_local_key_id(&mut self, id: Bytes) {
        self.local_key_id = Some(id);
        self.mask |= MATCH_LOCAL_KEY_ID;
    }

    /// Matches certificates whose public key has the given SHA-1 hash.
    pub fn match_key_hash_sha1(&mut self, hash: Bytes) {
        self.key_hash_sha1 = Some(hash);
        self.mask |= MATCH_KEY_HASH_SHA1;
    }

    /// Matches certificates valid at the given time.
    pub fn match_time(&mut self, time: Time) {
        self.time_now = Some(time);
        self.mask |= MATCH_TIME;
    }

    /// Drops the validity time criterion again.
    pub(crate) fn clear_time(&mut self) {
        self.time_now = None;
        self.mask &= !MATCH_TIME;
    }

    /// Excludes every certificate of the given path from matching.
    pub fn exclude_path(&mut self, path: &Path) {
        self.excluded = path.iter().cloned().collect();
        self.mask |= NO_MATCH_PATH;
    }

    /// Returns whether a certificate matches every selected criterion.
    pub fn matches_cert(&self, context: &Context, cert: &Cert) -> bool {
        let c = cert.certificate();

        if self.mask & FIND_ISSUER_CERT != 0 {
            let subject = match self.subject {
                Some(ref subject) => subject,
                None => return false,
            };
            if is_parent_cmp(subject.certificate(), c, false)
                != Ordering::Equal
            {
                return false
            }
        }

        if self.mask & MATCH_CERTIFICATE != 0 {
            match self.certificate {
                Some(ref want) => {
                    if want.certificate().cmp_cert(c) != Ordering::Equal {
                        return false
                    }
                }
                None => return false,
            }
        }

        if self.mask & MATCH_SERIALNUMBER != 0
            && self.serial.as_ref() != Some(c.serial())
        {
            return false
        }

        if self.mask & MATCH_ISSUER_NAME != 0
            && self.issuer_name.as_ref() != Some(c.issuer())
        {
            return false
        }

        if self.mask & MATCH_SUBJECT_NAME != 0
            && self.subject_name.as_ref() != Some(c.subject())
        {
            return false
        }

        if self.mask & MATCH_SUBJECT_KEY_ID != 0 {
            let want = match self.subject_id {
                Some(ref want) => want,
                None => return false,
            };
            match ext::find_subject_key_id(c) {
                Ok(ski) => {
                    if ski.as_slice() != want.as_ref() {
                        return false
                    }
                }
                Err(_) => return false,
            }
        }

        // Issuer unique identifier matching was never implemented.
        if self.mask & MATCH_ISSUER_ID != 0 {
            return false
        }

        if self.mask & PRIVATE_KEY != 0 && !cert.has_private_key() {
            return false
        }

        let mut ku = 0;
        if self.mask & KU_DIGITALSIGNATURE != 0 {
            ku |= ext::KU_DIGITAL_SIGNATURE;
        }
        if self.mask & KU_NONREPUDIATION != 0 {
            ku |= ext::KU_NON_REPUDIATION;
        }
        if self.mask & KU_ENCIPHERMENT != 0 {
            ku |= ext::KU_KEY_ENCIPHERMENT;
        }
        if self.mask & KU_DATAENCIPHERMENT != 0 {
            ku |= ext::KU_DATA_ENCIPHERMENT;
        }
        if self.mask & KU_KEYAGREEMENT != 0 {
            ku |= ext::KU_KEY_AGREEMENT;
        }
        if self.mask & KU_KEYCERTSIGN != 0 {
            ku |= ext::KU_KEY_CERT_SIGN;
        }
        if self.mask & KU_CRLSIGN != 0 {
            ku |= ext::KU_CRL_SIGN;
        }
        if ku != 0 && ext::check_key_usage(c, ku, true).is_err() {
            return false
        }

        // Anchor-only matching was never implemented.
        if self.mask & ANCHOR != 0 {
            return false
        }

        if self.mask & MATCH_LOCAL_KEY_ID != 0 {
            let want = match self.local_key_id {
                Some(ref want) => want,
                None => return false,
            };
            match cert.attribute(&Oid(oid::PKCS9_LOCAL_KEY_ID.0)) {
                Some(data) => {
                    if data != *want {
                        return false
                    }
                }
                None => return false,
            }
        }

        if self.mask & NO_MATCH_PATH != 0 {
            if self.excluded.iter().any(|excluded| excluded == cert) {
                return false
            }
        }

        if self.mask & MATCH_FRIENDLY_NAME != 0 {
            let want = match self.friendly_name {
                Some(ref want) => want,
                None => return false,
            };
            match cert.friendly_name() {
                Some(name) => {
                    if !name.eq_ignore_ascii_case(want) {
                        return false
                    }
                }
                None => return false,
            }
        }

        if self.mask & MATCH_FUNCTION != 0 {
            match self.cmp_func {
                Some(ref func) => {
                    if !func(context, cert) {
                        return false
                    }
                }
                None => return false,
            }
        }

        if self.mask & MATCH_KEY_HASH_SHA1 != 0 {
            let want = match self.key_hash_sha1 {
                Some(ref want) => want,
                None => return false,
            };
            let key = c.subject_public_key_info().key_octets();
            let alg = AlgorithmIdentifier::new(
                Oid(Bytes::from_static(oid::SHA1.0))
            );
            if crypto::verify_signature(
                context, None, &alg, key, want.as_ref()
            ).is_err() {
                return false
            }
        }

        if self.mask & MATCH_TIME != 0 {
            match self.time_now {
                Some(time) => {
                    if !c.validity().covers(time) {
                        return false
                    }
                }
                None => return false,
            }
        }

        // A query with unknown bits set matches nothing.
        if self.mask & !MASK != 0 {
            return false
        }

        true
    }
}


//============ Tests =========================================================

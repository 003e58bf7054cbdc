//! Object identifier constants.
//!
//! All object identifiers the engine needs to know about, collected in one
//! place. The values are the DER-encoded content octets of the respective
//! identifier.

use bcder::Oid;

/// The type of all constants in this module.
pub type ConstOid = Oid<&'static [u8]>;


//------------ Attribute types (2.5.4.x) -------------------------------------

/// 2.5.4.3: id-at-commonName.
pub const AT_COMMON_NAME: ConstOid = Oid(&[85, 4, 3]);

/// 2.5.4.6: id-at-countryName.
pub const AT_COUNTRY_NAME: ConstOid = Oid(&[85, 4, 6]);

/// 2.5.4.10: id-at-organizationName.
pub const AT_ORGANIZATION_NAME: ConstOid = Oid(&[85, 4, 10]);

/// 2.5.4.11: id-at-organizationalUnitName.
pub const AT_ORGANIZATIONAL_UNIT_NAME: ConstOid = Oid(&[85, 4, 11]);


//------------ Certificate extensions (2.5.29.x) -----------------------------

/// 2.5.29.14: id-ce-subjectKeyIdentifier.
pub const CE_SUBJECT_KEY_IDENTIFIER: ConstOid = Oid(&[85, 29, 14]);

/// 2.5.29.15: id-ce-keyUsage.
pub const CE_KEY_USAGE: ConstOid = Oid(&[85, 29, 15]);

/// 2.5.29.17: id-ce-subjectAltName.
pub const CE_SUBJECT_ALT_NAME: ConstOid = Oid(&[85, 29, 17]);

/// 2.5.29.18: id-ce-issuerAltName.
pub const CE_ISSUER_ALT_NAME: ConstOid = Oid(&[85, 29, 18]);

/// 2.5.29.19: id-ce-basicConstraints.
pub const CE_BASIC_CONSTRAINTS: ConstOid = Oid(&[85, 29, 19]);

/// 2.5.29.30: id-ce-nameConstraints.
pub const CE_NAME_CONSTRAINTS: ConstOid = Oid(&[85, 29, 30]);

/// 2.5.29.35: id-ce-authorityKeyIdentifier.
pub const CE_AUTHORITY_KEY_IDENTIFIER: ConstOid = Oid(&[85, 29, 35]);

/// 2.5.29.37: id-ce-extKeyUsage.
pub const CE_EXT_KEY_USAGE: ConstOid = Oid(&[85, 29, 37]);

/// 2.5.29.37.0: anyExtendedKeyUsage.
pub const CE_ANY_EKU: ConstOid = Oid(&[85, 29, 37, 0]);


//------------ PKIX extensions -----------------------------------------------

/// 1.3.6.1.5.5.7.1.14: id-pe-proxyCertInfo.
pub const PE_PROXY_CERT_INFO: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 1, 14]);


//------------ PKCS#9 attributes ---------------------------------------------

/// 1.2.840.113549.1.9.20: pkcs-9-at-friendlyName.
pub const PKCS9_FRIENDLY_NAME: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 20]);

/// 1.2.840.113549.1.9.21: pkcs-9-at-localKeyId.
pub const PKCS9_LOCAL_KEY_ID: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 21]);


//------------ Signature algorithms ------------------------------------------

/// 1.2.840.113549.1.1.11: sha256WithRSAEncryption.
pub const SHA256_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 11]);

/// 1.2.840.113549.1.1.12: sha384WithRSAEncryption.
pub const SHA384_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 12]);

/// 1.2.840.113549.1.1.13: sha512WithRSAEncryption.
pub const SHA512_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 13]);

/// 1.2.840.10045.4.3.2: ecdsa-with-SHA256.
pub const ECDSA_WITH_SHA256: ConstOid = Oid(&[42, 134, 72, 206, 61, 4, 3, 2]);

/// 1.3.101.112: id-Ed25519.
pub const ED25519: ConstOid = Oid(&[43, 101, 112]);


//------------ Digest algorithms ---------------------------------------------

/// 1.3.14.3.2.26: id-sha1.
pub const SHA1: ConstOid = Oid(&[43, 14, 3, 2, 26]);

/// 2.16.840.1.101.3.4.2.1: id-sha256.
pub const SHA256: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

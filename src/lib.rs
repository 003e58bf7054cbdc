//! X.509 certificate path validation.
//!
//! This crate decides whether an end-entity certificate is trustworthy:
//! given the certificate, a pool of intermediate certificates and a set
//! of trust anchors, it builds a chain from the leaf towards an anchor
//! and applies the RFC 5280 rule set to it: issuer linkage, basic
//! constraints, key usage, validity windows and name constraints, plus
//! the RFC 3820 rules for proxy certificates, with revocation checking and
//! signature verification hooked in at well-defined points.
//!
//! The entry point is [`verify::VerifyCtx`]: configure it with trust
//! anchors, an optional revocation backend, a verification time and the
//! policy switches, then call
//! [`verify_path`][verify::VerifyCtx::verify_path] with the certificate
//! under test and the pool. On success the validated chain is returned
//! with the leaf first.
//!
//! Certificates are handled through the shared [`cert::Cert`] handle and
//! live in stores implementing [`store::CertStore`]; a memory-backed
//! store is built in and reachable through URIs of the form
//! `MEMORY:<tag>`. Stores are searched with [`query::Query`] predicates.
//! All operations receive an explicitly created [`context::Context`]
//! which owns the store backend registry and remembers the most recent
//! diagnostic.
//!
//! The ASN.1 heavy lifting is done with [bcder](https://crates.io/crates/bcder);
//! cryptographic verification is delegated to
//! [ring](https://crates.io/crates/ring) behind the single entry point
//! [`crypto::verify_signature`]. Malformed input never validates: every
//! decoder failure, unknown name form and unsupported algorithm surfaces
//! as an error.

pub mod cert;
pub mod context;
pub mod crypto;
pub mod error;
pub mod ext;
pub mod name;
pub mod oid;
pub mod query;
pub mod revoke;
pub mod store;
pub mod verify;
pub mod x509;

mod test;

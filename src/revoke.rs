//! The revocation seam.
//!
//! The engine does not process CRLs or OCSP responses itself. Instead, a
//! revocation backend implementing [`RevokeCheck`] can be attached to a
//! verification context. During path verification the engine hands the
//! backend every non-anchor certificate of the chain together with its
//! issuer and a working store holding the chain and the pool, and the
//! backend decides.
//!
//! Backends that find themselves without data for a certificate should
//! consult [`Context::missing_revoke_ok`][crate::context::Context] to
//! decide whether to fail or to wave the certificate through.

use std::sync::Arc;
use crate::cert::Cert;
use crate::context::Context;
use crate::error::Error;
use crate::store::Certs;
use crate::x509::Time;


//------------ RevokeCheck ---------------------------------------------------

/// A revocation status backend.
pub trait RevokeCheck: Send + Sync {
    /// Checks whether a certificate is revoked.
    ///
    /// `certs` is a working store containing the certificates of the
    /// chain under verification plus the caller's pool; backends can use
    /// it to locate CRL signers. `issuer` is the certificate right above
    /// `cert` in the chain. A revoked certificate is reported with
    /// [`Code::CertRevoked`][crate::error::Code::CertRevoked].
    fn verify(
        &self,
        context: &Context,
        certs: &Certs,
        time: Time,
        cert: &Cert,
        issuer: &Cert,
    ) -> Result<(), Error>;
}

/// A shared handle to a revocation backend.
pub type Revoke = Arc<dyn RevokeCheck>;

//! Error types used throughout the crate.
//!
//! Every failure surfaces as an [`Error`] which pairs a stable error kind,
//! [`Code`], with an optional human-readable diagnostic. Callers that need
//! to react to a particular failure compare codes; the diagnostic string is
//! advisory only and its wording may change between releases.
//!
//! The library context keeps a copy of the most recent diagnostic so that
//! callers holding only an error code can still retrieve the full message.
//! See [`Context::last_error`][crate::context::Context::last_error].

use std::{error, fmt};
use bcder::decode;


//------------ Code ----------------------------------------------------------

/// The kind of a failure.
///
/// Each variant corresponds to one condition the engine can report. The
/// variants are stable: matching on them is the supported way to react to
/// a specific failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Code {
    /// A requested certificate extension is not present.
    ExtensionNotFound,

    /// A certificate is structurally unusable for the requested operation.
    CertificateMalformed,

    /// A DER structure was followed by stray octets.
    ExtraDataAfterStructure,

    /// A required key usage bit or the key usage extension is missing.
    KeyUsageMissing,

    /// A certificate that must not be a CA has the cA flag set.
    ParentIsCa,

    /// A certificate that must be a CA lacks the cA flag.
    ParentNotCa,

    /// A CA's path length constraint was exceeded.
    CaPathTooDeep,

    /// The chain grew beyond the maximum depth.
    PathTooLong,

    /// No issuer could be found for a certificate.
    IssuerNotFound,

    /// The verification time lies before a certificate's notBefore.
    CertUsedBeforeTime,

    /// The verification time lies after a certificate's notAfter.
    CertUsedAfterTime,

    /// A name constraint rejected a certificate.
    VerifyConstraints,

    /// A name constraint could not be evaluated.
    NameConstraintError,

    /// A name constraint used the unsupported minimum/maximum fields.
    Range,

    /// A proxy certificate carries forbidden content.
    ProxyCertInvalid,

    /// A proxy certificate's subject does not extend its issuer.
    ProxyCertNameWrong,

    /// A proxy certificate has not been canonicalized yet.
    ProxyCertNotCanonicalized,

    /// An operation required a private key but the certificate has none.
    PrivateKeyMissing,

    /// A required extended key usage purpose is missing.
    MissingEku,

    /// The signature algorithm changed along the chain.
    ///
    /// This condition is currently never raised. The kind is retained for
    /// compatibility with callers that match on it.
    PathAlgorithmChanged,

    /// The signature or digest algorithm is not supported.
    SignatureUnsupported,

    /// A signature failed to verify.
    SignatureInvalid,

    /// A certificate has been revoked.
    CertRevoked,

    /// A DER structure failed to decode.
    Decode,

    /// No store backend is registered for a URI scheme.
    StoreUnsupported,

    /// A store query matched no certificate.
    NotFound,

    /// An argument was unusable.
    InvalidArgument,
}

impl Code {
    /// Returns the generic description for this kind.
    fn description(self) -> &'static str {
        match self {
            Code::ExtensionNotFound => "extension not found",
            Code::CertificateMalformed => "certificate malformed",
            Code::ExtraDataAfterStructure => "extra data after structure",
            Code::KeyUsageMissing => "required key usage missing",
            Code::ParentIsCa => "certificate is a CA",
            Code::ParentNotCa => "parent certificate is not a CA",
            Code::CaPathTooDeep => "CA path length constraint exceeded",
            Code::PathTooLong => "path too long",
            Code::IssuerNotFound => "issuer not found",
            Code::CertUsedBeforeTime => "certificate used before valid time",
            Code::CertUsedAfterTime => "certificate used after valid time",
            Code::VerifyConstraints => "name constraints rejected certificate",
            Code::NameConstraintError => "name constraint not evaluable",
            Code::Range => "unsupported name constraint range",
            Code::ProxyCertInvalid => "invalid proxy certificate",
            Code::ProxyCertNameWrong => "proxy certificate name mismatch",
            Code::ProxyCertNotCanonicalized
                => "proxy certificate not canonicalized",
            Code::PrivateKeyMissing => "private key missing",
            Code::MissingEku => "required extended key usage missing",
            Code::PathAlgorithmChanged => "signature algorithm changed in path",
            Code::SignatureUnsupported => "signature algorithm not supported",
            Code::SignatureInvalid => "signature verification failed",
            Code::CertRevoked => "certificate revoked",
            Code::Decode => "DER decoding failed",
            Code::StoreUnsupported => "store type not supported",
            Code::NotFound => "no matching certificate",
            Code::InvalidArgument => "invalid argument",
        }
    }
}


//------------ Error ---------------------------------------------------------

/// A failure reported by the engine.
///
/// Consists of a [`Code`] identifying the condition and an optional
/// diagnostic string. Two errors are considered equivalent when their codes
/// are equal; the diagnostic never participates in comparisons.
#[derive(Clone, Debug)]
pub struct Error {
    /// The kind of the failure.
    code: Code,

    /// A diagnostic aimed at humans.
    detail: Option<String>,
}

impl Error {
    /// Creates an error of the given kind with a diagnostic string.
    pub fn new(code: Code, detail: impl Into<String>) -> Self {
        Error { code, detail: Some(detail.into()) }
    }

    /// Returns the kind of the error.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Returns the diagnostic string if there is one.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Prepends additional context to the diagnostic, keeping the kind.
    pub fn annotate(mut self, note: impl fmt::Display) -> Self {
        self.detail = Some(match self.detail.take() {
            Some(detail) => format!("{}: {}", note, detail),
            None => note.to_string(),
        });
        self
    }

    /// Replaces the kind of the error, keeping the diagnostic.
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = code;
        self
    }
}


//--- From

impl From<Code> for Error {
    fn from(code: Code) -> Self {
        Error { code, detail: None }
    }
}

impl From<decode::Error> for Error {
    fn from(_: decode::Error) -> Self {
        Error::from(Code::Decode)
    }
}


//--- PartialEq and Eq

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Error { }


//--- Display and error::Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.detail {
            Some(ref detail) => write!(f, "{}", detail),
            None => write!(f, "{}", self.code.description()),
        }
    }
}

impl error::Error for Error { }


//============ Tests =========================================================

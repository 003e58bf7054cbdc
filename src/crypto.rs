//! The signature primitive.
//!
//! All cryptographic verification funnels through [`verify_signature`].
//! With a signer certificate the function checks a signature under the
//! signer's public key; without one it runs in digest mode, hashing the
//! data and comparing the result against the provided value. The latter
//! form backs the SHA-1 public-key-hash store queries.
//!
//! The mapping from algorithm identifiers to ring's verification
//! algorithms is deliberately small: RSA PKCS#1 v1.5 with the SHA-2
//! family, ECDSA P-256 with SHA-256, and Ed25519. Anything else fails
//! with [`Code::SignatureUnsupported`] rather than being guessed at.

use ring::{digest, signature};
use crate::cert::Cert;
use crate::context::Context;
use crate::error::{Code, Error};
use crate::oid;
use crate::x509::AlgorithmIdentifier;


//------------ verify_signature ----------------------------------------------

/// Verifies a signature or, without a signer, a digest.
///
/// `alg` selects the algorithm. With a signer certificate, `sig` must be
/// a signature over `data` by the signer's subject public key. Without
/// one, `alg` must name a digest algorithm and `sig` must equal the
/// digest of `data`.
///
/// On failure the context remembers the diagnostic.
pub fn verify_signature(
    context: &Context,
    signer: Option<&Cert>,
    alg: &AlgorithmIdentifier,
    data: &[u8],
    sig: &[u8],
) -> Result<(), Error> {
    let res = match signer {
        Some(signer) => verify_with_key(signer, alg, data, sig),
        None => verify_digest(alg, data, sig),
    };
    if let Err(ref err) = res {
        context.remember_error(err);
    }
    res
}

/// Verifies a signature under the signer's public key.
fn verify_with_key(
    signer: &Cert,
    alg: &AlgorithmIdentifier,
    data: &[u8],
    sig: &[u8],
) -> Result<(), Error> {
    let alg_oid = alg.algorithm().0.as_ref();
    let verification: &'static dyn signature::VerificationAlgorithm
        = if alg_oid == oid::SHA256_WITH_RSA_ENCRYPTION.0 {
            &signature::RSA_PKCS1_2048_8192_SHA256
        }
        else if alg_oid == oid::SHA384_WITH_RSA_ENCRYPTION.0 {
            &signature::RSA_PKCS1_2048_8192_SHA384
        }
        else if alg_oid == oid::SHA512_WITH_RSA_ENCRYPTION.0 {
            &signature::RSA_PKCS1_2048_8192_SHA512
        }
        else if alg_oid == oid::ECDSA_WITH_SHA256.0 {
            &signature::ECDSA_P256_SHA256_ASN1
        }
        else if alg_oid == oid::ED25519.0 {
            &signature::ED25519
        }
        else {
            return Err(Error::new(
                Code::SignatureUnsupported,
                "Signature algorithm not supported"
            ))
        };
    let key = signer.subject_public_key_info().key_octets();
    signature::UnparsedPublicKey::new(verification, key)
        .verify(data, sig)
        .map_err(|_| {
            Error::new(
                Code::SignatureInvalid,
                format!(
                    "Signature under key of {} does not verify",
                    signer.subject()
                )
            )
        })
}

/// Hashes the data and compares the result to the provided value.
fn verify_digest(
    alg: &AlgorithmIdentifier,
    data: &[u8],
    sig: &[u8],
) -> Result<(), Error> {
    let alg_oid = alg.algorithm().0.as_ref();
    let algorithm = if alg_oid == oid::SHA1.0 {
        &digest::SHA1_FOR_LEGACY_USE_ONLY
    }
    else if alg_oid == oid::SHA256.0 {
        &digest::SHA256
    }
    else {
        return Err(Error::new(
            Code::SignatureUnsupported,
            "Digest algorithm not supported"
        ))
    };
    if digest::digest(algorithm, data).as_ref() == sig {
        Ok(())
    }
    else {
        Err(Error::new(Code::SignatureInvalid, "Digest mismatch"))
    }
}


//============ Tests =========================================================

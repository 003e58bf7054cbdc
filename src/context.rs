//! The library context.
//!
//! A [`Context`] is the explicit root every operation receives. It owns
//! the registry of store backends, the policy switches that are global to
//! an application rather than to one verification, and the most recent
//! diagnostic string. There is no process-wide state; applications create
//! as many contexts as they need and may use them concurrently from
//! distinct threads.

use std::sync::Mutex;
use crate::error::{Code, Error};
use crate::store::{Certs, MemStoreBackend, StoreBackend};


//------------ Context -------------------------------------------------------

/// The root object of the engine.
pub struct Context {
    /// The registered store backends.
    backends: Vec<Box<dyn StoreBackend>>,

    /// Whether missing revocation data is acceptable.
    missing_revoke_ok: bool,

    /// The diagnostic string of the most recent failure.
    last_error: Mutex<Option<String>>,
}

impl Context {
    /// Creates a new context with the built-in backends registered.
    pub fn new() -> Self {
        Context {
            backends: vec![Box::new(MemStoreBackend)],
            missing_revoke_ok: false,
            last_error: Mutex::new(None),
        }
    }

    /// Registers an additional store backend.
    pub fn register_store_backend(&mut self, backend: Box<dyn StoreBackend>) {
        self.backends.push(backend)
    }

    /// Sets whether missing revocation data is acceptable.
    ///
    /// Revocation backends consult this switch when they have no data for
    /// a certificate they are asked about.
    pub fn set_missing_revoke(&mut self, flag: bool) {
        self.missing_revoke_ok = flag
    }

    /// Returns whether missing revocation data is acceptable.
    pub fn missing_revoke_ok(&self) -> bool {
        self.missing_revoke_ok
    }

    /// Returns the diagnostic string of the most recent failure.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Remembers the diagnostic of an error.
    pub(crate) fn remember_error(&self, err: &Error) {
        let mut last = self.last_error.lock().unwrap();
        *last = Some(err.to_string());
    }

    /// Drops the remembered diagnostic.
    pub(crate) fn clear_error(&self) {
        let mut last = self.last_error.lock().unwrap();
        *last = None;
    }

    /// Opens a certificate store for the given URI.
    pub(crate) fn open_store(&self, uri: &str) -> Result<Certs, Error> {
        let (scheme, rest) = match uri.split_once(':') {
            Some(parts) => parts,
            None => (uri, ""),
        };
        for backend in &self.backends {
            if backend.scheme().eq_ignore_ascii_case(scheme) {
                return backend.open(rest)
            }
        }
        Err(Error::new(
            Code::StoreUnsupported,
            format!("No store backend for '{}'", uri)
        ))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_store_is_registered() {
        let context = Context::new();
        assert!(Certs::open(&context, "MEMORY:test").is_ok());
        assert_eq!(
            Certs::open(&context, "PKCS11:module").unwrap_err().code(),
            Code::StoreUnsupported
        );
    }

    #[test]
    fn last_error_tracking() {
        let context = Context::new();
        assert_eq!(context.last_error(), None);
        context.remember_error(
            &Error::new(Code::IssuerNotFound, "no issuer for CN=leaf")
        );
        assert_eq!(
            context.last_error().unwrap(), "no issuer for CN=leaf"
        );
        context.clear_error();
        assert_eq!(context.last_error(), None);
    }
}

//! Certificate stores.
//!
//! The engine only ever talks to certificate collections through the
//! [`CertStore`] trait: iterate, query, add and merge. The shared handle
//! type [`Certs`] wraps a store behind reference counting so that callers,
//! verification contexts and working sets can hold the same store without
//! ownership gymnastics.
//!
//! The one backend this crate ships is the memory store, reachable through
//! URIs of the form `MEMORY:<tag>`. Further backends register themselves on
//! the [`Context`][crate::context::Context] through [`StoreBackend`].

use std::fmt;
use std::sync::{Arc, Mutex};
use crate::cert::Cert;
use crate::context::Context;
use crate::error::{Code, Error};
use crate::query::Query;


//------------ CertStore -----------------------------------------------------

/// A collection of certificates.
pub trait CertStore: Send + Sync {
    /// Returns the first certificate matching the query.
    ///
    /// The returned handle is the caller's own reference. Returns an
    /// error with [`Code::NotFound`] when nothing matches.
    fn find(&self, context: &Context, query: &Query) -> Result<Cert, Error>;

    /// Adds a certificate to the store.
    fn add(&self, cert: Cert) -> Result<(), Error>;

    /// Returns a snapshot of all certificates in the store.
    fn iter_certs(&self) -> Vec<Cert>;

    /// Copies all certificates of another store into this one.
    fn merge_from(&self, other: &dyn CertStore) -> Result<(), Error> {
        for cert in other.iter_certs() {
            self.add(cert)?;
        }
        Ok(())
    }
}


//------------ StoreBackend --------------------------------------------------

/// A factory for stores of one URI scheme.
pub trait StoreBackend: Send + Sync {
    /// The URI scheme this backend serves, e.g. `"MEMORY"`.
    fn scheme(&self) -> &str;

    /// Opens the store described by the part of the URI after the scheme.
    fn open(&self, rest: &str) -> Result<Certs, Error>;
}


//------------ Certs ---------------------------------------------------------

/// A shared handle to a certificate store.
#[derive(Clone)]
pub struct Certs(Arc<dyn CertStore>);

impl Certs {
    /// Opens a store via the backends registered on the context.
    pub fn open(context: &Context, uri: &str) -> Result<Self, Error> {
        context.open_store(uri)
    }

    /// Creates a fresh memory store with the given tag.
    pub fn memory(tag: &str) -> Self {
        Certs(Arc::new(MemStore::new(tag)))
    }

    /// Wraps an existing store implementation.
    pub fn from_store(store: Arc<dyn CertStore>) -> Self {
        Certs(store)
    }

    /// Returns the first certificate matching the query.
    pub fn find(
        &self, context: &Context, query: &Query
    ) -> Result<Cert, Error> {
        self.0.find(context, query)
    }

    /// Adds a certificate to the store.
    pub fn add(&self, cert: Cert) -> Result<(), Error> {
        self.0.add(cert)
    }

    /// Copies all certificates of another store into this one.
    pub fn merge(&self, other: &Certs) -> Result<(), Error> {
        self.0.merge_from(other.0.as_ref())
    }

    /// Returns a snapshot of all certificates in the store.
    pub fn iter_certs(&self) -> Vec<Cert> {
        self.0.iter_certs()
    }
}

impl fmt::Debug for Certs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Certs(..)")
    }
}


//------------ MemStore ------------------------------------------------------

/// The memory-backed certificate store.
pub struct MemStore {
    /// The tag the store was created under.
    tag: String,

    /// The certificates.
    certs: Mutex<Vec<Cert>>,
}

impl MemStore {
    /// Creates an empty memory store with the given tag.
    pub fn new(tag: &str) -> Self {
        MemStore {
            tag: tag.into(),
            certs: Mutex::new(Vec::new()),
        }
    }

    /// Returns the tag of the store.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl CertStore for MemStore {
    fn find(&self, context: &Context, query: &Query) -> Result<Cert, Error> {
        let certs = self.certs.lock().unwrap();
        for cert in certs.iter() {
            if query.matches_cert(context, cert) {
                return Ok(cert.clone())
            }
        }
        Err(Error::new(
            Code::NotFound,
            format!("No matching certificate in store '{}'", self.tag)
        ))
    }

    fn add(&self, cert: Cert) -> Result<(), Error> {
        self.certs.lock().unwrap().push(cert);
        Ok(())
    }

    fn iter_certs(&self) -> Vec<Cert> {
        self.certs.lock().unwrap().clone()
    }
}


//------------ MemStoreBackend -----------------------------------------------

/// The backend for `MEMORY:` URIs.
pub struct MemStoreBackend;

impl StoreBackend for MemStoreBackend {
    fn scheme(&self) -> &str {
        "MEMORY"
    }

    fn open(&self, rest: &str) -> Result<Certs, Error> {
        Ok(Certs::memory(rest))
    }
}


//============ Tests =========================================================

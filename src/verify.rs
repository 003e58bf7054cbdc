//! Certificate path verification.
//!
//! This module contains the engine proper: the [`VerifyCtx`] configuration
//! object, the [`Path`] type, the path builder [`calculate_path`], the
//! name-constraint machinery and the top-level [`VerifyCtx::verify_path`]
//! which ties everything together.
//!
//! Verification proceeds in fixed stages. The path is built from the leaf
//! towards a trust anchor first. A forward pass then classifies each
//! certificate as proxy, end entity or CA and applies the structural
//! checks for its class together with the validity window. A backward
//! pass evaluates name constraints in the order the issuing CAs published
//! them. Revocation, when configured, runs next, and signature
//! verification runs last so that structural failures surface before any
//! cryptography is attempted.

use std::{fmt, ops};
use log::debug;
use crate::cert::Cert;
use crate::context::Context;
use crate::crypto;
use crate::error::{Code, Error};
use crate::ext;
use crate::ext::{GeneralName, GeneralSubtree, NameConstraints};
use crate::name::Name;
use crate::oid;
use crate::query::Query;
use crate::revoke::Revoke;
use crate::store::Certs;
use crate::x509::{Certificate, Time};


//------------ Constants -----------------------------------------------------

/// The maximum chain length used when none is configured.
pub const DEFAULT_MAX_DEPTH: u32 = 30;


//------------ VerifyCtx -----------------------------------------------------

/// The configuration of a verification.
///
/// A fresh context has no trust anchors, no revocation backend, no fixed
/// verification time, the default maximum depth and all switches off.
/// A context can be reused for any number of verifications.
#[derive(Clone, Default)]
pub struct VerifyCtx {
    /// The trust anchor store.
    anchors: Option<Certs>,

    /// The revocation backend.
    revoke: Option<Revoke>,

    /// The verification time. `None` defers to the wall clock.
    time_now: Option<Time>,

    /// The maximum chain length. Zero falls back to the default.
    max_depth: u32,

    /// Whether proxy certificates are acceptable.
    allow_proxy: bool,

    /// Whether RFC 3280 requires extensions to actually be present.
    require_rfc3280: bool,

    /// Whether trust anchors get their validity window checked too.
    check_trust_anchors: bool,
}

impl VerifyCtx {
    /// Creates a fresh verification context.
    pub fn new() -> Self {
        VerifyCtx {
            max_depth: DEFAULT_MAX_DEPTH,
            .. Default::default()
        }
    }

    /// Attaches the trust anchor store.
    pub fn attach_anchors(&mut self, anchors: Certs) {
        self.anchors = Some(anchors);
    }

    /// Attaches a revocation backend.
    pub fn attach_revoke(&mut self, revoke: Revoke) {
        self.revoke = Some(revoke);
    }

    /// Fixes the verification time.
    ///
    /// Without a fixed time, the wall clock is captured when verification
    /// starts.
    pub fn set_time(&mut self, time: Time) {
        self.time_now = Some(time);
    }

    /// Returns the fixed verification time, if one is set.
    pub fn time(&self) -> Option<Time> {
        self.time_now
    }

    /// Sets the maximum chain length.
    pub fn set_max_depth(&mut self, max_depth: u32) {
        self.max_depth = max_depth;
    }

    /// Sets whether proxy certificates are acceptable.
    pub fn set_proxy_certificate(&mut self, allow: bool) {
        self.allow_proxy = allow;
    }

    /// Sets whether strict RFC 3280 verification is in effect.
    pub fn set_strict_rfc3280_verification(&mut self, strict: bool) {
        self.require_rfc3280 = strict;
    }

    /// Sets whether trust anchors get their validity window checked.
    ///
    /// Anchors are transported out of band, so their expiry is ignored
    /// by default.
    pub fn set_check_trust_anchors(&mut self, check: bool) {
        self.check_trust_anchors = check;
    }
}

impl fmt::Debug for VerifyCtx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerifyCtx")
            .field("anchors", &self.anchors)
            .field("revoke", &self.revoke.is_some())
            .field("time_now", &self.time_now)
            .field("max_depth", &self.max_depth)
            .field("allow_proxy", &self.allow_proxy)
            .field("require_rfc3280", &self.require_rfc3280)
            .field("check_trust_anchors", &self.check_trust_anchors)
            .finish()
    }
}

/// # Verification
impl VerifyCtx {
    /// Verifies the certificate chain leading up from `cert`.
    ///
    /// Builds a path from `cert` through `pool` towards the attached
    /// trust anchors and applies the full rule set to it. On success the
    /// built path is returned, leaf first. On failure nothing is
    /// retained; the error names the first check that failed and the
    /// context remembers its diagnostic.
    pub fn verify_path(
        &self,
        context: &Context,
        cert: &Cert,
        pool: Option<&Certs>,
    ) -> Result<Path, Error> {
        context.clear_error();
        let res = self.verify_path_inner(context, cert, pool);
        if let Err(ref err) = res {
            context.remember_error(err);
        }
        res
    }

    fn verify_path_inner(
        &self,
        context: &Context,
        cert: &Cert,
        pool: Option<&Certs>,
    ) -> Result<Path, Error> {
        let time_now = self.time_now.unwrap_or_else(Time::now);

        let path = calculate_path(
            context, false, time_now, self.anchors.as_ref(),
            self.max_depth, cert, pool,
        ).map_err(Error::from)?;
        debug!(
            "verifying path of {} certificates for {}",
            path.len(), cert.subject()
        );

        // Forward pass: classify every certificate and check the
        // structural rules of its class and its validity window.
        let mut certtype = if self.allow_proxy {
            CertType::Proxy
        }
        else {
            CertType::Ee
        };
        let mut proxy_issuer: Option<Name> = None;
        let mut proxy_depth = 0;

        for i in 0..path.len() {
            let c = path[i].certificate();
            let mut is_proxy = false;

            if certtype == CertType::Proxy {
                match ext::find_proxy_cert_info(c) {
                    Ok(info) => {
                        is_proxy = true;
                        self.check_proxy_cert(
                            c, &info, i, proxy_depth, &mut proxy_issuer
                        )?;
                    }
                    Err(_) => {
                        // The proxies are over; this certificate is the
                        // end entity.
                        certtype = CertType::Ee;
                    }
                }
            }

            match certtype {
                CertType::Ca => {
                    ext::check_key_usage(
                        c, ext::KU_KEY_CERT_SIGN, self.require_rfc3280
                    ).map_err(|err| {
                        err.annotate("Key usage missing from CA certificate")
                    })?;
                }
                CertType::Ee => {
                    if proxy_depth > 0 {
                        // The first non-proxy certificate must carry the
                        // base name the proxies were derived from.
                        let base = match proxy_issuer.as_ref() {
                            Some(base) if *base == *c.subject() => {
                                base.clone()
                            }
                            _ => {
                                return Err(Error::new(
                                    Code::ProxyCertNameWrong,
                                    "Proxy base name does not match \
                                     end entity"
                                ))
                            }
                        };
                        cert.set_base_name(base);
                    }
                }
                CertType::Proxy => { }
            }

            check_basic_constraints(c, certtype, i - proxy_depth)?;

            // Trust anchors are transported out of band; their expiry
            // only matters when explicitly requested.
            if i + 1 != path.len() || self.check_trust_anchors {
                if c.validity().not_before() > time_now {
                    return Err(Error::new(
                        Code::CertUsedBeforeTime,
                        format!(
                            "Certificate {} not yet valid", c.subject()
                        )
                    ))
                }
                if c.validity().not_after() < time_now {
                    return Err(Error::new(
                        Code::CertUsedAfterTime,
                        format!(
                            "Certificate {} no longer valid", c.subject()
                        )
                    ))
                }
            }

            if certtype == CertType::Ee {
                certtype = CertType::Ca;
            }
            else if is_proxy {
                proxy_depth += 1;
            }
        }

        // Backward pass: evaluate name constraints in the order the CAs
        // published them, anchor first.
        let mut constraints = NameConstraintSet::new();
        for i in (0..path.len()).rev() {
            let c = path[i].certificate();
            if !path[i].is_self_signed() || i == path.len() - 1 {
                constraints.check(c)?;
            }
            constraints.add(c, i == 0)?;
        }

        // Revocation runs over a working set of the path and the pool so
        // backends can locate signers of revocation data.
        if let Some(ref revoke) = self.revoke {
            let certs = Certs::memory("revoke-certs");
            for item in path.iter() {
                certs.add(item.clone())?;
            }
            if let Some(pool) = pool {
                certs.merge(pool)?;
            }
            for i in 0..path.len().saturating_sub(1) {
                revoke.verify(
                    context, &certs, time_now, &path[i], &path[i + 1]
                )?;
            }
        }

        // Signatures last, so that structural errors surface first. The
        // anchor only verifies against itself when it is self-signed.
        for i in (0..path.len()).rev() {
            let c = path[i].certificate();
            let signer = if i == path.len() - 1 {
                if !path[i].is_self_signed() {
                    continue
                }
                &path[i]
            }
            else {
                &path[i + 1]
            };
            crypto::verify_signature(
                context,
                Some(signer),
                c.signature_algorithm(),
                c.tbs_raw(),
                c.signature_value().octet_slice().unwrap_or(&[]),
            ).map_err(|err| {
                err.annotate("Failed to verify signature of certificate")
            })?;
        }

        Ok(path)
    }

    /// Checks the rules for one proxy certificate in the chain.
    fn check_proxy_cert(
        &self,
        c: &Certificate,
        info: &ext::ProxyCertInfo,
        index: usize,
        proxy_depth: usize,
        proxy_issuer: &mut Option<Name>,
    ) -> Result<(), Error> {
        if let Some(limit) = info.path_len_constraint() {
            if (limit as usize) < index {
                return Err(Error::new(
                    Code::PathTooLong,
                    "Proxy certificate chain longer than allowed"
                ))
            }
        }

        let mut cursor = 0;
        if c.find_extension(
            &oid::CE_SUBJECT_ALT_NAME, &mut cursor
        ).is_some() {
            return Err(Error::new(
                Code::ProxyCertInvalid,
                "Proxy certificate has explicitly forbidden subjectAltName"
            ))
        }
        cursor = 0;
        if c.find_extension(
            &oid::CE_ISSUER_ALT_NAME, &mut cursor
        ).is_some() {
            return Err(Error::new(
                Code::ProxyCertInvalid,
                "Proxy certificate has explicitly forbidden issuerAltName"
            ))
        }

        // The subject must be the accumulated base name with one CN
        // appended; the base name carries over the whole proxy chain.
        if proxy_depth > 0 {
            match proxy_issuer.as_ref() {
                Some(expected) if *expected == *c.subject() => { }
                _ => {
                    return Err(Error::new(
                        Code::ProxyCertNameWrong, "Base proxy name not right"
                    ))
                }
            }
        }

        let subject = c.subject();
        if subject.rdns().len() < 2
            || !subject.last_rdn().map_or(false, |rdn| rdn.is_single_cn())
        {
            return Err(Error::new(
                Code::ProxyCertNameWrong,
                "Proxy name too short or does not have common name \
                 at the top"
            ))
        }
        let stripped = subject.without_last_rdn();
        if stripped != *c.issuer() {
            return Err(Error::new(
                Code::ProxyCertNameWrong,
                "Proxy issuer name not as expected"
            ))
        }
        *proxy_issuer = Some(stripped);
        Ok(())
    }
}


//------------ CertType ------------------------------------------------------

/// The classification of a certificate within a chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CertType {
    Proxy,
    Ee,
    Ca,
}


//------------ Path ----------------------------------------------------------

/// An ordered certificate chain.
///
/// Index 0 is the leaf; the last element is the trust anchor or, for a
/// chain built without a matching anchor, the highest certificate found.
/// The path holds its own reference to every certificate.
#[derive(Clone, Debug, Default)]
pub struct Path {
    certs: Vec<Cert>,
}

impl Path {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a certificate to the path.
    pub fn push(&mut self, cert: Cert) {
        self.certs.push(cert)
    }

    /// Removes and returns the last certificate of the path.
    pub fn pop(&mut self) -> Option<Cert> {
        self.certs.pop()
    }

    /// Returns the number of certificates in the path.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Returns the leaf certificate.
    pub fn leaf(&self) -> Option<&Cert> {
        self.certs.first()
    }

    /// Returns the highest certificate of the path.
    pub fn last(&self) -> Option<&Cert> {
        self.certs.last()
    }

    /// Returns an iterator over the certificates, leaf first.
    pub fn iter(&self) -> std::slice::Iter<Cert> {
        self.certs.iter()
    }

    /// Returns whether an equal certificate is already on the path.
    pub fn contains(&self, cert: &Cert) -> bool {
        self.certs.iter().any(|item| item == cert)
    }
}

impl ops::Index<usize> for Path {
    type Output = Cert;

    fn index(&self, index: usize) -> &Cert {
        &self.certs[index]
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Cert;
    type IntoIter = std::slice::Iter<'a, Cert>;

    fn into_iter(self) -> Self::IntoIter {
        self.certs.iter()
    }
}


//------------ PathError -----------------------------------------------------

/// A failure to build a path.
///
/// Carries the partial path built up to the failure so callers can see
/// how far linking got. The partial path is diagnostic only; it has not
/// been verified in any way.
#[derive(Debug)]
pub struct PathError {
    /// The actual error.
    pub error: Error,

    /// The partial path built before the error occurred.
    pub path: Path,
}

impl From<PathError> for Error {
    fn from(err: PathError) -> Self {
        err.error
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for PathError { }


//------------ calculate_path ------------------------------------------------

/// Builds a certificate chain from `cert` towards a trust anchor.
///
/// Parents come from `pool` first, preferring certificates valid at
/// `time_now` and falling back to expired ones, then from the anchor
/// store. A certificate never appears twice and the chain never exceeds
/// `max_depth` elements (zero selects the default). With `no_anchor`,
/// a trailing trust anchor is removed from the result.
///
/// Without a matching anchor the chain is extended optimistically until
/// no parent can be found, at which point the error carries the partial
/// chain for diagnostics.
pub fn calculate_path(
    context: &Context,
    no_anchor: bool,
    time_now: Time,
    anchors: Option<&Certs>,
    max_depth: u32,
    cert: &Cert,
    pool: Option<&Certs>,
) -> Result<Path, PathError> {
    let max_depth = if max_depth == 0 { DEFAULT_MAX_DEPTH } else { max_depth };

    let mut path = Path::new();
    path.push(cert.clone());

    let mut current = cert.clone();
    while !certificate_is_anchor(context, anchors, &current) {
        let parent = match find_parent(
            context, time_now, anchors, &path, pool, &current
        ) {
            Ok(parent) => parent,
            Err(error) => return Err(PathError { error, path }),
        };
        debug!("found issuer {} for {}", parent.subject(), current.subject());
        path.push(parent.clone());
        current = parent;

        if path.len() > max_depth as usize {
            return Err(PathError {
                error: Error::new(
                    Code::PathTooLong,
                    "Path too long while building certificate chain"
                ),
                path,
            })
        }
    }

    if no_anchor && !path.is_empty() {
        let is_anchor = match path.last() {
            Some(last) => certificate_is_anchor(context, anchors, last),
            None => false,
        };
        if is_anchor {
            path.pop();
        }
    }

    Ok(path)
}

/// Returns whether the certificate is one of the trust anchors.
fn certificate_is_anchor(
    context: &Context,
    anchors: Option<&Certs>,
    cert: &Cert,
) -> bool {
    let anchors = match anchors {
        Some(anchors) => anchors,
        None => return false,
    };
    let mut query = Query::new();
    query.match_certificate(cert.clone());
    anchors.find(context, &query).is_ok()
}

/// Finds the issuer of `current` in the pool or the anchor store.
fn find_parent(
    context: &Context,
    time_now: Time,
    anchors: Option<&Certs>,
    path: &Path,
    pool: Option<&Certs>,
    current: &Cert,
) -> Result<Cert, Error> {
    let mut query = Query::new();

    if !current.subject().is_empty() {
        query.find_issuer(current.clone());
    }
    else {
        // A subjectless certificate can only be linked through its
        // authority key identifier.
        let aki = ext::find_authority_key_id(current.certificate())
            .map_err(|_| {
                Error::new(
                    Code::CertificateMalformed,
                    "Subjectless certificate missing AuthKeyID"
                )
            })?;
        let key_id = match aki.key_identifier() {
            Some(key_id) => key_id.clone(),
            None => {
                return Err(Error::new(
                    Code::CertificateMalformed,
                    "Subjectless certificate missing keyIdentifier \
                     inside AuthKeyID"
                ))
            }
        };
        query.match_subject_key_id(key_id);
    }

    query.exclude_path(path);

    if let Some(pool) = pool {
        query.match_time(time_now);
        if let Ok(parent) = pool.find(context, &query) {
            return Ok(parent)
        }
        query.clear_time();
        if let Ok(parent) = pool.find(context, &query) {
            return Ok(parent)
        }
    }

    if let Some(anchors) = anchors {
        if let Ok(parent) = anchors.find(context, &query) {
            return Ok(parent)
        }
    }

    Err(Error::new(
        Code::IssuerNotFound,
        format!(
            "Failed to find issuer for certificate with subject: {}",
            current.subject()
        )
    ))
}


//------------ check_basic_constraints ---------------------------------------

/// Checks the basic constraints of a certificate against its class.
///
/// `depth` is the position of the certificate in the chain not counting
/// proxy certificates.
fn check_basic_constraints(
    cert: &Certificate,
    certtype: CertType,
    depth: usize,
) -> Result<(), Error> {
    if cert.version() < 3 {
        return Ok(())
    }
    let bc = match ext::find_basic_constraints(cert) {
        Ok(bc) => bc,
        Err(err) => {
            if err.code() != Code::ExtensionNotFound {
                return Err(err)
            }
            return match certtype {
                CertType::Proxy | CertType::Ee => Ok(()),
                CertType::Ca => {
                    Err(Error::new(
                        Code::ExtensionNotFound,
                        format!(
                            "basicConstraints missing from CA \
                             certificate {}",
                            cert.subject()
                        )
                    ))
                }
            }
        }
    };
    match certtype {
        CertType::Proxy => {
            if bc.ca() {
                return Err(Error::new(
                    Code::ParentIsCa,
                    "Proxy certificate must not be a CA"
                ))
            }
        }
        CertType::Ee => { }
        CertType::Ca => {
            if !bc.ca() {
                return Err(Error::new(
                    Code::ParentNotCa,
                    format!("Issuer {} is not a CA", cert.subject())
                ))
            }
            if let Some(limit) = bc.path_len_constraint() {
                if depth as i64 - 1 > limit as i64 {
                    return Err(Error::new(
                        Code::CaPathTooDeep,
                        format!(
                            "Path length constraint of {} exceeded",
                            cert.subject()
                        )
                    ))
                }
            }
        }
    }
    Ok(())
}


//------------ NameConstraintSet ---------------------------------------------

/// The name constraints accumulated while walking a chain.
///
/// Constraints are appended as the walk descends from the anchor towards
/// the leaf; every certificate is checked against everything its issuers
/// published before its own constraints are added.
#[derive(Clone, Debug, Default)]
pub struct NameConstraintSet {
    constraints: Vec<NameConstraints>,
}

impl NameConstraintSet {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the name constraints of a certificate, if it has any.
    ///
    /// Name constraints on a certificate that cannot issue (`not_ca`)
    /// are an error.
    pub fn add(
        &mut self, cert: &Certificate, not_ca: bool
    ) -> Result<(), Error> {
        let constraints = match ext::find_name_constraints(cert) {
            Ok(constraints) => constraints,
            Err(err) => {
                if err.code() == Code::ExtensionNotFound {
                    return Ok(())
                }
                return Err(err.annotate("Failed getting NameConstraints"))
            }
        };
        if not_ca {
            return Err(Error::new(
                Code::VerifyConstraints,
                "Not a CA and have NameConstraints"
            ))
        }
        self.constraints.push(constraints);
        Ok(())
    }

    /// Checks a certificate against every accumulated constraint.
    pub fn check(&self, cert: &Certificate) -> Result<(), Error> {
        for constraints in &self.constraints {
            if let Some(permitted) = constraints.permitted() {
                let matched = match_tree(permitted, cert)?.permitted();
                // A null subject cannot match anything; such
                // certificates are exempt from permitted subtrees.
                if !matched && !cert.subject().is_empty() {
                    return Err(Error::new(
                        Code::VerifyConstraints,
                        format!(
                            "Certificate {} outside permitted subtrees",
                            cert.subject()
                        )
                    ))
                }
            }
            if let Some(excluded) = constraints.excluded() {
                if match_tree(excluded, cert)?.excluded() {
                    return Err(Error::new(
                        Code::VerifyConstraints,
                        format!(
                            "Certificate {} inside excluded subtrees",
                            cert.subject()
                        )
                    ))
                }
            }
        }
        Ok(())
    }

    /// Returns the number of accumulated constraint values.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns whether no constraints have accumulated.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// The outcome of evaluating a subtree list against a certificate.
#[derive(Clone, Copy, Debug)]
struct TreeMatch {
    /// The subject name matched a directoryName base.
    name: bool,

    /// Some alternative name shares its kind with some base.
    same: bool,

    /// Some alternative name matched a base of its kind.
    alt_name: bool,
}

impl TreeMatch {
    /// The match rule for permitted subtrees.
    ///
    /// The subject must match, and when the certificate has alternative
    /// names of a constrained kind, one of them must match as well.
    fn permitted(self) -> bool {
        self.name && (!self.same || self.alt_name)
    }

    /// The match rule for excluded subtrees: a match on any ground.
    fn excluded(self) -> bool {
        self.name || self.alt_name
    }
}

/// Evaluates one subtree list against a certificate.
fn match_tree(
    subtrees: &[GeneralSubtree], cert: &Certificate
) -> Result<TreeMatch, Error> {
    let mut name = false;
    let mut alt_name = false;
    let mut same = false;

    for subtree in subtrees {
        if subtree.minimum() != 0 || subtree.maximum().is_some() {
            return Err(Error::new(
                Code::Range,
                "Name constraint minimum/maximum not supported"
            ))
        }

        // Directory name constraints apply to the subject name, provided
        // the certificate has one. A failed comparison simply does not
        // match.
        if let GeneralName::DirectoryName(_) = *subtree.base() {
            if !cert.subject().is_empty() {
                let certname
                    = GeneralName::DirectoryName(cert.subject().clone());
                if let Ok(true)
                    = match_general_name(subtree.base(), &certname)
                {
                    name = true;
                }
            }
        }

        // Alternative names only constrain entries of their own kind, so
        // track whether the certificate has any entry of the same kind
        // at all.
        match_alt_name(subtree.base(), cert, &mut same, &mut alt_name)?;
    }

    Ok(TreeMatch { name, same, alt_name })
}

/// Evaluates a constraint base against the subject alternative names.
fn match_alt_name(
    base: &GeneralName,
    cert: &Certificate,
    same: &mut bool,
    alt_name: &mut bool,
) -> Result<(), Error> {
    let mut cursor = 0;
    loop {
        let names = match ext::find_subject_alt_name(cert, &mut cursor) {
            Ok(names) => names,
            Err(err) => {
                if err.code() == Code::ExtensionNotFound {
                    return Ok(())
                }
                return Err(err)
            }
        };
        for entry in &names {
            if base.same_variant(entry) {
                *same = true;
                if match_general_name(base, entry)? {
                    *alt_name = true;
                }
            }
        }
    }
}

/// Decides whether a name falls under a constraint base of the same kind.
///
/// Constraint kinds the engine cannot evaluate are a hard error rather
/// than a silent accept.
fn match_general_name(
    base: &GeneralName, name: &GeneralName
) -> Result<bool, Error> {
    match (base, name) {
        (
            GeneralName::OtherName { type_id: base_id, value: base_value },
            GeneralName::OtherName { type_id, value },
        ) => {
            Ok(*base_id == *type_id
                && AsRef::<[u8]>::as_ref(base_value) == AsRef::<[u8]>::as_ref(value))
        }
        (
            GeneralName::Rfc822Name(base),
            GeneralName::Rfc822Name(name),
        ) => Ok(match_rfc822(base, name)),
        (
            GeneralName::DnsName(base),
            GeneralName::DnsName(name),
        ) => Ok(match_dns_suffix(base, name)),
        (
            GeneralName::DirectoryName(base),
            GeneralName::DirectoryName(name),
        ) => Ok(base.is_prefix_of(name)),
        _ => {
            if !base.same_variant(name) {
                return Ok(false)
            }
            Err(Error::new(
                Code::NameConstraintError,
                "Unsupported name constraint type"
            ))
        }
    }
}

/// Matches an rfc822Name constraint.
///
/// A constraint containing `@` must equal the whole address; otherwise it
/// is a domain suffix of the address's host part, aligned to a label
/// boundary when it is shorter than the host.
fn match_rfc822(base: &str, name: &str) -> bool {
    if base.contains('@') {
        return base.eq_ignore_ascii_case(name)
    }
    let host = match name.split_once('@') {
        Some((_, host)) => host,
        None => return false,
    };
    if base.len() > host.len() {
        return false
    }
    if !ends_with_caseless(host, base) {
        return false
    }
    if base.len() < host.len()
        && host.as_bytes()[host.len() - base.len() - 1] != b'.'
    {
        return false
    }
    true
}

/// Matches a dNSName constraint: a case-insensitive suffix.
fn match_dns_suffix(base: &str, name: &str) -> bool {
    base.len() <= name.len() && ends_with_caseless(name, base)
}

/// Returns whether `name` ends in `suffix` ignoring ASCII case.
fn ends_with_caseless(name: &str, suffix: &str) -> bool {
    let name = name.as_bytes();
    let suffix = suffix.as_bytes();
    name.len() >= suffix.len()
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}


//------------ verify_hostname -----------------------------------------------

/// Checks whether a certificate is valid for a host name.
///
/// This is currently a permissive placeholder that accepts every
/// non-empty name.
//
// TODO: implement RFC 6125 matching against dNSName entries and the
// subject CN; callers relying on this must pin peers through the anchor
// set until then.
pub fn verify_hostname(
    context: &Context,
    _cert: &Cert,
    _require_match: bool,
    hostname: &str,
) -> Result<(), Error> {
    if hostname.is_empty() {
        let err = Error::new(Code::InvalidArgument, "Empty hostname");
        context.remember_error(&err);
        return Err(err)
    }
    Ok(())
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;
    use crate::test;
    use crate::x509::Serial;

    fn verify_ctx(anchors: &Certs) -> VerifyCtx {
        let mut ctx = VerifyCtx::new();
        ctx.attach_anchors(anchors.clone());
        ctx.set_time(test::in_window());
        ctx
    }

    fn anchor_store(anchor: &Cert) -> Certs {
        let certs = Certs::memory("anchors");
        certs.add(anchor.clone()).unwrap();
        certs
    }

    fn pool_of(certs: &[&Cert]) -> Certs {
        let pool = Certs::memory("pool");
        for cert in certs {
            pool.add((*cert).clone()).unwrap();
        }
        pool
    }

    #[test]
    fn self_signed_anchor_only() {
        let context = Context::new();
        let anchor = test::ca_cert("Alpha CA");
        let anchors = anchor_store(&anchor);
        let ctx = verify_ctx(&anchors);
        let path = ctx.verify_path(&context, &anchor, None).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0], anchor);
    }

    #[test]
    fn two_hop_chain() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);
        let ctx = verify_ctx(&anchors);
        let path
            = ctx.verify_path(&context, &chain.leaf, Some(&pool)).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], chain.leaf);
        assert_eq!(path[1], chain.inter);
        assert_eq!(path[2], chain.anchor);
        // Deterministic: a second run yields the same path.
        let again
            = ctx.verify_path(&context, &chain.leaf, Some(&pool)).unwrap();
        assert_eq!(again.len(), 3);
        assert!(path.iter().zip(again.iter()).all(|(a, b)| a == b));
    }

    #[test]
    fn expired_leaf() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);
        let mut ctx = verify_ctx(&anchors);
        ctx.set_time(test::after_window());
        assert_eq!(
            ctx.verify_path(&context, &chain.leaf, Some(&pool))
                .unwrap_err().code(),
            Code::CertUsedAfterTime
        );
        assert!(context.last_error().is_some());

        ctx.set_time(test::before_window());
        assert_eq!(
            ctx.verify_path(&context, &chain.leaf, Some(&pool))
                .unwrap_err().code(),
            Code::CertUsedBeforeTime
        );
    }

    #[test]
    fn missing_issuer() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        // The intermediate is nowhere to be found.
        let ctx = verify_ctx(&anchors);
        let err = calculate_path(
            &context, false, test::in_window(), Some(&anchors),
            0, &chain.leaf, None,
        ).unwrap_err();
        assert_eq!(err.error.code(), Code::IssuerNotFound);
        assert_eq!(err.path.len(), 1);
        assert_eq!(err.path[0], chain.leaf);
        assert_eq!(
            ctx.verify_path(&context, &chain.leaf, None)
                .unwrap_err().code(),
            Code::IssuerNotFound
        );
    }

    #[test]
    fn path_too_long() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);
        let mut ctx = verify_ctx(&anchors);
        ctx.set_max_depth(1);
        assert_eq!(
            ctx.verify_path(&context, &chain.leaf, Some(&pool))
                .unwrap_err().code(),
            Code::PathTooLong
        );
    }

    #[test]
    fn no_anchor_flag_pops_anchor() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);
        let path = calculate_path(
            &context, true, test::in_window(), Some(&anchors),
            0, &chain.leaf, Some(&pool),
        ).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1], chain.inter);
    }

    #[test]
    fn no_duplicates_in_path() {
        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        // The pool also contains the leaf and the anchor; the path must
        // still contain each certificate exactly once.
        let pool = pool_of(&[&chain.leaf, &chain.inter, &chain.anchor]);
        let ctx = verify_ctx(&anchors);
        let path
            = ctx.verify_path(&context, &chain.leaf, Some(&pool)).unwrap();
        assert_eq!(path.len(), 3);
        for i in 0..path.len() {
            for j in i + 1..path.len() {
                assert_ne!(path[i], path[j]);
            }
        }
    }

    #[test]
    fn excluded_name_constraint() {
        let context = Context::new();
        let (anchor, leaf)
            = test::constrained_chain("evil.example", "host.evil.example");
        let anchors = anchor_store(&anchor);
        let ctx = verify_ctx(&anchors);
        assert_eq!(
            ctx.verify_path(&context, &leaf, None).unwrap_err().code(),
            Code::VerifyConstraints
        );

        // A leaf outside the excluded subtree passes.
        let (anchor, leaf)
            = test::constrained_chain("evil.example", "host.good.example");
        let anchors = anchor_store(&anchor);
        let ctx = verify_ctx(&anchors);
        assert!(ctx.verify_path(&context, &leaf, None).is_ok());
    }

    #[test]
    fn empty_constraint_set_accepts_everything() {
        let chain = test::chain3();
        let constraints = NameConstraintSet::new();
        assert!(constraints.is_empty());
        assert!(constraints.check(chain.leaf.certificate()).is_ok());
        assert!(constraints.check(chain.anchor.certificate()).is_ok());
    }

    #[test]
    fn proxy_chain_requires_opt_in() {
        let context = Context::new();
        let chain = test::proxy_chain();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.ee]);

        // Without the proxy switch the end entity gets treated as a CA
        // and fails its checks.
        let ctx = verify_ctx(&anchors);
        assert!(ctx.verify_path(&context, &chain.proxy, Some(&pool)).is_err());

        // With the switch the chain verifies and the proxy learns its
        // base name.
        let mut ctx = verify_ctx(&anchors);
        ctx.set_proxy_certificate(true);
        let path = ctx.verify_path(
            &context, &chain.proxy, Some(&pool)
        ).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(
            chain.proxy.base_subject().unwrap(), *chain.ee.subject()
        );
    }

    #[test]
    fn proxy_path_len_constraint() {
        let context = Context::new();
        let chain = test::proxy_chain_two(Some(0));
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.ee, &chain.proxy]);
        let mut ctx = verify_ctx(&anchors);
        ctx.set_proxy_certificate(true);
        assert_eq!(
            ctx.verify_path(&context, &chain.proxy2, Some(&pool))
                .unwrap_err().code(),
            Code::PathTooLong
        );

        // Without the constraint the two-proxy chain verifies.
        let chain = test::proxy_chain_two(None);
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.ee, &chain.proxy]);
        let mut ctx = verify_ctx(&anchors);
        ctx.set_proxy_certificate(true);
        assert!(
            ctx.verify_path(&context, &chain.proxy2, Some(&pool)).is_ok()
        );
    }

    #[test]
    fn subjectless_leaf_needs_aki() {
        let context = Context::new();
        let chain = test::chain3();
        let leaf = test::subjectless_leaf_without_aki(&chain);
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);
        let ctx = verify_ctx(&anchors);
        assert_eq!(
            ctx.verify_path(&context, &leaf, Some(&pool))
                .unwrap_err().code(),
            Code::CertificateMalformed
        );
    }

    #[test]
    fn revocation_hook_runs_per_link() {
        struct Recorder {
            calls: Mutex<Vec<(Serial, Serial)>>,
            revoked: Option<Serial>,
        }

        impl crate::revoke::RevokeCheck for Recorder {
            fn verify(
                &self,
                _context: &Context,
                certs: &Certs,
                _time: Time,
                cert: &Cert,
                issuer: &Cert,
            ) -> Result<(), Error> {
                // The working set contains at least the whole chain.
                assert!(certs.iter_certs().len() >= 3);
                self.calls.lock().unwrap().push(
                    (cert.serial().clone(), issuer.serial().clone())
                );
                if self.revoked.as_ref() == Some(cert.serial()) {
                    return Err(Error::new(
                        Code::CertRevoked, "certificate is revoked"
                    ))
                }
                Ok(())
            }
        }

        let context = Context::new();
        let chain = test::chain3();
        let anchors = anchor_store(&chain.anchor);
        let pool = pool_of(&[&chain.inter]);

        let recorder = std::sync::Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            revoked: None,
        });
        let mut ctx = verify_ctx(&anchors);
        ctx.attach_revoke(recorder.clone());
        ctx.verify_path(&context, &chain.leaf, Some(&pool)).unwrap();
        {
            let calls = recorder.calls.lock().unwrap();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0].0, *chain.leaf.serial());
            assert_eq!(calls[0].1, *chain.inter.serial());
            assert_eq!(calls[1].0, *chain.inter.serial());
            assert_eq!(calls[1].1, *chain.anchor.serial());
        }

        let revoking = std::sync::Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            revoked: Some(chain.leaf.serial().clone()),
        });
        let mut ctx = verify_ctx(&anchors);
        ctx.attach_revoke(revoking);
        assert_eq!(
            ctx.verify_path(&context, &chain.leaf, Some(&pool))
                .unwrap_err().code(),
            Code::CertRevoked
        );
    }

    #[test]
    fn rfc822_constraint_matching() {
        // Full address constraints must match exactly.
        assert!(match_rfc822("user@example.com", "User@example.com"));
        assert!(!match_rfc822("user@example.com", "other@example.com"));
        // Domain constraints match the host, aligned to label borders.
        assert!(match_rfc822("example.com", "user@example.com"));
        assert!(match_rfc822("example.com", "user@mail.example.com"));
        assert!(!match_rfc822("example.com", "user@notexample.com"));
        assert!(!match_rfc822("example.com", "no-at-sign"));
    }

    #[test]
    fn dns_constraint_matching() {
        assert!(match_dns_suffix("example.com", "example.com"));
        assert!(match_dns_suffix("example.com", "host.EXAMPLE.com"));
        assert!(!match_dns_suffix("long-name.example.com", "example.com"));
        assert!(!match_dns_suffix("example.org", "example.com"));
    }

    #[test]
    fn hostname_stub_is_permissive() {
        let context = Context::new();
        let (_, leaf) = test::ca_and_leaf();
        assert!(
            verify_hostname(&context, &leaf, true, "anything.example")
                .is_ok()
        );
        assert_eq!(
            verify_hostname(&context, &leaf, true, "")
                .unwrap_err().code(),
            Code::InvalidArgument
        );
    }
}

//! Certificate authority: signed attestations bound to container content.
//!
//! A certificate binds the content digest of a container (computed with the
//! `/certificates` subtree excluded) to a signer's key and a timestamp. It is
//! stored inside the same container and can be re-checked at any time:
//!
//! 1. the node name must equal the short digest of the stored payload,
//! 2. the payload's digest must equal the container's current digest,
//! 3. the signature must verify with the public key of the recorded `key_id`,
//!    obtained from the caller's [`KeyResolver`] and nowhere else.
//!
//! A failed check is reported per certificate as data; it is never an `Err`.

pub mod armor;
pub mod certificate;
pub mod keys;

pub use certificate::{
    cert_id_for, list_certificates, CertificatePayload, CertificateRecord, CertificateSummary,
    CERTIFICATES_ROOT, PAYLOAD_VERSION,
};
pub use keys::{
    armor_public_key, key_id_for, verify_detached, Ed25519Signer, KeyResolver, KeyringDir,
    MemoryKeyring, Signer,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::container::{normalize_prefix, Container};
use crate::digest::{digest_with_options, DigestOptions};
use crate::error::{Result, StdFileError};

/// Timestamp layout used for `signed_at`.
pub const SIGNED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Parameters for [`issue_certificate`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Name recorded in the payload
    pub cert_name: String,
    /// Specification tag recorded in the payload
    pub spec: String,
    /// Expected signing key. Defaults to the signer's own key.
    pub key_id: Option<String>,
    /// Subtrees left out of the subject digest. `/certificates` is always added.
    pub exclude_prefixes: Vec<String>,
    /// Drop every existing certificate before storing the new one.
    pub remove_previous: bool,
    /// Fixed timestamp instead of the current time.
    pub signed_at: Option<DateTime<Utc>>,
}

impl IssueRequest {
    /// Request for `cert_name` attesting to `spec`, appending to existing certificates.
    pub fn new(cert_name: &str, spec: &str) -> Self {
        Self {
            cert_name: cert_name.to_string(),
            spec: spec.to_string(),
            key_id: None,
            exclude_prefixes: Vec::new(),
            remove_previous: false,
            signed_at: None,
        }
    }

    /// Builder-style replace-all mode.
    pub fn replacing_previous(mut self) -> Self {
        self.remove_previous = true;
        self
    }
}

/// Outcome of checking one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateVerification {
    /// Node name under `/certificates`
    pub cert_id: String,
    /// Whether every check passed
    pub valid: bool,
    /// Reason of the first failed check
    pub error: Option<String>,
    /// Parsed payload, when it could be parsed
    pub payload: Option<CertificatePayload>,
    /// Digest of the container as it is now
    pub subject_digest: String,
}

impl CertificateVerification {
    fn invalid(
        cert_id: &str,
        error: impl Into<String>,
        payload: Option<CertificatePayload>,
        subject_digest: &str,
    ) -> Self {
        Self {
            cert_id: cert_id.to_string(),
            valid: false,
            error: Some(error.into()),
            payload,
            subject_digest: subject_digest.to_string(),
        }
    }

    /// Name to key reports by: the payload's name, else the cert id.
    pub fn cert_name(&self) -> &str {
        self.payload
            .as_ref()
            .map(|p| p.cert_name.as_str())
            .unwrap_or(&self.cert_id)
    }
}

fn with_certificates_excluded<S: AsRef<str>>(prefixes: &[S]) -> Vec<String> {
    let mut out: Vec<String> = prefixes.iter().map(|p| normalize_prefix(p.as_ref())).collect();
    if !out.iter().any(|p| p == CERTIFICATES_ROOT) {
        out.push(CERTIFICATES_ROOT.to_string());
    }
    out
}

/// Signs the current content of `container` and stores the certificate.
///
/// The signature is produced before anything is modified: if the signer fails,
/// the container is left exactly as it was. Returns the new `cert_id`.
pub fn issue_certificate(
    container: &mut Container,
    request: &IssueRequest,
    signer: &dyn Signer,
) -> Result<String> {
    let key_id = request
        .key_id
        .clone()
        .unwrap_or_else(|| signer.key_id().to_string());
    if !key_id.eq_ignore_ascii_case(signer.key_id()) {
        return Err(StdFileError::signing(format!(
            "requested key_id {} but signer '{}' holds {}",
            key_id,
            signer.identity(),
            signer.key_id()
        )));
    }

    let options = DigestOptions {
        exclude_prefixes: with_certificates_excluded(&request.exclude_prefixes),
        ..DigestOptions::default()
    };
    let subject_digest = digest_with_options(container, &options);
    let signed_at = request.signed_at.unwrap_or_else(Utc::now);

    let payload = CertificatePayload {
        v: PAYLOAD_VERSION,
        cert_name: request.cert_name.clone(),
        spec: request.spec.clone(),
        signed_at: signed_at.format(SIGNED_AT_FORMAT).to_string(),
        key_id,
        subject_digest_sha256: subject_digest,
    };
    let payload_bytes = payload.to_bytes()?;
    let cert_id = cert_id_for(&payload_bytes);
    let signature = signer.sign_detached(&payload_bytes)?;
    let payload_text = String::from_utf8(payload_bytes)?;

    if request.remove_previous {
        if let Some(old) = container.remove(CERTIFICATES_ROOT) {
            log::debug!(
                "[Certificates] Removed {} previous certificate(s)",
                old.as_group().map(|g| g.len()).unwrap_or(0)
            );
        }
    }
    certificate::write_record(container, &cert_id, &payload, &payload_text, &signature)?;

    log::info!(
        "[Certificates] Issued '{}' ({}) signed by {} [{}]",
        payload.cert_name,
        cert_id,
        signer.identity(),
        payload.key_id
    );
    Ok(cert_id)
}

fn verify_one(
    cert_id: &str,
    node: &crate::container::Node,
    current_digest: &str,
    resolver: &dyn KeyResolver,
) -> CertificateVerification {
    let record = match certificate::read_record(cert_id, node) {
        Ok(r) => r,
        Err(reason) => {
            return CertificateVerification::invalid(
                cert_id,
                format!("malformed certificate: {}", reason),
                None,
                current_digest,
            )
        }
    };

    if cert_id_for(record.payload.as_bytes()) != record.cert_id {
        return CertificateVerification::invalid(cert_id, "id mismatch", None, current_digest);
    }

    let payload: CertificatePayload = match serde_json::from_str(&record.payload) {
        Ok(p) => p,
        Err(e) => {
            return CertificateVerification::invalid(
                cert_id,
                format!("malformed payload: {}", e),
                None,
                current_digest,
            )
        }
    };

    if payload.subject_digest_sha256 != current_digest {
        return CertificateVerification::invalid(
            cert_id,
            "content changed since signing",
            Some(payload),
            current_digest,
        );
    }

    let public_key = match resolver.resolve(&payload.key_id) {
        Ok(k) => k,
        Err(e) => {
            log::debug!("[Certificates] Key lookup for {} failed: {}", payload.key_id, e);
            let msg = format!("public key not found for key_id {}", payload.key_id);
            return CertificateVerification::invalid(cert_id, msg, Some(payload), current_digest);
        }
    };

    if let Err(e) = verify_detached(
        &public_key,
        record.payload.as_bytes(),
        &record.signature,
        &payload.key_id,
    ) {
        log::debug!("[Certificates] Signature check for {} failed: {}", cert_id, e);
        return CertificateVerification::invalid(
            cert_id,
            "signature invalid",
            Some(payload),
            current_digest,
        );
    }

    CertificateVerification {
        cert_id: cert_id.to_string(),
        valid: true,
        error: None,
        payload: Some(payload),
        subject_digest: current_digest.to_string(),
    }
}

/// Checks every stored certificate, in cert_id order.
///
/// The subject digest is computed once. Each certificate is checked on its
/// own; one bad certificate does not affect the others.
pub fn verify_certificates_by_id<S: AsRef<str>>(
    container: &Container,
    exclude_prefixes: &[S],
    resolver: &dyn KeyResolver,
) -> Vec<CertificateVerification> {
    let Some(root) = container.group(CERTIFICATES_ROOT) else {
        return Vec::new();
    };
    let options = DigestOptions {
        exclude_prefixes: with_certificates_excluded(exclude_prefixes),
        ..DigestOptions::default()
    };
    let current = digest_with_options(container, &options);
    root.children()
        .map(|(cert_id, node)| verify_one(cert_id, node, &current, resolver))
        .collect()
}

/// Checks every stored certificate and keys the results by `cert_name`.
///
/// Names are not unique: when two certificates share one, the later in
/// cert_id order replaces the earlier in the returned map, and a warning is
/// logged. Use [`verify_certificates_by_id`] to see every certificate.
pub fn verify_certificates<S: AsRef<str>>(
    container: &Container,
    exclude_prefixes: &[S],
    resolver: &dyn KeyResolver,
) -> BTreeMap<String, CertificateVerification> {
    let mut out = BTreeMap::new();
    for result in verify_certificates_by_id(container, exclude_prefixes, resolver) {
        let name = result.cert_name().to_string();
        if let Some(previous) = out.insert(name.clone(), result) {
            log::warn!(
                "[Certificates] cert_name '{}' is used by more than one certificate; {} is shadowed",
                name,
                previous.cert_id
            );
        }
    }
    out
}

/// Removes every certificate. Returns how many were removed.
pub fn remove_certificates(container: &mut Container) -> usize {
    container
        .remove(CERTIFICATES_ROOT)
        .and_then(|node| node.as_group().map(|g| g.len()))
        .unwrap_or(0)
}

//! Certificate records as stored in a container.
//!
//! Layout:
//!
//! ```text
//! /certificates/<cert_id>/payload     utf8 dataset, canonical JSON
//! /certificates/<cert_id>/signature   utf8 dataset, armored signature
//! /certificates/<cert_id>             attrs: cert_name, spec, signed_at,
//!                                     key_id, subject_digest_sha256
//! ```

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_json_bytes;
use crate::container::{join_path, AttrValue, Container, Dataset, Group, Node};
use crate::error::{Result, StdFileError};
use crate::hash::short_hex_digest;

/// Subtree holding every certificate.
pub const CERTIFICATES_ROOT: &str = "/certificates";
/// Payload schema version.
pub const PAYLOAD_VERSION: u32 = 1;

const PAYLOAD_NODE: &str = "payload";
const SIGNATURE_NODE: &str = "signature";

/// The signed statement. Serialized canonically before hashing and signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePayload {
    /// Schema version
    pub v: u32,
    /// Caller-chosen certificate name
    pub cert_name: String,
    /// Specification tag the signer attests to
    pub spec: String,
    /// ISO-8601 timestamp with offset
    pub signed_at: String,
    /// Id of the signing key
    pub key_id: String,
    /// Content digest of the container at signing time
    pub subject_digest_sha256: String,
}

impl CertificatePayload {
    /// Canonical JSON bytes: the exact input to the signature and the cert id.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        canonical_json_bytes(self)
    }
}

/// Short id of a payload: first 32 hex chars of its SHA256.
pub fn cert_id_for(payload_bytes: &[u8]) -> String {
    short_hex_digest(payload_bytes)
}

/// Raw stored certificate, before any checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Id taken from the node name
    pub cert_id: String,
    /// Payload text exactly as stored
    pub payload: String,
    /// Armored signature
    pub signature: String,
}

/// Index entry built from the mirrored group attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    /// Node name under `/certificates`
    pub cert_id: String,
    /// Mirrored `cert_name`
    pub cert_name: Option<String>,
    /// Mirrored `spec`
    pub spec: Option<String>,
    /// Mirrored `signed_at`
    pub signed_at: Option<String>,
    /// Mirrored `key_id`
    pub key_id: Option<String>,
    /// Mirrored `subject_digest_sha256`
    pub subject_digest_sha256: Option<String>,
}

fn text_child(group: &Group, name: &str) -> std::result::Result<String, String> {
    match group.child(name) {
        Some(Node::Dataset(ds)) => ds
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| format!("'{}' is not a text dataset", name)),
        Some(Node::Group(_)) => Err(format!("'{}' is a group", name)),
        None => Err(format!("missing '{}'", name)),
    }
}

/// Reads one certificate node. The error is a human-readable reason.
pub(crate) fn read_record(cert_id: &str, node: &Node) -> std::result::Result<CertificateRecord, String> {
    let group = node
        .as_group()
        .ok_or_else(|| "certificate node is not a group".to_string())?;
    Ok(CertificateRecord {
        cert_id: cert_id.to_string(),
        payload: text_child(group, PAYLOAD_NODE)?,
        signature: text_child(group, SIGNATURE_NODE)?,
    })
}

/// Stores a signed payload under `/certificates/<cert_id>`.
pub(crate) fn write_record(
    container: &mut Container,
    cert_id: &str,
    payload: &CertificatePayload,
    payload_text: &str,
    signature: &str,
) -> Result<()> {
    let path = join_path(CERTIFICATES_ROOT, cert_id);
    if container.contains(&path) {
        return Err(StdFileError::invalid_input(format!(
            "certificate {} already exists",
            cert_id
        )));
    }
    let mut group = Group::new()
        .with_attr("cert_name", payload.cert_name.as_str())
        .with_attr("spec", payload.spec.as_str())
        .with_attr("signed_at", payload.signed_at.as_str())
        .with_attr("key_id", payload.key_id.as_str())
        .with_attr("subject_digest_sha256", payload.subject_digest_sha256.as_str());
    group.insert_child(PAYLOAD_NODE, Dataset::text(payload_text).into())?;
    group.insert_child(SIGNATURE_NODE, Dataset::text(signature).into())?;
    container.insert(&path, group)
}

/// Certificates in cert_id order, from their mirrored attributes only.
pub fn list_certificates(container: &Container) -> Vec<CertificateSummary> {
    let Some(root) = container.group(CERTIFICATES_ROOT) else {
        return Vec::new();
    };
    let attr = |node: &Node, key: &str| node.attrs().get(key).and_then(AttrValue::as_str).map(str::to_string);
    root.children()
        .map(|(cert_id, node)| CertificateSummary {
            cert_id: cert_id.clone(),
            cert_name: attr(node, "cert_name"),
            spec: attr(node, "spec"),
            signed_at: attr(node, "signed_at"),
            key_id: attr(node, "key_id"),
            subject_digest_sha256: attr(node, "subject_digest_sha256"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CertificatePayload {
        CertificatePayload {
            v: PAYLOAD_VERSION,
            cert_name: "qa".into(),
            spec: "ros-bench/1".into(),
            signed_at: "2026-01-02T03:04:05+00:00".into(),
            key_id: "0011223344556677".into(),
            subject_digest_sha256: "ab".repeat(32),
        }
    }

    #[test]
    fn test_payload_bytes_are_canonical() {
        let bytes = payload().to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"cert_name":"qa","key_id":"0011223344556677","#));
        assert!(text.ends_with(r#""v":1}"#));
        assert!(!text.contains(' '));
    }

    #[test]
    fn test_write_then_read_and_list() {
        let p = payload();
        let text = String::from_utf8(p.to_bytes().unwrap()).unwrap();
        let id = cert_id_for(text.as_bytes());
        let mut c = Container::new();
        write_record(&mut c, &id, &p, &text, "SIG").unwrap();
        assert!(write_record(&mut c, &id, &p, &text, "SIG").is_err());

        let node = c.node(&join_path(CERTIFICATES_ROOT, &id)).unwrap();
        let rec = read_record(&id, node).unwrap();
        assert_eq!(rec.payload, text);
        assert_eq!(rec.signature, "SIG");

        let listed = list_certificates(&c);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].cert_name.as_deref(), Some("qa"));
    }

    #[test]
    fn test_read_record_reports_missing_parts() {
        let node = Node::Group(Group::new());
        let err = read_record("x", &node).unwrap_err();
        assert!(err.contains("missing 'payload'"));
    }
}

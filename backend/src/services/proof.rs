//! Canonical provenance proofs.
//!
//! The proof of a verified artifact is the SHA-256 of a compact JSON
//! document with a fixed key order:
//!
//! ```json
//! {"artifactId":"…","title":"…","contentId":"…","submitterIdentity":"…",
//!  "verifiedAt":"2026-01-02T03:04:05.678Z","expertIdentity":"…"}
//! ```
//!
//! Anyone holding those six fields can recompute the hash and compare it
//! with the remark stored on the ledger.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

/// Prefix of the ledger remark carrying a proof hash.
pub const REMARK_PREFIX: &str = "CURATE:v1:";

/// Fields covered by a proof. Deserializes from the canonical document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofFields {
    pub artifact_id: Uuid,
    pub title: String,
    pub content_id: Option<String>,
    pub submitter_identity: String,
    pub verified_at: DateTime<Utc>,
    pub expert_identity: String,
}

/// Serialized form; field order here is the canonical key order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalProof<'a> {
    artifact_id: String,
    title: &'a str,
    content_id: Option<&'a str>,
    submitter_identity: &'a str,
    verified_at: String,
    expert_identity: &'a str,
}

/// Canonical JSON plus its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofDigest {
    pub canonical: String,
    pub hash: String,
}

impl ProofDigest {
    pub fn remark(&self) -> String {
        format!("{}{}", REMARK_PREFIX, self.hash)
    }
}

/// Timestamps are truncated to milliseconds so they survive storage round trips.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

pub fn canonical_json(fields: &ProofFields) -> Result<String> {
    let doc = CanonicalProof {
        artifact_id: fields.artifact_id.to_string(),
        title: &fields.title,
        content_id: fields.content_id.as_deref(),
        submitter_identity: &fields.submitter_identity,
        verified_at: fields
            .verified_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        expert_identity: &fields.expert_identity,
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Recompute the canonical document and hash for `fields`.
pub fn verify_proof(fields: &ProofFields) -> Result<ProofDigest> {
    let canonical = canonical_json(fields)?;
    let hash = hex::encode(Sha256::digest(canonical.as_bytes()));
    Ok(ProofDigest { canonical, hash })
}

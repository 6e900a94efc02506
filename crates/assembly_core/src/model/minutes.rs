//! Minutes ("ata") record, canonical snapshot shape and digest encoding.
//!
//! # Responsibility
//! - Define the immutable snapshot captured when an assembly is finalized.
//! - Provide the deterministic byte encoding and SHA-256 digest used to
//!   detect later tampering.
//!
//! # Invariants
//! - The snapshot contains only structs, sequences and integers/strings:
//!   no maps and no floats, so field order and number formatting are fixed
//!   and the same logical content always encodes to identical bytes.
//! - Sequences are ordered before encoding: presence by `unit_id`, items
//!   by `order_index`.
//! - `Minutes::snapshot` holds the exact bytes that were digested.

use crate::model::agenda::{AgendaItemId, ItemOutcome, ItemStatus, QuorumType};
use crate::model::assembly::{AssemblyConfig, AssemblyId, AssemblyType};
use crate::model::UnitId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever the snapshot shape changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Persisted minutes for one finalized assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minutes {
    pub assembly_id: AssemblyId,
    pub generated_at: i64,
    /// Canonical snapshot bytes.
    pub snapshot: Vec<u8>,
    /// Lowercase hex SHA-256 of `snapshot`.
    pub digest: String,
}

impl Minutes {
    /// Builds a record from a snapshot, encoding and digesting it.
    pub fn seal(snapshot: &MinutesSnapshot, generated_at: i64) -> Result<Self, serde_json::Error> {
        let bytes = canonical_bytes(snapshot)?;
        let digest = digest_hex(&bytes);
        Ok(Self {
            assembly_id: snapshot.assembly.uuid,
            generated_at,
            snapshot: bytes,
            digest,
        })
    }

    /// Recomputes the digest over the stored snapshot bytes.
    pub fn recompute_digest(&self) -> String {
        digest_hex(&self.snapshot)
    }

    /// Decodes the snapshot bytes.
    ///
    /// Callers must verify the digest first; decoding alone proves nothing
    /// about integrity.
    pub fn decode_snapshot(&self) -> Result<MinutesSnapshot, serde_json::Error> {
        serde_json::from_slice(&self.snapshot)
    }
}

/// Full immutable picture of an assembly at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinutesSnapshot {
    pub format_version: u32,
    pub assembly: AssemblySnapshot,
    pub presence: PresenceSnapshot,
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblySnapshot {
    pub uuid: AssemblyId,
    pub condominium_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: AssemblyType,
    pub scheduled_at: i64,
    pub config: AssemblyConfig,
    pub opened_at: Option<i64>,
    pub closed_at: Option<i64>,
    pub finalized_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub present_units: u32,
    pub total_units: u32,
    pub quorum_required: u8,
    pub quorum_achieved: bool,
    pub units: Vec<PresenceEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub unit_id: UnitId,
    pub checked_in_at: i64,
}

/// One agenda item with its locked-in outcome.
///
/// Items never opened for voting appear as `pending` with no outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub uuid: AgendaItemId,
    pub order_index: u32,
    pub title: String,
    pub description: Option<String>,
    pub quorum_type: QuorumType,
    pub status: ItemStatus,
    pub outcome: Option<ItemOutcome>,
}

/// Deterministic encoding of a snapshot.
pub fn canonical_bytes(snapshot: &MinutesSnapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(snapshot)
}

/// Lowercase hex SHA-256 over `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

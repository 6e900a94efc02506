//! Minutes generation and integrity verification.
//!
//! # Responsibility
//! - Build the canonical snapshot of a finalized assembly.
//! - Read sealed minutes and verify them against their digest.
//!
//! # Invariants
//! - A digest mismatch is reported as `IntegrityViolation` and logged at
//!   error level; stored minutes are never rewritten.
//! - Minutes are generated from committed rows inside the finalize
//!   transaction, never from caller-supplied data.

use crate::model::agenda::AgendaItem;
use crate::model::assembly::{Assembly, AssemblyId};
use crate::model::minutes::{
    AssemblySnapshot, ItemSnapshot, Minutes, MinutesSnapshot, PresenceEntry, PresenceSnapshot,
    SNAPSHOT_FORMAT_VERSION,
};
use crate::model::presence::QuorumStats;
use crate::repo::agenda_repo::{AgendaRepository, SqliteAgendaRepository};
use crate::repo::{ensure_schema_ready, RepoError};
use crate::repo::minutes_repo::{MinutesRepository, SqliteMinutesRepository};
use crate::repo::presence_repo::{PresenceRepository, SqlitePresenceRepository};
use crate::service::{finish, GovernanceError, GovernanceResult};
use log::error;
use rusqlite::Connection;
use std::time::Instant;

const MODULE: &str = "minutes";

/// Read and verification entry points for sealed minutes.
pub struct MinutesService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> MinutesService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> GovernanceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Returns the stored minutes of an assembly without verifying them.
    pub fn get(&self, assembly_id: AssemblyId) -> GovernanceResult<Minutes> {
        SqliteMinutesRepository::new(self.conn)
            .get_minutes(assembly_id)?
            .ok_or_else(|| GovernanceError::NotFound {
                entity: "minutes",
                id: assembly_id.to_string(),
            })
    }

    /// Verifies in-hand minutes; see [`verify_minutes`].
    pub fn verify(&self, minutes: &Minutes) -> GovernanceResult<()> {
        verify_minutes(minutes)
    }

    /// Loads and verifies the minutes of an assembly.
    pub fn verify_stored(&self, assembly_id: AssemblyId) -> GovernanceResult<Minutes> {
        let started_at = Instant::now();
        let result = self.get(assembly_id).and_then(|minutes| {
            verify_minutes(&minutes)?;
            Ok(minutes)
        });
        finish(
            MODULE,
            "minutes_verify",
            &assembly_id.to_string(),
            started_at,
            result,
        )
    }

    /// Looks minutes up by a published digest and verifies them.
    ///
    /// Presenting a digest proves nothing on its own; the stored snapshot is
    /// re-hashed before the record is returned.
    pub fn verify_digest(&self, digest: &str) -> GovernanceResult<Minutes> {
        let started_at = Instant::now();
        let result = SqliteMinutesRepository::new(self.conn)
            .find_by_digest(digest)
            .map_err(GovernanceError::from)
            .and_then(|found| {
                found.ok_or_else(|| GovernanceError::NotFound {
                    entity: "minutes",
                    id: digest.to_string(),
                })
            })
            .and_then(|minutes| {
                verify_minutes(&minutes)?;
                Ok(minutes)
            });
        finish(MODULE, "minutes_verify", digest, started_at, result)
    }
}

/// Recomputes the digest over the stored snapshot bytes and compares it with
/// the recorded digest.
pub fn verify_minutes(minutes: &Minutes) -> GovernanceResult<()> {
    let actual_digest = minutes.recompute_digest();
    if actual_digest == minutes.digest {
        return Ok(());
    }

    error!(
        "event=minutes_integrity module=minutes status=integrity_violation assembly_id={} expected_digest={} actual_digest={}",
        minutes.assembly_id, minutes.digest, actual_digest
    );
    Err(GovernanceError::IntegrityViolation {
        assembly_id: minutes.assembly_id,
        expected_digest: minutes.digest.clone(),
        actual_digest,
    })
}

/// Builds and seals minutes from committed rows.
///
/// `assembly` must already carry its `finalized_at` stamp.
pub(crate) fn build_minutes(
    conn: &Connection,
    assembly: &Assembly,
    total_units: u32,
    generated_at: i64,
) -> GovernanceResult<Minutes> {
    let presence = SqlitePresenceRepository::new(conn).list_presence(assembly.uuid)?;
    let items = SqliteAgendaRepository::new(conn).list_items(assembly.uuid)?;

    let present_units = u32::try_from(presence.len()).map_err(|_| {
        GovernanceError::from(RepoError::InvalidData(
            "presence count exceeds u32".to_string(),
        ))
    })?;
    let quorum = QuorumStats::compute(present_units, total_units, assembly.config.quorum_install);

    let snapshot = MinutesSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        assembly: AssemblySnapshot {
            uuid: assembly.uuid,
            condominium_id: assembly.condominium_id.clone(),
            title: assembly.title.clone(),
            kind: assembly.kind,
            scheduled_at: assembly.scheduled_at,
            config: assembly.config,
            opened_at: assembly.opened_at,
            closed_at: assembly.closed_at,
            finalized_at: assembly.finalized_at.unwrap_or(generated_at),
        },
        presence: PresenceSnapshot {
            present_units: quorum.present_units,
            total_units: quorum.total_units,
            quorum_required: quorum.quorum_required,
            quorum_achieved: quorum.quorum_achieved,
            units: presence
                .into_iter()
                .map(|record| PresenceEntry {
                    unit_id: record.unit_id,
                    checked_in_at: record.checked_in_at,
                })
                .collect(),
        },
        items: items.into_iter().map(item_snapshot).collect(),
    };

    Ok(Minutes::seal(&snapshot, generated_at)?)
}

fn item_snapshot(item: AgendaItem) -> ItemSnapshot {
    ItemSnapshot {
        uuid: item.uuid,
        order_index: item.order_index,
        title: item.title,
        description: item.description,
        quorum_type: item.quorum_type,
        status: item.status,
        outcome: item.outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::verify_minutes;
    use crate::model::minutes::{digest_hex, Minutes};
    use crate::service::GovernanceError;
    use uuid::Uuid;

    fn sealed(bytes: &[u8]) -> Minutes {
        Minutes {
            assembly_id: Uuid::nil(),
            generated_at: 1,
            snapshot: bytes.to_vec(),
            digest: digest_hex(bytes),
        }
    }

    #[test]
    fn untouched_minutes_verify() {
        verify_minutes(&sealed(br#"{"format_version":1}"#)).expect("intact minutes");
    }

    #[test]
    fn flipped_byte_is_an_integrity_violation() {
        let mut minutes = sealed(br#"{"format_version":1}"#);
        minutes.snapshot[2] ^= 0x01;

        let err = verify_minutes(&minutes).expect_err("tampered minutes must fail");
        assert!(err.is_fatal());
        match err {
            GovernanceError::IntegrityViolation {
                expected_digest,
                actual_digest,
                ..
            } => assert_ne!(expected_digest, actual_digest),
            other => panic!("unexpected error: {other}"),
        }
    }
}

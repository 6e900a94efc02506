//! Presence ledger use-cases.
//!
//! # Invariants
//! - Check-in is idempotent: a repeated call returns the original record
//!   and publishes nothing.
//! - Quorum statistics are recomputed from committed rows on every call.

use crate::access::{Actor, Capability};
use crate::collab::{Collaborators, GovernanceEvent};
use crate::db::now_epoch_ms;
use crate::model::assembly::AssemblyId;
use crate::model::presence::{CheckInReceipt, PresenceRecord, QuorumStats};
use crate::model::validation::{normalize_required, ValidationError};
use crate::repo::ensure_schema_ready;
use crate::repo::presence_repo::{PresenceRepository, SqlitePresenceRepository};
use crate::service::{
    actor_unit, authorize, begin_immediate, ensure_known_unit, ensure_open, finish,
    load_assembly, GovernanceResult,
};
use rusqlite::Connection;
use std::time::Instant;

const MODULE: &str = "presence";

/// Check-in and quorum service.
pub struct PresenceService<'conn> {
    conn: &'conn Connection,
    collab: Collaborators,
}

impl<'conn> PresenceService<'conn> {
    pub fn try_new(conn: &'conn Connection, collab: Collaborators) -> GovernanceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, collab })
    }

    /// Checks in the unit the caller represents.
    pub fn check_in(
        &self,
        actor: &Actor,
        assembly_id: AssemblyId,
    ) -> GovernanceResult<CheckInReceipt> {
        let started_at = Instant::now();
        let result = authorize(&self.collab, actor, Capability::CheckIn)
            .and_then(|()| actor_unit(actor))
            .and_then(|unit_id| self.record(assembly_id, unit_id));
        self.after_check_in(started_at, assembly_id, result)
    }

    /// Registers presence on behalf of any unit (front desk, proxy).
    pub fn check_in_unit(
        &self,
        actor: &Actor,
        assembly_id: AssemblyId,
        unit_id: &str,
    ) -> GovernanceResult<CheckInReceipt> {
        let started_at = Instant::now();
        let result = authorize(&self.collab, actor, Capability::RegisterPresence)
            .and_then(|()| Ok(normalize_required(unit_id, ValidationError::BlankUnit)?))
            .and_then(|unit_id| self.record(assembly_id, unit_id));
        self.after_check_in(started_at, assembly_id, result)
    }

    fn after_check_in(
        &self,
        started_at: Instant,
        assembly_id: AssemblyId,
        result: GovernanceResult<CheckInReceipt>,
    ) -> GovernanceResult<CheckInReceipt> {
        if let Ok(receipt) = &result {
            if receipt.newly_recorded {
                self.collab
                    .notifier
                    .publish(&GovernanceEvent::PresenceRecorded {
                        assembly_id,
                        unit_id: receipt.record.unit_id.clone(),
                    });
            }
        }
        finish(
            MODULE,
            "presence_check_in",
            &assembly_id.to_string(),
            started_at,
            result,
        )
    }

    fn record(&self, assembly_id: AssemblyId, unit_id: String) -> GovernanceResult<CheckInReceipt> {
        let assembly = load_assembly(self.conn, assembly_id)?;
        ensure_open(&assembly, "check in to")?;
        ensure_known_unit(&self.collab, &assembly, &unit_id)?;

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, assembly_id)?;
        ensure_open(&assembly, "check in to")?;
        let (record, newly_recorded) = SqlitePresenceRepository::new(&tx).insert_if_absent(
            assembly_id,
            &unit_id,
            now_epoch_ms(),
        )?;
        tx.commit()?;

        Ok(CheckInReceipt {
            record,
            newly_recorded,
        })
    }

    /// Live install-quorum statistics.
    pub fn stats(&self, assembly_id: AssemblyId) -> GovernanceResult<QuorumStats> {
        let assembly = load_assembly(self.conn, assembly_id)?;
        let total_units = self.collab.roster.total_units(&assembly.condominium_id)?;
        let present_units = SqlitePresenceRepository::new(self.conn).count_presence(assembly_id)?;
        Ok(QuorumStats::compute(
            present_units,
            total_units,
            assembly.config.quorum_install,
        ))
    }

    /// Lists checked-in units ordered by unit id.
    pub fn list_presence(&self, assembly_id: AssemblyId) -> GovernanceResult<Vec<PresenceRecord>> {
        load_assembly(self.conn, assembly_id)?;
        Ok(SqlitePresenceRepository::new(self.conn).list_presence(assembly_id)?)
    }
}

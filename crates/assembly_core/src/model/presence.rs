//! Presence records and install-quorum statistics.

use crate::model::assembly::AssemblyId;
use crate::model::UnitId;
use serde::{Deserialize, Serialize};

/// One unit's attendance at one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub assembly_id: AssemblyId,
    pub unit_id: UnitId,
    /// Unix epoch milliseconds of the first check-in.
    pub checked_in_at: i64,
}

/// Result of an idempotent check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInReceipt {
    /// The stored record; on repeated check-ins this is the original one.
    pub record: PresenceRecord,
    /// `false` when the unit had already checked in.
    pub newly_recorded: bool,
}

/// Live install-quorum statistics, recomputed from committed presence rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuorumStats {
    pub present_units: u32,
    pub total_units: u32,
    /// `present_units / total_units * 100`; `0.0` for an empty roster.
    pub quorum_percentage: f64,
    pub quorum_required: u8,
    /// Inclusive: reaching exactly `quorum_required` percent counts.
    pub quorum_achieved: bool,
}

impl QuorumStats {
    /// Computes quorum figures.
    ///
    /// The achieved flag is decided with integer arithmetic
    /// (`present * 100 >= required * total`) so the inclusive boundary is
    /// exact. An empty roster never achieves quorum.
    pub fn compute(present_units: u32, total_units: u32, quorum_required: u8) -> Self {
        let quorum_percentage = if total_units == 0 {
            0.0
        } else {
            f64::from(present_units) * 100.0 / f64::from(total_units)
        };
        let quorum_achieved = total_units > 0
            && u64::from(present_units) * 100 >= u64::from(quorum_required) * u64::from(total_units);

        Self {
            present_units,
            total_units,
            quorum_percentage,
            quorum_required,
            quorum_achieved,
        }
    }
}

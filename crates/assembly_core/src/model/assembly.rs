//! Assembly domain model and lifecycle state machine.
//!
//! # Responsibility
//! - Define the assembly record, its configuration flags and lifecycle.
//! - Encode which status transitions are legal.
//!
//! # Invariants
//! - Lifecycle is `draft -> scheduled -> open -> voting_closed -> finalized`.
//! - `cancelled` is reachable from every non-terminal status.
//! - `finalized` and `cancelled` are terminal: no transition leaves them.
//! - `quorum_install` is a percentage in `0..=100`.

use crate::db::now_epoch_ms;
use crate::model::validation::{normalize_required, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one assembly.
pub type AssemblyId = Uuid;

/// Legal nature of the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyType {
    Informal,
    Formal,
}

impl AssemblyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informal => "informal",
            Self::Formal => "formal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "informal" => Some(Self::Informal),
            "formal" => Some(Self::Formal),
            _ => None,
        }
    }
}

/// Assembly lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStatus {
    /// Created, still editable, not yet announced.
    Draft,
    /// Announced for a future date.
    Scheduled,
    /// In session: check-ins and voting are accepted.
    Open,
    /// Session ended; every agenda item has been tallied.
    VotingClosed,
    /// Minutes generated. Terminal.
    Finalized,
    /// Abandoned without minutes. Terminal.
    Cancelled,
}

impl AssemblyStatus {
    /// Stable storage/log string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Open => "open",
            Self::VotingClosed => "voting_closed",
            Self::Finalized => "finalized",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "open" => Some(Self::Open),
            "voting_closed" => Some(Self::VotingClosed),
            "finalized" => Some(Self::Finalized),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }

    /// Returns whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Draft, Self::Scheduled)
            | (Self::Scheduled, Self::Open)
            | (Self::Open, Self::VotingClosed)
            | (Self::VotingClosed, Self::Finalized) => true,
            (current, Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Per-assembly governance configuration, fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Voters must have checked in before casting a vote.
    pub require_presence: bool,
    /// Units in arrears may not vote.
    pub block_defaulters: bool,
    /// Minimum percentage of present units for the assembly to deliberate.
    pub quorum_install: u8,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            require_presence: true,
            block_defaulters: false,
            quorum_install: 50,
        }
    }
}

/// Canonical assembly record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    pub uuid: AssemblyId,
    /// Owning condominium; resolves the unit roster.
    pub condominium_id: String,
    pub title: String,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: AssemblyType,
    /// Meeting date, Unix epoch milliseconds.
    pub scheduled_at: i64,
    pub config: AssemblyConfig,
    pub status: AssemblyStatus,
    pub opened_at: Option<i64>,
    pub closed_at: Option<i64>,
    pub finalized_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub created_at: i64,
}

/// Request model for creating an assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssembly {
    pub condominium_id: String,
    pub title: String,
    pub kind: AssemblyType,
    pub scheduled_at: i64,
    pub config: AssemblyConfig,
}

impl Assembly {
    /// Creates a draft assembly with a generated stable ID.
    pub fn new(
        condominium_id: impl Into<String>,
        title: impl Into<String>,
        kind: AssemblyType,
        scheduled_at: i64,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            condominium_id: condominium_id.into(),
            title: title.into(),
            kind,
            scheduled_at,
            config,
            status: AssemblyStatus::Draft,
            opened_at: None,
            closed_at: None,
            finalized_at: None,
            cancelled_at: None,
            created_at: now_epoch_ms(),
        }
    }

    /// Trims identifying text and checks structural invariants.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.title = normalize_required(&self.title, ValidationError::BlankTitle)?;
        self.condominium_id =
            normalize_required(&self.condominium_id, ValidationError::BlankCondominium)?;
        self.validate()?;
        Ok(self)
    }

    /// Checks invariants that must hold for every persisted assembly.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        if self.condominium_id.trim().is_empty() {
            return Err(ValidationError::BlankCondominium);
        }
        if self.config.quorum_install > 100 {
            return Err(ValidationError::QuorumOutOfRange(self.config.quorum_install));
        }
        Ok(())
    }

    /// Scheduling requires a meeting date strictly after `now`.
    pub fn ensure_future_date(&self, now: i64) -> Result<(), ValidationError> {
        if self.scheduled_at <= now {
            return Err(ValidationError::ScheduledInPast {
                scheduled_at: self.scheduled_at,
                now,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Assembly, AssemblyConfig, AssemblyStatus, AssemblyType};
    use crate::model::validation::ValidationError;

    const ALL: [AssemblyStatus; 6] = [
        AssemblyStatus::Draft,
        AssemblyStatus::Scheduled,
        AssemblyStatus::Open,
        AssemblyStatus::VotingClosed,
        AssemblyStatus::Finalized,
        AssemblyStatus::Cancelled,
    ];

    #[test]
    fn forward_lifecycle_is_strictly_linear() {
        assert!(AssemblyStatus::Draft.can_transition_to(AssemblyStatus::Scheduled));
        assert!(AssemblyStatus::Scheduled.can_transition_to(AssemblyStatus::Open));
        assert!(AssemblyStatus::Open.can_transition_to(AssemblyStatus::VotingClosed));
        assert!(AssemblyStatus::VotingClosed.can_transition_to(AssemblyStatus::Finalized));

        assert!(!AssemblyStatus::Draft.can_transition_to(AssemblyStatus::Open));
        assert!(!AssemblyStatus::Open.can_transition_to(AssemblyStatus::Finalized));
        assert!(!AssemblyStatus::VotingClosed.can_transition_to(AssemblyStatus::Open));
    }

    #[test]
    fn terminal_states_allow_no_transition() {
        for from in [AssemblyStatus::Finalized, AssemblyStatus::Cancelled] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn cancel_is_reachable_from_every_non_terminal_state() {
        for from in ALL.into_iter().filter(|status| !status.is_terminal()) {
            assert!(from.can_transition_to(AssemblyStatus::Cancelled));
        }
    }

    #[test]
    fn status_strings_parse_back() {
        for status in ALL {
            assert_eq!(AssemblyStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssemblyStatus::parse("closed"), None);
    }

    #[test]
    fn normalized_rejects_out_of_range_quorum() {
        let config = AssemblyConfig {
            quorum_install: 101,
            ..AssemblyConfig::default()
        };
        let err = Assembly::new("condo-1", "AGO 2026", AssemblyType::Formal, 0, config)
            .normalized()
            .expect_err("quorum above 100 must fail");
        assert_eq!(err, ValidationError::QuorumOutOfRange(101));
    }

    #[test]
    fn ensure_future_date_is_strict() {
        let assembly = Assembly::new(
            "condo-1",
            "AGE",
            AssemblyType::Informal,
            1_000,
            AssemblyConfig::default(),
        );
        assert!(assembly.ensure_future_date(999).is_ok());
        assert!(assembly.ensure_future_date(1_000).is_err());
    }
}

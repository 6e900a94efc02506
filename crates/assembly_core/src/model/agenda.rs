//! Agenda item ("pauta") and vote records.
//!
//! # Invariants
//! - Item lifecycle is `pending -> voting -> closed`; closed items never reopen.
//! - `outcome` is only set once the item is closed, and is a cached read
//!   projection; committed votes remain the source of truth.
//! - At most one vote exists per `(item, voter_unit)`.

use crate::model::assembly::AssemblyId;
use crate::model::UnitId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one agenda item.
pub type AgendaItemId = Uuid;

/// Majority rule used to resolve an item's votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumType {
    /// More yes than no.
    Simple,
    /// Yes above half of the eligible units.
    Absolute,
    /// Yes at least two thirds of decisive (yes + no) votes.
    TwoThirds,
    /// No opposing vote.
    Unanimous,
}

impl QuorumType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Absolute => "absolute",
            Self::TwoThirds => "two_thirds",
            Self::Unanimous => "unanimous",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple" => Some(Self::Simple),
            "absolute" => Some(Self::Absolute),
            "two_thirds" => Some(Self::TwoThirds),
            "unanimous" => Some(Self::Unanimous),
            _ => None,
        }
    }
}

/// Agenda item lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Voting,
    Closed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Voting => "voting",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "voting" => Some(Self::Voting),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Abstain => "abstain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

/// Resolved outcome of a closed agenda item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemResult {
    Approved,
    Rejected,
    Tie,
    /// Install quorum was not met at closing time.
    NoQuorum,
}

impl ItemResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Tie => "tie",
            Self::NoQuorum => "no_quorum",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "tie" => Some(Self::Tie),
            "no_quorum" => Some(Self::NoQuorum),
            _ => None,
        }
    }
}

/// Vote counts for one agenda item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
}

impl Tally {
    /// Number of ballots counted, abstentions included.
    pub fn total(&self) -> u32 {
        self.yes + self.no + self.abstain
    }

    /// Ballots that take a side (`yes + no`).
    pub fn decisive(&self) -> u32 {
        self.yes + self.no
    }
}

/// Frozen result of closing an item, cached on the item row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub tally: Tally,
    pub result: ItemResult,
    /// Units checked in when the item closed.
    pub present_units: u32,
    /// Units on the roster when the item closed.
    pub total_units: u32,
}

/// Canonical agenda item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub uuid: AgendaItemId,
    pub assembly_id: AssemblyId,
    /// Zero-based position within the assembly agenda.
    pub order_index: u32,
    pub title: String,
    pub description: Option<String>,
    pub quorum_type: QuorumType,
    pub status: ItemStatus,
    pub outcome: Option<ItemOutcome>,
    pub opened_at: Option<i64>,
    pub closed_at: Option<i64>,
}

/// Request model for adding an item to an assembly agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAgendaItem {
    pub assembly_id: AssemblyId,
    pub title: String,
    pub description: Option<String>,
    pub quorum_type: QuorumType,
}

/// One committed ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub item_id: AgendaItemId,
    /// Voting identity; co-owners and tenants of a unit share this slot.
    pub voter_unit: UnitId,
    pub choice: VoteChoice,
    /// User id of the person who cast the ballot for the unit.
    pub cast_by: String,
    pub cast_at: i64,
}

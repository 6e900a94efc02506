//! Tally and result resolution.
//!
//! # Responsibility
//! - Count committed ballots of one agenda item.
//! - Resolve counts into an [`ItemResult`] for the item's quorum type.
//!
//! # Invariants
//! - Pure: input is the full set of committed votes plus presence figures
//!   captured at closing time. No running counters are consulted.
//! - An unmet install quorum forces `no_quorum` before any majority rule.
//! - Integer arithmetic only; thresholds such as two thirds never go
//!   through floating point.

use crate::model::agenda::{ItemResult, QuorumType, Tally, Vote, VoteChoice};
use crate::model::presence::QuorumStats;

/// How `yes == no` is resolved under `simple` and `absolute` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiePolicy {
    /// Report an explicit `tie` result.
    ExplicitTie,
    /// A tie does not carry the motion.
    TieFails,
}

/// Whether a unit may replace its ballot before the item closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChangePolicy {
    /// One ballot per unit; a second attempt is `DuplicateVote`.
    RejectDuplicate,
}

pub const TIE_POLICY: TiePolicy = TiePolicy::ExplicitTie;
pub const VOTE_CHANGE_POLICY: VoteChangePolicy = VoteChangePolicy::RejectDuplicate;

/// Presence and configuration figures captured when an item closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionContext {
    pub quorum_type: QuorumType,
    pub require_presence: bool,
    pub present_units: u32,
    pub total_units: u32,
    pub quorum_install: u8,
}

impl ResolutionContext {
    /// Units forming the base of an absolute majority.
    pub fn eligible_units(&self) -> u32 {
        if self.require_presence {
            self.present_units
        } else {
            self.total_units
        }
    }
}

/// Counts ballots by choice.
pub fn count_votes(votes: &[Vote]) -> Tally {
    let mut tally = Tally::default();
    for vote in votes {
        match vote.choice {
            VoteChoice::Yes => tally.yes += 1,
            VoteChoice::No => tally.no += 1,
            VoteChoice::Abstain => tally.abstain += 1,
        }
    }
    tally
}

/// Resolves `tally` using the configured [`TIE_POLICY`].
pub fn resolve(tally: &Tally, ctx: &ResolutionContext) -> ItemResult {
    resolve_with_policy(tally, ctx, TIE_POLICY)
}

/// Counts `votes` and resolves them in one step.
pub fn resolve_votes(votes: &[Vote], ctx: &ResolutionContext) -> (Tally, ItemResult) {
    let tally = count_votes(votes);
    let result = resolve(&tally, ctx);
    (tally, result)
}

/// Resolves `tally` under an explicit tie policy.
///
/// Two-thirds departs from the literal `yes >= 2/3 * (yes + no)` when no
/// decisive ballot exists: `0 >= 0` would approve, here it is `rejected`.
pub fn resolve_with_policy(
    tally: &Tally,
    ctx: &ResolutionContext,
    tie_policy: TiePolicy,
) -> ItemResult {
    let quorum = QuorumStats::compute(ctx.present_units, ctx.total_units, ctx.quorum_install);
    if !quorum.quorum_achieved {
        return ItemResult::NoQuorum;
    }

    let yes = u64::from(tally.yes);
    let no = u64::from(tally.no);
    let decisive = u64::from(tally.decisive());

    match ctx.quorum_type {
        QuorumType::Simple | QuorumType::Absolute if yes == no => match tie_policy {
            TiePolicy::ExplicitTie => ItemResult::Tie,
            TiePolicy::TieFails => ItemResult::Rejected,
        },
        QuorumType::Simple => approved_if(yes > no),
        QuorumType::Absolute => approved_if(yes * 2 > u64::from(ctx.eligible_units())),
        // Abstentions are excluded from the base; an item nobody took a side
        // on is not carried.
        QuorumType::TwoThirds => approved_if(decisive > 0 && yes * 3 >= decisive * 2),
        // Abstentions do not break unanimity, but someone has to say yes.
        QuorumType::Unanimous => approved_if(no == 0 && yes > 0),
    }
}

fn approved_if(condition: bool) -> ItemResult {
    if condition {
        ItemResult::Approved
    } else {
        ItemResult::Rejected
    }
}

//! Agenda and voting use-cases.
//!
//! # Responsibility
//! - Manage agenda items and their `pending -> voting -> closed` lifecycle.
//! - Accept ballots, one per unit and item.
//! - Close items through the tally resolver and cache the outcome.
//!
//! # Invariants
//! - The votes primary key is the only arbiter between concurrent ballots
//!   of the same unit; a losing insert is `DuplicateVote`, never a merge.
//! - Cached counts are written once, at close, from committed votes.
//! - Ballot choices are never logged or published.

use crate::access::{Actor, Capability};
use crate::collab::{Collaborators, GovernanceEvent};
use crate::db::now_epoch_ms;
use crate::model::agenda::{
    AgendaItem, AgendaItemId, ItemOutcome, ItemStatus, NewAgendaItem, Tally, Vote, VoteChoice,
};
use crate::model::assembly::{Assembly, AssemblyId, AssemblyStatus};
use crate::model::validation::{normalize_required, ValidationError};
use crate::repo::agenda_repo::{AgendaRepository, SqliteAgendaRepository};
use crate::repo::ensure_schema_ready;
use crate::repo::presence_repo::{PresenceRepository, SqlitePresenceRepository};
use crate::repo::RepoError;
use crate::service::tally::{count_votes, resolve_votes, ResolutionContext};
use crate::service::{
    actor_unit, authorize, begin_immediate, ensure_known_unit, ensure_not_terminal, ensure_open,
    finish, load_assembly, GovernanceError, GovernanceResult,
};
use rusqlite::Connection;
use std::time::Instant;
use uuid::Uuid;

const MODULE: &str = "voting";

/// Agenda and ballot service.
pub struct VotingService<'conn> {
    conn: &'conn Connection,
    collab: Collaborators,
}

impl<'conn> VotingService<'conn> {
    pub fn try_new(conn: &'conn Connection, collab: Collaborators) -> GovernanceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, collab })
    }

    /// Appends an item to the agenda of a draft, scheduled or open assembly.
    pub fn create_item(
        &self,
        actor: &Actor,
        request: &NewAgendaItem,
    ) -> GovernanceResult<AgendaItem> {
        let started_at = Instant::now();
        let result = self.create_item_inner(actor, request);
        finish(
            MODULE,
            "agenda_item_create",
            &request.assembly_id.to_string(),
            started_at,
            result,
        )
    }

    fn create_item_inner(
        &self,
        actor: &Actor,
        request: &NewAgendaItem,
    ) -> GovernanceResult<AgendaItem> {
        authorize(&self.collab, actor, Capability::ManageAgenda)?;
        let title = normalize_required(&request.title, ValidationError::BlankTitle)?;
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, request.assembly_id)?;
        ensure_not_terminal(&assembly, "add agenda item to")?;
        if assembly.status == AssemblyStatus::VotingClosed {
            return Err(GovernanceError::invalid_transition(
                "assembly",
                assembly.status.as_str(),
                "add agenda item to",
            ));
        }

        let item = SqliteAgendaRepository::new(&tx).create_item(
            Uuid::new_v4(),
            assembly.uuid,
            &title,
            description,
            request.quorum_type,
        )?;
        tx.commit()?;
        Ok(item)
    }

    pub fn get_item(&self, item_id: AgendaItemId) -> GovernanceResult<AgendaItem> {
        load_item(self.conn, item_id)
    }

    /// Lists the agenda of an assembly ordered by `order_index`.
    pub fn list_items(&self, assembly_id: AssemblyId) -> GovernanceResult<Vec<AgendaItem>> {
        load_assembly(self.conn, assembly_id)?;
        Ok(SqliteAgendaRepository::new(self.conn).list_items(assembly_id)?)
    }

    /// Moves a pending item to `voting`. The assembly must be open.
    pub fn open_for_voting(
        &self,
        actor: &Actor,
        item_id: AgendaItemId,
    ) -> GovernanceResult<AgendaItem> {
        let started_at = Instant::now();
        let result = self.open_for_voting_inner(actor, item_id);
        if let Ok(item) = &result {
            self.collab
                .notifier
                .publish(&GovernanceEvent::ItemOpenedForVoting {
                    assembly_id: item.assembly_id,
                    item_id: item.uuid,
                });
        }
        finish(
            MODULE,
            "item_open_voting",
            &item_id.to_string(),
            started_at,
            result,
        )
    }

    fn open_for_voting_inner(
        &self,
        actor: &Actor,
        item_id: AgendaItemId,
    ) -> GovernanceResult<AgendaItem> {
        authorize(&self.collab, actor, Capability::ManageAgenda)?;

        let tx = begin_immediate(self.conn)?;
        let item = load_item(&tx, item_id)?;
        let assembly = load_assembly(&tx, item.assembly_id)?;
        ensure_open(&assembly, "open voting in")?;
        if item.status != ItemStatus::Pending {
            return Err(GovernanceError::invalid_transition(
                "agenda item",
                item.status.as_str(),
                "open voting on",
            ));
        }

        let repo = SqliteAgendaRepository::new(&tx);
        if !repo.mark_voting(item_id, now_epoch_ms())? {
            return Err(GovernanceError::invalid_transition(
                "agenda item",
                item.status.as_str(),
                "open voting on",
            ));
        }
        let item = load_item(&tx, item_id)?;
        tx.commit()?;
        Ok(item)
    }

    /// Records the ballot of the caller's unit.
    ///
    /// Checks run in a fixed order: terminal assembly, item not voting,
    /// missing presence, blocked defaulter, duplicate ballot.
    pub fn cast_vote(
        &self,
        actor: &Actor,
        item_id: AgendaItemId,
        choice: VoteChoice,
    ) -> GovernanceResult<Vote> {
        let started_at = Instant::now();
        let result = self.cast_vote_inner(actor, item_id, choice);
        if let Ok(vote) = &result {
            self.collab.notifier.publish(&GovernanceEvent::VoteRecorded {
                item_id: vote.item_id,
                unit_id: vote.voter_unit.clone(),
            });
        }
        finish(MODULE, "vote_cast", &item_id.to_string(), started_at, result)
    }

    fn cast_vote_inner(
        &self,
        actor: &Actor,
        item_id: AgendaItemId,
        choice: VoteChoice,
    ) -> GovernanceResult<Vote> {
        authorize(&self.collab, actor, Capability::CastVote)?;
        let unit_id = actor_unit(actor)?;

        // Condominium and config never change after creation, so the roster
        // can be consulted before taking the write lock. State is checked
        // first and again under the lock.
        let item = load_item(self.conn, item_id)?;
        let assembly = load_assembly(self.conn, item.assembly_id)?;
        ensure_accepting_ballots(&assembly, &item)?;
        ensure_known_unit(&self.collab, &assembly, &unit_id)?;
        let delinquent = assembly.config.block_defaulters
            && self
                .collab
                .roster
                .is_delinquent(&assembly.condominium_id, &unit_id)?;

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, assembly.uuid)?;
        let item = load_item(&tx, item.uuid)?;
        ensure_accepting_ballots(&assembly, &item)?;
        if assembly.config.require_presence
            && SqlitePresenceRepository::new(&tx)
                .get_presence(assembly.uuid, &unit_id)?
                .is_none()
        {
            return Err(GovernanceError::PresenceRequired {
                assembly_id: assembly.uuid,
                unit_id,
            });
        }
        if delinquent {
            return Err(GovernanceError::VoterBlocked { unit_id });
        }

        let vote = Vote {
            item_id,
            voter_unit: unit_id,
            choice,
            cast_by: actor.user_id.clone(),
            cast_at: now_epoch_ms(),
        };
        match SqliteAgendaRepository::new(&tx).insert_vote(&vote) {
            Ok(()) => {}
            Err(RepoError::Conflict(_)) => {
                return Err(GovernanceError::DuplicateVote {
                    item_id,
                    unit_id: vote.voter_unit,
                });
            }
            Err(err) => return Err(err.into()),
        }
        tx.commit()?;
        Ok(vote)
    }

    /// Closes a voting item and caches its resolved outcome.
    pub fn close_item(&self, actor: &Actor, item_id: AgendaItemId) -> GovernanceResult<AgendaItem> {
        let started_at = Instant::now();
        let result = self.close_item_inner(actor, item_id);
        if let Ok(item) = &result {
            publish_item_closed(&self.collab, item);
        }
        finish(MODULE, "item_close", &item_id.to_string(), started_at, result)
    }

    fn close_item_inner(&self, actor: &Actor, item_id: AgendaItemId) -> GovernanceResult<AgendaItem> {
        authorize(&self.collab, actor, Capability::ManageAgenda)?;

        let item = load_item(self.conn, item_id)?;
        let assembly = load_assembly(self.conn, item.assembly_id)?;
        ensure_closable(&assembly, &item)?;
        let total_units = self.collab.roster.total_units(&assembly.condominium_id)?;

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, assembly.uuid)?;
        let item = load_item(&tx, item.uuid)?;
        ensure_closable(&assembly, &item)?;

        let closed = close_item_in_tx(&tx, &assembly, &item, total_units, now_epoch_ms())?;
        tx.commit()?;
        Ok(closed)
    }

    /// Counts committed ballots of an item at read time, in any status.
    pub fn live_tally(&self, item_id: AgendaItemId) -> GovernanceResult<Tally> {
        load_item(self.conn, item_id)?;
        let votes = SqliteAgendaRepository::new(self.conn).list_votes(item_id)?;
        Ok(count_votes(&votes))
    }

    pub fn voter_has_voted(&self, item_id: AgendaItemId, unit_id: &str) -> GovernanceResult<bool> {
        load_item(self.conn, item_id)?;
        Ok(SqliteAgendaRepository::new(self.conn)
            .get_vote(item_id, unit_id.trim())?
            .is_some())
    }

    /// Lists committed ballots ordered by unit.
    pub fn list_votes(&self, item_id: AgendaItemId) -> GovernanceResult<Vec<Vote>> {
        load_item(self.conn, item_id)?;
        Ok(SqliteAgendaRepository::new(self.conn).list_votes(item_id)?)
    }
}

pub(crate) fn load_item(conn: &Connection, item_id: AgendaItemId) -> GovernanceResult<AgendaItem> {
    SqliteAgendaRepository::new(conn)
        .get_item(item_id)?
        .ok_or_else(|| GovernanceError::NotFound {
            entity: "agenda item",
            id: item_id.to_string(),
        })
}

/// Tallies committed votes of a voting item and closes it.
///
/// Runs inside the caller's transaction; presence is counted from the same
/// snapshot the votes are read from.
pub(crate) fn close_item_in_tx(
    conn: &Connection,
    assembly: &Assembly,
    item: &AgendaItem,
    total_units: u32,
    at: i64,
) -> GovernanceResult<AgendaItem> {
    let present_units = SqlitePresenceRepository::new(conn).count_presence(assembly.uuid)?;
    let repo = SqliteAgendaRepository::new(conn);
    let votes = repo.list_votes(item.uuid)?;

    let ctx = ResolutionContext {
        quorum_type: item.quorum_type,
        require_presence: assembly.config.require_presence,
        present_units,
        total_units,
        quorum_install: assembly.config.quorum_install,
    };
    let (tally, result) = resolve_votes(&votes, &ctx);
    let outcome = ItemOutcome {
        tally,
        result,
        present_units,
        total_units,
    };

    if !repo.close_with_outcome(item.uuid, &outcome, at)? {
        return Err(GovernanceError::invalid_transition(
            "agenda item",
            item.status.as_str(),
            "close",
        ));
    }
    load_item(conn, item.uuid)
}

fn ensure_accepting_ballots(assembly: &Assembly, item: &AgendaItem) -> GovernanceResult<()> {
    ensure_not_terminal(assembly, "vote in")?;
    if item.status != ItemStatus::Voting || assembly.status != AssemblyStatus::Open {
        return Err(GovernanceError::ItemNotVoting {
            item_id: item.uuid,
            status: item.status.as_str(),
        });
    }
    Ok(())
}

fn ensure_closable(assembly: &Assembly, item: &AgendaItem) -> GovernanceResult<()> {
    ensure_not_terminal(assembly, "close agenda item in")?;
    if item.status != ItemStatus::Voting {
        return Err(GovernanceError::invalid_transition(
            "agenda item",
            item.status.as_str(),
            "close",
        ));
    }
    Ok(())
}

pub(crate) fn publish_item_closed(collab: &Collaborators, item: &AgendaItem) {
    if let Some(outcome) = &item.outcome {
        collab.notifier.publish(&GovernanceEvent::ItemClosed {
            item_id: item.uuid,
            result: outcome.result,
        });
    }
}

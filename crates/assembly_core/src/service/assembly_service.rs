//! Assembly registry use-cases.
//!
//! # Responsibility
//! - Create and query assemblies.
//! - Drive the lifecycle `draft -> scheduled -> open -> voting_closed ->
//!   finalized`, with `cancel` from any non-terminal status.
//! - Force-close voting items on `close` and seal minutes on `finalize`.
//!
//! # Invariants
//! - Every transition is a guarded compare-and-set inside one `IMMEDIATE`
//!   transaction; two callers racing from the same status cannot both win.
//! - `finalize` seals minutes exactly once; a repeated call is
//!   `AlreadyFinalized`.

use crate::access::{Actor, Capability};
use crate::collab::{Collaborators, GovernanceEvent};
use crate::db::now_epoch_ms;
use crate::model::agenda::{AgendaItem, ItemStatus};
use crate::model::assembly::{Assembly, AssemblyId, AssemblyStatus, NewAssembly};
use crate::model::minutes::Minutes;
use crate::repo::agenda_repo::{AgendaRepository, SqliteAgendaRepository};
use crate::repo::assembly_repo::{AssemblyListQuery, AssemblyRepository, SqliteAssemblyRepository};
use crate::repo::ensure_schema_ready;
use crate::repo::minutes_repo::{MinutesRepository, SqliteMinutesRepository};
use crate::repo::RepoError;
use crate::service::minutes_service::build_minutes;
use crate::service::voting_service::{close_item_in_tx, publish_item_closed};
use crate::service::{
    authorize, begin_immediate, finish, load_assembly, GovernanceError, GovernanceResult,
};
use rusqlite::Connection;
use std::time::Instant;

const MODULE: &str = "registry";

/// Registry service for the assembly aggregate.
pub struct AssemblyService<'conn> {
    conn: &'conn Connection,
    collab: Collaborators,
}

impl<'conn> AssemblyService<'conn> {
    pub fn try_new(conn: &'conn Connection, collab: Collaborators) -> GovernanceResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, collab })
    }

    /// Creates a draft assembly.
    pub fn create_assembly(
        &self,
        actor: &Actor,
        request: &NewAssembly,
    ) -> GovernanceResult<Assembly> {
        let started_at = Instant::now();
        let result = authorize(&self.collab, actor, Capability::ManageAssembly).and_then(|()| {
            let assembly = Assembly::new(
                request.condominium_id.as_str(),
                request.title.as_str(),
                request.kind,
                request.scheduled_at,
                request.config,
            )
            .normalized()?;
            SqliteAssemblyRepository::new(self.conn).create_assembly(&assembly)?;
            Ok(assembly)
        });
        let target = result
            .as_ref()
            .map(|assembly| assembly.uuid.to_string())
            .unwrap_or_else(|_| request.condominium_id.clone());
        finish(MODULE, "assembly_create", &target, started_at, result)
    }

    pub fn get_assembly(&self, id: AssemblyId) -> GovernanceResult<Assembly> {
        load_assembly(self.conn, id)
    }

    /// Lists assemblies ordered by `scheduled_at DESC, uuid ASC`.
    pub fn list_assemblies(&self, query: &AssemblyListQuery) -> GovernanceResult<Vec<Assembly>> {
        Ok(SqliteAssemblyRepository::new(self.conn).list_assemblies(query)?)
    }

    /// `draft -> scheduled`; the meeting date must lie in the future.
    pub fn schedule(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Assembly> {
        self.transition(actor, id, Capability::ManageAssembly, AssemblyStatus::Scheduled, "schedule")
    }

    /// `scheduled -> open`; records `opened_at`.
    pub fn open(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Assembly> {
        self.transition(actor, id, Capability::OpenAssembly, AssemblyStatus::Open, "open")
    }

    /// `any non-terminal -> cancelled`; no minutes are generated.
    pub fn cancel(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Assembly> {
        self.transition(actor, id, Capability::ManageAssembly, AssemblyStatus::Cancelled, "cancel")
    }

    fn transition(
        &self,
        actor: &Actor,
        id: AssemblyId,
        capability: Capability,
        to: AssemblyStatus,
        operation: &'static str,
    ) -> GovernanceResult<Assembly> {
        let started_at = Instant::now();
        let result = authorize(&self.collab, actor, capability).and_then(|()| {
            let tx = begin_immediate(self.conn)?;
            let assembly = load_assembly(&tx, id)?;
            guard_transition(&assembly, to, operation)?;
            let now = now_epoch_ms();
            if to == AssemblyStatus::Scheduled {
                assembly.ensure_future_date(now)?;
            }
            compare_and_set(&tx, &assembly, to, operation, now)?;
            let updated = load_assembly(&tx, id)?;
            tx.commit()?;
            Ok(updated)
        });

        if let Ok(assembly) = &result {
            let event = match to {
                AssemblyStatus::Scheduled => Some(GovernanceEvent::AssemblyScheduled {
                    assembly_id: assembly.uuid,
                }),
                AssemblyStatus::Open => Some(GovernanceEvent::AssemblyOpened {
                    assembly_id: assembly.uuid,
                }),
                AssemblyStatus::Cancelled => Some(GovernanceEvent::AssemblyCancelled {
                    assembly_id: assembly.uuid,
                }),
                _ => None,
            };
            if let Some(event) = event {
                self.collab.notifier.publish(&event);
            }
        }
        finish(MODULE, transition_event(to), &id.to_string(), started_at, result)
    }

    /// `open -> voting_closed`.
    ///
    /// Every item still `voting` is tallied and closed in the same
    /// transaction; returns those force-closed items. Items never opened
    /// stay `pending`.
    pub fn close(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Vec<AgendaItem>> {
        let started_at = Instant::now();
        let result = self.close_inner(actor, id);
        if let Ok(closed_items) = &result {
            for item in closed_items {
                publish_item_closed(&self.collab, item);
            }
            self.collab
                .notifier
                .publish(&GovernanceEvent::AssemblyClosed { assembly_id: id });
        }
        finish(MODULE, "assembly_close", &id.to_string(), started_at, result)
    }

    fn close_inner(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Vec<AgendaItem>> {
        authorize(&self.collab, actor, Capability::ManageAssembly)?;
        let assembly = load_assembly(self.conn, id)?;
        guard_transition(&assembly, AssemblyStatus::VotingClosed, "close")?;
        let total_units = self.collab.roster.total_units(&assembly.condominium_id)?;

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, id)?;
        guard_transition(&assembly, AssemblyStatus::VotingClosed, "close")?;

        let now = now_epoch_ms();
        let voting_items =
            SqliteAgendaRepository::new(&tx).list_items_with_status(id, ItemStatus::Voting)?;
        let mut closed_items = Vec::with_capacity(voting_items.len());
        for item in &voting_items {
            closed_items.push(close_item_in_tx(&tx, &assembly, item, total_units, now)?);
        }

        compare_and_set(&tx, &assembly, AssemblyStatus::VotingClosed, "close", now)?;
        tx.commit()?;
        Ok(closed_items)
    }

    /// `voting_closed -> finalized`; seals and stores the minutes.
    pub fn finalize(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Minutes> {
        let started_at = Instant::now();
        let result = self.finalize_inner(actor, id);
        if let Ok(minutes) = &result {
            self.collab
                .notifier
                .publish(&GovernanceEvent::AssemblyFinalized {
                    assembly_id: id,
                    digest: minutes.digest.clone(),
                });
        }
        finish(MODULE, "assembly_finalize", &id.to_string(), started_at, result)
    }

    fn finalize_inner(&self, actor: &Actor, id: AssemblyId) -> GovernanceResult<Minutes> {
        authorize(&self.collab, actor, Capability::ManageAssembly)?;
        let assembly = load_assembly(self.conn, id)?;
        guard_transition(&assembly, AssemblyStatus::Finalized, "finalize")?;
        let total_units = self.collab.roster.total_units(&assembly.condominium_id)?;

        let tx = begin_immediate(self.conn)?;
        let assembly = load_assembly(&tx, id)?;
        guard_transition(&assembly, AssemblyStatus::Finalized, "finalize")?;

        let minutes_repo = SqliteMinutesRepository::new(&tx);
        if minutes_repo.get_minutes(id)?.is_some() {
            return Err(GovernanceError::AlreadyFinalized(id));
        }

        let now = now_epoch_ms();
        compare_and_set(&tx, &assembly, AssemblyStatus::Finalized, "finalize", now)?;
        let finalized = load_assembly(&tx, id)?;
        let minutes = build_minutes(&tx, &finalized, total_units, now)?;
        match minutes_repo.insert_minutes(&minutes) {
            Ok(()) => {}
            Err(RepoError::Conflict(_)) => return Err(GovernanceError::AlreadyFinalized(id)),
            Err(err) => return Err(err.into()),
        }
        tx.commit()?;
        Ok(minutes)
    }
}

/// Checks the lifecycle table; a second `finalize` is `AlreadyFinalized`.
fn guard_transition(
    assembly: &Assembly,
    to: AssemblyStatus,
    operation: &'static str,
) -> GovernanceResult<()> {
    if assembly.status == AssemblyStatus::Finalized && to == AssemblyStatus::Finalized {
        return Err(GovernanceError::AlreadyFinalized(assembly.uuid));
    }
    if !assembly.status.can_transition_to(to) {
        return Err(GovernanceError::invalid_transition(
            "assembly",
            assembly.status.as_str(),
            operation,
        ));
    }
    Ok(())
}

fn compare_and_set(
    conn: &Connection,
    assembly: &Assembly,
    to: AssemblyStatus,
    operation: &'static str,
    at: i64,
) -> GovernanceResult<()> {
    let changed = SqliteAssemblyRepository::new(conn).compare_and_set_status(
        assembly.uuid,
        assembly.status,
        to,
        at,
    )?;
    if changed {
        return Ok(());
    }
    // Lost the race: report against the status that won.
    let current = load_assembly(conn, assembly.uuid)?;
    guard_transition(&current, to, operation)?;
    Err(GovernanceError::invalid_transition(
        "assembly",
        current.status.as_str(),
        operation,
    ))
}

fn transition_event(to: AssemblyStatus) -> &'static str {
    match to {
        AssemblyStatus::Draft => "assembly_draft",
        AssemblyStatus::Scheduled => "assembly_schedule",
        AssemblyStatus::Open => "assembly_open",
        AssemblyStatus::VotingClosed => "assembly_close",
        AssemblyStatus::Finalized => "assembly_finalize",
        AssemblyStatus::Cancelled => "assembly_cancel",
    }
}

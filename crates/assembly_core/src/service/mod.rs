//! Governance use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into registry, presence, voting and
//!   minutes use-cases.
//! - Enforce capability checks before any mutation.
//! - Publish notification events after commit.
//!
//! # Invariants
//! - Every mutating use-case runs in exactly one `IMMEDIATE` transaction;
//!   guard reads and writes happen under the same write lock.
//! - Collaborator calls (roster lookups) happen before the transaction
//!   starts so the write lock is never held across them.
//! - Events are published only after a successful commit.

pub mod assembly_service;
pub mod error;
pub mod minutes_service;
pub mod presence_service;
pub mod tally;
pub mod voting_service;

use crate::access::{require_capability, Actor, Capability};
use crate::collab::Collaborators;
use crate::model::assembly::{Assembly, AssemblyId, AssemblyStatus};
use crate::model::validation::{normalize_required, ValidationError};
use crate::model::UnitId;
use crate::repo::assembly_repo::{AssemblyRepository, SqliteAssemblyRepository};
use crate::logging::{sanitize_message, MAX_FIELD_CHARS};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

pub use assembly_service::AssemblyService;
pub use error::{GovernanceError, GovernanceResult};
pub use minutes_service::{verify_minutes, MinutesService};
pub use presence_service::PresenceService;
pub use voting_service::VotingService;

pub(crate) fn begin_immediate(conn: &Connection) -> GovernanceResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

pub(crate) fn authorize(
    collab: &Collaborators,
    actor: &Actor,
    capability: Capability,
) -> GovernanceResult<()> {
    require_capability(collab.authorizer.as_ref(), actor, capability).map_err(|capability| {
        GovernanceError::Unauthorized {
            user_id: actor.user_id.clone(),
            capability,
        }
    })
}

pub(crate) fn load_assembly(conn: &Connection, id: AssemblyId) -> GovernanceResult<Assembly> {
    SqliteAssemblyRepository::new(conn)
        .get_assembly(id)?
        .ok_or_else(|| GovernanceError::NotFound {
            entity: "assembly",
            id: id.to_string(),
        })
}

/// Rejects any operation on a finalized or cancelled assembly.
pub(crate) fn ensure_not_terminal(
    assembly: &Assembly,
    operation: &'static str,
) -> GovernanceResult<()> {
    if assembly.status.is_terminal() {
        return Err(GovernanceError::invalid_transition(
            "assembly",
            assembly.status.as_str(),
            operation,
        ));
    }
    Ok(())
}

pub(crate) fn ensure_open(assembly: &Assembly, operation: &'static str) -> GovernanceResult<()> {
    ensure_not_terminal(assembly, operation)?;
    if assembly.status != AssemblyStatus::Open {
        return Err(GovernanceError::AssemblyNotOpen {
            assembly_id: assembly.uuid,
            status: assembly.status.as_str(),
        });
    }
    Ok(())
}

/// Resolves the voter identity of `actor`.
pub(crate) fn actor_unit(actor: &Actor) -> GovernanceResult<UnitId> {
    let unit = actor
        .unit_id
        .as_deref()
        .ok_or(ValidationError::MissingUnit)?;
    Ok(normalize_required(unit, ValidationError::BlankUnit)?)
}

pub(crate) fn ensure_known_unit(
    collab: &Collaborators,
    assembly: &Assembly,
    unit_id: &str,
) -> GovernanceResult<()> {
    if collab.roster.has_unit(&assembly.condominium_id, unit_id)? {
        return Ok(());
    }
    Err(GovernanceError::NotFound {
        entity: "unit",
        id: unit_id.to_string(),
    })
}

/// Logs the outcome of one use-case and passes the result through.
pub(crate) fn finish<T>(
    module: &'static str,
    operation: &'static str,
    target: &str,
    started_at: Instant,
    result: GovernanceResult<T>,
) -> GovernanceResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    let target = sanitize_message(target, MAX_FIELD_CHARS);
    match &result {
        Ok(_) => info!(
            "event={operation} module={module} status=ok target={target} duration_ms={duration_ms}"
        ),
        Err(err @ GovernanceError::IntegrityViolation { .. }) => error!(
            "event={operation} module={module} status=integrity_violation target={target} duration_ms={duration_ms} error={err}"
        ),
        Err(err @ GovernanceError::Repo(_)) | Err(err @ GovernanceError::Collaborator(_)) => {
            error!(
                "event={operation} module={module} status=error target={target} duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            )
        }
        Err(err) => warn!(
            "event={operation} module={module} status=rejected target={target} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
    }
    result
}

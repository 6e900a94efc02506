#![allow(dead_code)]

use assembly_core::{
    Actor, Assembly, AssemblyConfig, AssemblyService, AssemblyType, CollaboratorError,
    Collaborators, NewAgendaItem, NewAssembly, PresenceService, QuorumType, StaticUnitRoster,
    UnitRoster, VotingService,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

pub const CONDO: &str = "condo-1";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn admin() -> Actor {
    Actor::administrator("sindico")
}

pub fn resident(unit: &str) -> Actor {
    Actor::resident(format!("user-{unit}"), unit)
}

/// Roster with units `A-1 ..= A-<count>`.
pub fn roster(count: u32) -> StaticUnitRoster {
    StaticUnitRoster::new().with_numbered_units(CONDO, "A-", count)
}

pub fn collab(roster: StaticUnitRoster) -> Collaborators {
    Collaborators::with_roster(Arc::new(roster))
}

/// Roster whose backing service is down.
pub struct UnavailableRoster;

impl UnitRoster for UnavailableRoster {
    fn total_units(&self, _condominium_id: &str) -> Result<u32, CollaboratorError> {
        Err(CollaboratorError::new("unit_roster", "service unavailable"))
    }

    fn has_unit(&self, _condominium_id: &str, _unit_id: &str) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::new("unit_roster", "service unavailable"))
    }

    fn is_delinquent(
        &self,
        _condominium_id: &str,
        _unit_id: &str,
    ) -> Result<bool, CollaboratorError> {
        Err(CollaboratorError::new("unit_roster", "service unavailable"))
    }
}

pub fn unavailable_collab() -> Collaborators {
    Collaborators::with_roster(Arc::new(UnavailableRoster))
}

pub fn unit(index: u32) -> String {
    format!("A-{index}")
}

pub fn tomorrow() -> i64 {
    assembly_core::db::now_epoch_ms() + DAY_MS
}

pub fn new_assembly(config: AssemblyConfig) -> NewAssembly {
    NewAssembly {
        condominium_id: CONDO.to_string(),
        title: "AGO 2026".to_string(),
        kind: AssemblyType::Formal,
        scheduled_at: tomorrow(),
        config,
    }
}

/// Creates, schedules and opens an assembly.
pub fn open_assembly(conn: &Connection, collab: &Collaborators, config: AssemblyConfig) -> Assembly {
    let service = AssemblyService::try_new(conn, collab.clone()).unwrap();
    let created = service
        .create_assembly(&admin(), &new_assembly(config))
        .unwrap();
    service.schedule(&admin(), created.uuid).unwrap();
    service.open(&admin(), created.uuid).unwrap()
}

pub fn check_in_units(
    conn: &Connection,
    collab: &Collaborators,
    assembly_id: Uuid,
    units: impl IntoIterator<Item = u32>,
) {
    let presence = PresenceService::try_new(conn, collab.clone()).unwrap();
    for index in units {
        presence
            .check_in(&resident(&unit(index)), assembly_id)
            .unwrap();
    }
}

/// Creates an item and opens it for voting.
pub fn voting_item(
    conn: &Connection,
    collab: &Collaborators,
    assembly_id: Uuid,
    quorum_type: QuorumType,
) -> Uuid {
    let voting = VotingService::try_new(conn, collab.clone()).unwrap();
    let item = voting
        .create_item(
            &admin(),
            &NewAgendaItem {
                assembly_id,
                title: "Facade renovation".to_string(),
                description: Some("Approve budget".to_string()),
                quorum_type,
            },
        )
        .unwrap();
    voting.open_for_voting(&admin(), item.uuid).unwrap();
    item.uuid
}

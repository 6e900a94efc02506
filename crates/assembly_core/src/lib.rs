//! Core governance engine for digital condominium assemblies.
//! This crate is the single source of truth for assembly, presence, voting
//! and minutes invariants.

pub mod access;
pub mod collab;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{Actor, Authorizer, Capability, Role, RoleAuthorizer};
pub use collab::{
    CollaboratorError, Collaborators, EventBus, GovernanceEvent, NoopSink, NotificationSink,
    StaticUnitRoster, UnitRoster,
};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::agenda::{
    AgendaItem, AgendaItemId, ItemOutcome, ItemResult, ItemStatus, NewAgendaItem, QuorumType,
    Tally, Vote, VoteChoice,
};
pub use model::assembly::{
    Assembly, AssemblyConfig, AssemblyId, AssemblyStatus, AssemblyType, NewAssembly,
};
pub use model::minutes::{Minutes, MinutesSnapshot};
pub use model::presence::{CheckInReceipt, PresenceRecord, QuorumStats};
pub use model::validation::ValidationError;
pub use model::UnitId;
pub use repo::assembly_repo::AssemblyListQuery;
pub use repo::{RepoError, RepoResult};
pub use service::{
    verify_minutes, AssemblyService, GovernanceError, GovernanceResult, MinutesService,
    PresenceService, VotingService,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

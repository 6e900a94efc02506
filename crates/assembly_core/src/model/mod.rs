//! Domain model for digital condominium assemblies.
//!
//! # Responsibility
//! - Define canonical records shared by registry, presence, voting, tally
//!   and minutes components.
//! - Own input validation rules that do not need storage access.
//!
//! # Invariants
//! - Every assembly and agenda item is identified by a stable UUID.
//! - Voting identity is the unit (`UnitId`), never the individual person.
//! - Presence records, votes and minutes are append-only once persisted.

pub mod agenda;
pub mod assembly;
pub mod minutes;
pub mod presence;
pub mod validation;

/// Addressable voting entity: a condominium unit label such as `"B-204"`.
pub type UnitId = String;

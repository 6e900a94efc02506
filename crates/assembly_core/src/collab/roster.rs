//! Unit-roster collaborator: eligible units and delinquency status.

use crate::collab::CollaboratorError;
use crate::model::UnitId;
use std::collections::{BTreeMap, BTreeSet};

/// Unit roster provider contract.
pub trait UnitRoster: Send + Sync {
    /// Number of units eligible to attend and vote.
    fn total_units(&self, condominium_id: &str) -> Result<u32, CollaboratorError>;
    /// Whether `unit_id` belongs to the condominium.
    fn has_unit(&self, condominium_id: &str, unit_id: &str) -> Result<bool, CollaboratorError>;
    /// Whether the unit is in arrears.
    fn is_delinquent(&self, condominium_id: &str, unit_id: &str)
        -> Result<bool, CollaboratorError>;
}

#[derive(Debug, Clone, Default)]
struct CondominiumUnits {
    units: BTreeSet<UnitId>,
    delinquent: BTreeSet<UnitId>,
}

/// Roster fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticUnitRoster {
    condominiums: BTreeMap<String, CondominiumUnits>,
}

impl StaticUnitRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds units to a condominium.
    pub fn with_units<I, S>(mut self, condominium_id: &str, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        let entry = self
            .condominiums
            .entry(condominium_id.to_string())
            .or_default();
        entry.units.extend(units.into_iter().map(Into::into));
        self
    }

    /// Adds `count` units labelled `"<prefix>1" ..= "<prefix><count>"`.
    pub fn with_numbered_units(self, condominium_id: &str, prefix: &str, count: u32) -> Self {
        self.with_units(
            condominium_id,
            (1..=count).map(|index| format!("{prefix}{index}")),
        )
    }

    /// Marks units as delinquent. Unknown units are added to the roster.
    pub fn with_delinquent<I, S>(mut self, condominium_id: &str, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        let entry = self
            .condominiums
            .entry(condominium_id.to_string())
            .or_default();
        for unit in units {
            let unit = unit.into();
            entry.units.insert(unit.clone());
            entry.delinquent.insert(unit);
        }
        self
    }

    fn condominium(&self, condominium_id: &str) -> Result<&CondominiumUnits, CollaboratorError> {
        self.condominiums.get(condominium_id).ok_or_else(|| {
            CollaboratorError::new(
                "unit_roster",
                format!("unknown condominium `{condominium_id}`"),
            )
        })
    }
}

impl UnitRoster for StaticUnitRoster {
    fn total_units(&self, condominium_id: &str) -> Result<u32, CollaboratorError> {
        let count = self.condominium(condominium_id)?.units.len();
        u32::try_from(count)
            .map_err(|_| CollaboratorError::new("unit_roster", "unit count exceeds u32"))
    }

    fn has_unit(&self, condominium_id: &str, unit_id: &str) -> Result<bool, CollaboratorError> {
        Ok(self.condominium(condominium_id)?.units.contains(unit_id))
    }

    fn is_delinquent(
        &self,
        condominium_id: &str,
        unit_id: &str,
    ) -> Result<bool, CollaboratorError> {
        Ok(self.condominium(condominium_id)?.delinquent.contains(unit_id))
    }
}

#[cfg(test)]
mod tests {
    use super::{StaticUnitRoster, UnitRoster};

    #[test]
    fn numbered_units_are_counted_and_resolvable() {
        let roster = StaticUnitRoster::new().with_numbered_units("condo", "A-", 10);
        assert_eq!(roster.total_units("condo").expect("total"), 10);
        assert!(roster.has_unit("condo", "A-10").expect("lookup"));
        assert!(!roster.has_unit("condo", "A-11").expect("lookup"));
    }

    #[test]
    fn delinquent_units_join_the_roster() {
        let roster = StaticUnitRoster::new()
            .with_units("condo", ["101", "102"])
            .with_delinquent("condo", ["103"]);
        assert_eq!(roster.total_units("condo").expect("total"), 3);
        assert!(roster.is_delinquent("condo", "103").expect("lookup"));
        assert!(!roster.is_delinquent("condo", "101").expect("lookup"));
    }

    #[test]
    fn unknown_condominium_is_a_collaborator_error() {
        let roster = StaticUnitRoster::new();
        let err = roster.total_units("nope").expect_err("unknown condo");
        assert_eq!(err.collaborator, "unit_roster");
    }
}

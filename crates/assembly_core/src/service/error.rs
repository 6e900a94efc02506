//! Error taxonomy shared by governance use-cases.
//!
//! Every rejection is a typed variant; nothing in the core signals failure by
//! returning a sentinel value or by silently ignoring a request.

use crate::access::Capability;
use crate::collab::CollaboratorError;
use crate::db::DbError;
use crate::model::agenda::AgendaItemId;
use crate::model::assembly::AssemblyId;
use crate::model::validation::ValidationError;
use crate::model::UnitId;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Service error for governance use-cases.
#[derive(Debug)]
pub enum GovernanceError {
    /// The requested lifecycle operation is illegal from the current status.
    InvalidStateTransition {
        entity: &'static str,
        from: &'static str,
        operation: &'static str,
    },
    /// The unit already holds a committed vote for this item.
    DuplicateVote {
        item_id: AgendaItemId,
        unit_id: UnitId,
    },
    /// Presence is required and the unit has not checked in.
    PresenceRequired {
        assembly_id: AssemblyId,
        unit_id: UnitId,
    },
    /// The unit is delinquent and the assembly blocks defaulters.
    VoterBlocked { unit_id: UnitId },
    /// Check-in or voting attempted outside an open session.
    AssemblyNotOpen {
        assembly_id: AssemblyId,
        status: &'static str,
    },
    /// The item is not accepting ballots.
    ItemNotVoting {
        item_id: AgendaItemId,
        status: &'static str,
    },
    /// Minutes were already generated for this assembly.
    AlreadyFinalized(AssemblyId),
    NotFound { entity: &'static str, id: String },
    Unauthorized {
        user_id: String,
        capability: Capability,
    },
    /// Stored minutes no longer match their digest.
    IntegrityViolation {
        assembly_id: AssemblyId,
        expected_digest: String,
        actual_digest: String,
    },
    /// Input rejected before any mutation.
    Validation(ValidationError),
    /// An external collaborator (roster, authorizer) failed.
    Collaborator(CollaboratorError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl GovernanceError {
    /// Whether the error means stored minutes no longer match their digest.
    ///
    /// This is the only condition the caller must not treat as a rejected
    /// request; the core never heals it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. })
    }

    /// Stable machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::DuplicateVote { .. } => "duplicate_vote",
            Self::PresenceRequired { .. } => "presence_required",
            Self::VoterBlocked { .. } => "voter_blocked",
            Self::AssemblyNotOpen { .. } => "assembly_not_open",
            Self::ItemNotVoting { .. } => "item_not_voting",
            Self::AlreadyFinalized(_) => "already_finalized",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::Validation(_) => "validation",
            Self::Collaborator(_) => "collaborator",
            Self::Repo(_) => "repo",
        }
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        from: &'static str,
        operation: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            from,
            operation,
        }
    }
}

impl Display for GovernanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStateTransition {
                entity,
                from,
                operation,
            } => write!(f, "cannot {operation} {entity} in status `{from}`"),
            Self::DuplicateVote { item_id, unit_id } => {
                write!(f, "unit {unit_id} already voted on item {item_id}")
            }
            Self::PresenceRequired {
                assembly_id,
                unit_id,
            } => write!(
                f,
                "unit {unit_id} must check in to assembly {assembly_id} before voting"
            ),
            Self::VoterBlocked { unit_id } => {
                write!(f, "unit {unit_id} is delinquent and may not vote")
            }
            Self::AssemblyNotOpen {
                assembly_id,
                status,
            } => write!(f, "assembly {assembly_id} is not open (status `{status}`)"),
            Self::ItemNotVoting { item_id, status } => {
                write!(f, "item {item_id} is not open for voting (status `{status}`)")
            }
            Self::AlreadyFinalized(assembly_id) => {
                write!(f, "assembly {assembly_id} is already finalized")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Unauthorized {
                user_id,
                capability,
            } => write!(
                f,
                "user {user_id} lacks capability `{}`",
                capability.as_str()
            ),
            Self::IntegrityViolation {
                assembly_id,
                expected_digest,
                actual_digest,
            } => write!(
                f,
                "minutes of assembly {assembly_id} fail integrity check: expected {expected_digest}, got {actual_digest}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Collaborator(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GovernanceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Collaborator(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GovernanceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for GovernanceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for GovernanceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<ValidationError> for GovernanceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CollaboratorError> for GovernanceError {
    fn from(value: CollaboratorError) -> Self {
        Self::Collaborator(value)
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Repo(RepoError::InvalidData(format!(
            "minutes snapshot encoding failed: {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::GovernanceError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_not_found_maps_to_service_not_found() {
        let err = GovernanceError::from(RepoError::NotFound {
            entity: "assembly",
            id: "x".to_string(),
        });
        assert!(matches!(err, GovernanceError::NotFound { entity: "assembly", .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn integrity_violation_is_fatal_and_rejections_are_not() {
        let integrity = GovernanceError::IntegrityViolation {
            assembly_id: Uuid::nil(),
            expected_digest: "aa".to_string(),
            actual_digest: "bb".to_string(),
        };
        assert!(integrity.is_fatal());
        assert_eq!(integrity.code(), "integrity_violation");

        let duplicate = GovernanceError::DuplicateVote {
            item_id: Uuid::nil(),
            unit_id: "A-1".to_string(),
        };
        assert!(!duplicate.is_fatal());
        assert!(duplicate.to_string().contains("already voted"));
    }
}

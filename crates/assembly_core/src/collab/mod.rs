//! External collaborator contracts consumed by the core.
//!
//! # Responsibility
//! - Define the unit-roster and notification-sink seams.
//! - Bundle collaborators (plus the authorizer) for service construction.
//! - Provide in-process implementations usable by embedders and tests.
//!
//! # Invariants
//! - Notification delivery never affects correctness: sinks are called
//!   after commit and their failures are swallowed by the sink.

pub mod events;
pub mod roster;

use crate::access::{Authorizer, RoleAuthorizer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use events::{EventBus, GovernanceEvent, NoopSink, NotificationSink};
pub use roster::{StaticUnitRoster, UnitRoster};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.collaborator, self.message)
    }
}

impl Error for CollaboratorError {}

/// Collaborators shared by all governance services.
#[derive(Clone)]
pub struct Collaborators {
    pub authorizer: Arc<dyn Authorizer>,
    pub roster: Arc<dyn UnitRoster>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Collaborators {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        roster: Arc<dyn UnitRoster>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            authorizer,
            roster,
            notifier,
        }
    }

    /// Role-based authorization, the given roster, and no notifications.
    pub fn with_roster(roster: Arc<dyn UnitRoster>) -> Self {
        Self::new(Arc::new(RoleAuthorizer), roster, Arc::new(NoopSink))
    }
}

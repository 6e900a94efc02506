//! Role enumeration and capability checks.

use crate::access::capability::Capability;
use crate::model::UnitId;
use log::warn;

/// The one role type consulted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Syndic or property manager running the assembly.
    Administrator,
    /// Owner, tenant or proxy representing a unit.
    Resident,
    /// Read-only participant (auditor, council guest).
    Observer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Resident => "resident",
            Self::Observer => "observer",
        }
    }

    /// Parses a role claim handed over by the session layer.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "administrator" => Some(Self::Administrator),
            "resident" => Some(Self::Resident),
            "observer" => Some(Self::Observer),
            _ => None,
        }
    }
}

/// Authenticated caller of a core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    /// Unit the caller represents; this is the voter identity.
    pub unit_id: Option<UnitId>,
}

impl Actor {
    pub fn administrator(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Administrator,
            unit_id: None,
        }
    }

    pub fn resident(user_id: impl Into<String>, unit_id: impl Into<UnitId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Resident,
            unit_id: Some(unit_id.into()),
        }
    }
}

/// Authorization provider contract (external collaborator).
pub trait Authorizer: Send + Sync {
    fn authorize(&self, actor: &Actor, capability: Capability) -> bool;
}

/// Default static mapping from [`Role`] to capabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, actor: &Actor, capability: Capability) -> bool {
        match actor.role {
            Role::Administrator => true,
            Role::Resident => matches!(capability, Capability::CheckIn | Capability::CastVote),
            Role::Observer => false,
        }
    }
}

/// The single capability gate used by every mutating operation.
///
/// Returns `Err(capability)` when the caller lacks it, leaving the mapping to
/// the service error type to the caller.
pub fn require_capability(
    authorizer: &dyn Authorizer,
    actor: &Actor,
    capability: Capability,
) -> Result<(), Capability> {
    if authorizer.authorize(actor, capability) {
        return Ok(());
    }

    warn!(
        "event=authorization module=access status=rejected user_id={} role={} capability={}",
        actor.user_id,
        actor.role.as_str(),
        capability.as_str()
    );
    Err(capability)
}

#[cfg(test)]
mod tests {
    use super::{require_capability, Actor, Role, RoleAuthorizer};
    use crate::access::capability::Capability;

    #[test]
    fn administrator_holds_every_capability() {
        let admin = Actor::administrator("sindico");
        for capability in [
            Capability::ManageAssembly,
            Capability::OpenAssembly,
            Capability::ManageAgenda,
            Capability::RegisterPresence,
        ] {
            require_capability(&RoleAuthorizer, &admin, capability)
                .expect("administrator should be allowed");
        }
    }

    #[test]
    fn resident_can_only_check_in_and_vote() {
        let resident = Actor::resident("maria", "A-101");
        require_capability(&RoleAuthorizer, &resident, Capability::CheckIn)
            .expect("resident check-in");
        require_capability(&RoleAuthorizer, &resident, Capability::CastVote)
            .expect("resident vote");

        let err = require_capability(&RoleAuthorizer, &resident, Capability::OpenAssembly)
            .expect_err("resident must not open assemblies");
        assert_eq!(err, Capability::OpenAssembly);
    }

    #[test]
    fn observer_is_denied_everything() {
        let observer = Actor {
            user_id: "auditor".to_string(),
            role: Role::Observer,
            unit_id: None,
        };
        assert!(require_capability(&RoleAuthorizer, &observer, Capability::CheckIn).is_err());
    }

    #[test]
    fn role_parse_accepts_known_claims_only() {
        assert_eq!(Role::parse(" resident "), Some(Role::Resident));
        assert_eq!(Role::parse("Administrator"), None);
        assert_eq!(Role::parse("admin"), None);
    }
}

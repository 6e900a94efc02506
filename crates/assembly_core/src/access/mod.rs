//! Caller roles, capabilities and the single authorization gate.
//!
//! Role resolution and session handling live outside the core; the core
//! only receives an [`Actor`] and asks an [`Authorizer`] whether it holds a
//! [`Capability`]. Every mutating operation goes through
//! [`require_capability`].

pub mod capability;
pub mod role;

pub use capability::Capability;
pub use role::{require_capability, Actor, Authorizer, Role, RoleAuthorizer};

//! Capabilities checked before mutating governance state.

/// Permission required by one class of governance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Create, schedule, close, finalize or cancel assemblies.
    ManageAssembly,
    /// Open a scheduled assembly for its session.
    OpenAssembly,
    /// Create agenda items and open/close them for voting.
    ManageAgenda,
    /// Check in the caller's own unit.
    CheckIn,
    /// Register presence on behalf of any unit.
    RegisterPresence,
    /// Cast the ballot of the caller's unit.
    CastVote,
}

impl Capability {
    /// Stable string id used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManageAssembly => "assembly.manage",
            Self::OpenAssembly => "assembly.open",
            Self::ManageAgenda => "agenda.manage",
            Self::CheckIn => "presence.check_in",
            Self::RegisterPresence => "presence.register",
            Self::CastVote => "vote.cast",
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::ManageAssembly => "Create, schedule, close, finalize or cancel an assembly.",
            Self::OpenAssembly => "Open a scheduled assembly session.",
            Self::ManageAgenda => "Create agenda items and open or close their voting.",
            Self::CheckIn => "Record attendance of your own unit.",
            Self::RegisterPresence => "Record attendance on behalf of any unit.",
            Self::CastVote => "Cast the vote of your own unit.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Capability;
    use std::collections::BTreeSet;

    #[test]
    fn capability_ids_are_unique() {
        let all = [
            Capability::ManageAssembly,
            Capability::OpenAssembly,
            Capability::ManageAgenda,
            Capability::CheckIn,
            Capability::RegisterPresence,
            Capability::CastVote,
        ];
        let ids: BTreeSet<&str> = all.iter().map(|cap| cap.as_str()).collect();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn exposes_user_facing_descriptions() {
        assert!(Capability::CastVote.description().contains("vote"));
        assert!(Capability::OpenAssembly.description().contains("assembly"));
    }
}

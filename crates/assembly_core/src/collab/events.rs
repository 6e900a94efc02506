//! State-change events and notification sinks.
//!
//! Clients subscribe to an [`EventBus`] instead of polling presence and
//! vote state. Ballot choices are never part of an event.

use crate::model::agenda::{AgendaItemId, ItemResult};
use crate::model::assembly::AssemblyId;
use crate::model::UnitId;
use tokio::sync::broadcast;

/// Event published after a governance transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceEvent {
    AssemblyScheduled {
        assembly_id: AssemblyId,
    },
    AssemblyOpened {
        assembly_id: AssemblyId,
    },
    AssemblyClosed {
        assembly_id: AssemblyId,
    },
    AssemblyFinalized {
        assembly_id: AssemblyId,
        digest: String,
    },
    AssemblyCancelled {
        assembly_id: AssemblyId,
    },
    PresenceRecorded {
        assembly_id: AssemblyId,
        unit_id: UnitId,
    },
    ItemOpenedForVoting {
        assembly_id: AssemblyId,
        item_id: AgendaItemId,
    },
    VoteRecorded {
        item_id: AgendaItemId,
        unit_id: UnitId,
    },
    ItemClosed {
        item_id: AgendaItemId,
        result: ItemResult,
    },
}

impl GovernanceEvent {
    /// Stable event name for logs and transports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AssemblyScheduled { .. } => "assembly_scheduled",
            Self::AssemblyOpened { .. } => "assembly_opened",
            Self::AssemblyClosed { .. } => "assembly_closed",
            Self::AssemblyFinalized { .. } => "assembly_finalized",
            Self::AssemblyCancelled { .. } => "assembly_cancelled",
            Self::PresenceRecorded { .. } => "presence_recorded",
            Self::ItemOpenedForVoting { .. } => "item_opened_for_voting",
            Self::VoteRecorded { .. } => "vote_recorded",
            Self::ItemClosed { .. } => "item_closed",
        }
    }
}

/// Fire-and-forget notification sink (external collaborator).
pub trait NotificationSink: Send + Sync {
    fn publish(&self, event: &GovernanceEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn publish(&self, _event: &GovernanceEvent) {}
}

/// Events a subscriber may fall behind by before it starts losing them.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// In-process subscription channel.
///
/// Each subscriber receives every event published after it subscribed, in
/// publication order. The buffer is bounded: a subscriber more than
/// `capacity` events behind gets `TryRecvError::Lagged` with the number of
/// events it missed, then resumes from the oldest retained event.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<GovernanceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<GovernanceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for EventBus {
    fn publish(&self, event: &GovernanceEvent) {
        // No subscribers is not a failure.
        let _ = self.sender.send(event.clone());
    }
}

mod common;

use assembly_core::db::open_db_in_memory;
use assembly_core::{
    AssemblyConfig, AssemblyService, Collaborators, EventBus, GovernanceEvent, ItemResult,
    NewAgendaItem, PresenceService, QuorumType, RoleAuthorizer, VoteChoice, VotingService,
};
use common::{admin, new_assembly, resident, roster};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

fn drain(receiver: &mut Receiver<GovernanceEvent>) -> Vec<GovernanceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn committed_state_changes_are_published_in_order() {
    let conn = open_db_in_memory().unwrap();
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let collab = Collaborators::new(Arc::new(RoleAuthorizer), Arc::new(roster(3)), bus.clone());

    let assemblies = AssemblyService::try_new(&conn, collab.clone()).unwrap();
    let assembly = assemblies
        .create_assembly(&admin(), &new_assembly(AssemblyConfig::default()))
        .unwrap();
    assemblies.schedule(&admin(), assembly.uuid).unwrap();
    assemblies.open(&admin(), assembly.uuid).unwrap();
    let assembly_id = assembly.uuid;
    assert_eq!(
        drain(&mut events),
        [
            GovernanceEvent::AssemblyScheduled { assembly_id },
            GovernanceEvent::AssemblyOpened { assembly_id },
        ]
    );

    let presence = PresenceService::try_new(&conn, collab.clone()).unwrap();
    presence.check_in(&resident("A-1"), assembly_id).unwrap();
    presence.check_in(&resident("A-1"), assembly_id).unwrap();
    presence.check_in(&resident("A-2"), assembly_id).unwrap();
    assert_eq!(
        drain(&mut events),
        [
            GovernanceEvent::PresenceRecorded {
                assembly_id,
                unit_id: "A-1".to_string(),
            },
            GovernanceEvent::PresenceRecorded {
                assembly_id,
                unit_id: "A-2".to_string(),
            },
        ]
    );

    let voting = VotingService::try_new(&conn, collab.clone()).unwrap();
    let item = voting
        .create_item(
            &admin(),
            &NewAgendaItem {
                assembly_id,
                title: "Facade".to_string(),
                description: None,
                quorum_type: QuorumType::Simple,
            },
        )
        .unwrap();
    voting.open_for_voting(&admin(), item.uuid).unwrap();
    voting
        .cast_vote(&resident("A-1"), item.uuid, VoteChoice::Yes)
        .unwrap();
    voting
        .cast_vote(&resident("A-1"), item.uuid, VoteChoice::No)
        .unwrap_err();
    voting
        .cast_vote(&resident("A-2"), item.uuid, VoteChoice::Yes)
        .unwrap();
    assert_eq!(
        drain(&mut events),
        [
            GovernanceEvent::ItemOpenedForVoting {
                assembly_id,
                item_id: item.uuid,
            },
            GovernanceEvent::VoteRecorded {
                item_id: item.uuid,
                unit_id: "A-1".to_string(),
            },
            GovernanceEvent::VoteRecorded {
                item_id: item.uuid,
                unit_id: "A-2".to_string(),
            },
        ]
    );

    assemblies.close(&admin(), assembly_id).unwrap();
    assert_eq!(
        drain(&mut events),
        [
            GovernanceEvent::ItemClosed {
                item_id: item.uuid,
                result: ItemResult::Approved,
            },
            GovernanceEvent::AssemblyClosed { assembly_id },
        ]
    );

    let minutes = assemblies.finalize(&admin(), assembly_id).unwrap();
    assert_eq!(
        drain(&mut events),
        [GovernanceEvent::AssemblyFinalized {
            assembly_id,
            digest: minutes.digest,
        }]
    );
}

#[test]
fn rejected_operations_publish_nothing() {
    let conn = open_db_in_memory().unwrap();
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let collab = Collaborators::new(Arc::new(RoleAuthorizer), Arc::new(roster(2)), bus.clone());

    let assemblies = AssemblyService::try_new(&conn, collab.clone()).unwrap();
    let assembly = assemblies
        .create_assembly(&admin(), &new_assembly(AssemblyConfig::default()))
        .unwrap();
    assemblies.open(&admin(), assembly.uuid).unwrap_err();
    assemblies.schedule(&resident("A-1"), assembly.uuid).unwrap_err();
    PresenceService::try_new(&conn, collab)
        .unwrap()
        .check_in(&resident("A-1"), assembly.uuid)
        .unwrap_err();

    assert!(drain(&mut events).is_empty());
}

mod common;

use assembly_core::db::open_db_in_memory;
use assembly_core::model::minutes::canonical_bytes;
use assembly_core::{
    AssemblyConfig, AssemblyService, Collaborators, GovernanceError, ItemResult, ItemStatus,
    Minutes, MinutesService, NewAgendaItem, QuorumType, VoteChoice, VotingService,
};
use common::{admin, check_in_units, collab, open_assembly, resident, roster, voting_item};
use rusqlite::Connection;

/// Opens, votes one approved item, leaves one pending, closes and finalizes.
fn finalized_assembly(conn: &Connection, collab: &Collaborators) -> Minutes {
    let assembly = open_assembly(conn, collab, AssemblyConfig::default());
    check_in_units(conn, collab, assembly.uuid, [3, 1, 2]);
    let item_id = voting_item(conn, collab, assembly.uuid, QuorumType::Simple);

    let voting = VotingService::try_new(conn, collab.clone()).unwrap();
    voting
        .create_item(
            &admin(),
            &NewAgendaItem {
                assembly_id: assembly.uuid,
                title: "Deferred".to_string(),
                description: None,
                quorum_type: QuorumType::TwoThirds,
            },
        )
        .unwrap();
    voting
        .cast_vote(&resident("A-1"), item_id, VoteChoice::Yes)
        .unwrap();
    voting
        .cast_vote(&resident("A-2"), item_id, VoteChoice::Yes)
        .unwrap();
    voting
        .cast_vote(&resident("A-3"), item_id, VoteChoice::No)
        .unwrap();
    voting.close_item(&admin(), item_id).unwrap();

    let service = AssemblyService::try_new(conn, collab.clone()).unwrap();
    service.close(&admin(), assembly.uuid).unwrap();
    service.finalize(&admin(), assembly.uuid).unwrap()
}

#[test]
fn finalized_minutes_verify_and_capture_the_session() {
    let conn = open_db_in_memory().unwrap();
    let collab = collab(roster(4));
    let minutes = finalized_assembly(&conn, &collab);
    assert_eq!(minutes.digest.len(), 64);

    let service = MinutesService::try_new(&conn).unwrap();
    let stored = service.verify_stored(minutes.assembly_id).unwrap();
    assert_eq!(stored, minutes);

    let snapshot = stored.decode_snapshot().unwrap();
    assert_eq!(snapshot.assembly.uuid, minutes.assembly_id);
    assert!(snapshot.assembly.closed_at.is_some());
    assert_eq!(snapshot.presence.present_units, 3);
    assert_eq!(snapshot.presence.total_units, 4);
    assert!(snapshot.presence.quorum_achieved);
    let units: Vec<&str> = snapshot
        .presence
        .units
        .iter()
        .map(|entry| entry.unit_id.as_str())
        .collect();
    assert_eq!(units, ["A-1", "A-2", "A-3"]);

    assert_eq!(snapshot.items.len(), 2);
    let decided = &snapshot.items[0];
    assert_eq!(decided.status, ItemStatus::Closed);
    let outcome = decided.outcome.unwrap();
    assert_eq!(outcome.result, ItemResult::Approved);
    assert_eq!((outcome.tally.yes, outcome.tally.no), (2, 1));
    let deferred = &snapshot.items[1];
    assert_eq!(deferred.status, ItemStatus::Pending);
    assert!(deferred.outcome.is_none());
}

#[test]
fn snapshot_encoding_is_deterministic() {
    let conn = open_db_in_memory().unwrap();
    let minutes = finalized_assembly(&conn, &collab(roster(4)));

    let decoded = minutes.decode_snapshot().unwrap();
    let reencoded = canonical_bytes(&decoded).unwrap();
    assert_eq!(reencoded, minutes.snapshot);
    let resealed = Minutes::seal(&decoded, minutes.generated_at).unwrap();
    assert_eq!(resealed.digest, minutes.digest);
}

#[test]
fn flipped_snapshot_byte_is_detected() {
    let conn = open_db_in_memory().unwrap();
    let mut minutes = finalized_assembly(&conn, &collab(roster(4)));
    let service = MinutesService::try_new(&conn).unwrap();

    let last = minutes.snapshot.len() - 2;
    minutes.snapshot[last] ^= 0x01;
    let err = service.verify(&minutes).unwrap_err();
    assert!(err.is_fatal());
    match err {
        GovernanceError::IntegrityViolation {
            assembly_id,
            expected_digest,
            actual_digest,
        } => {
            assert_eq!(assembly_id, minutes.assembly_id);
            assert_eq!(expected_digest, minutes.digest);
            assert_ne!(actual_digest, minutes.digest);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn tampering_with_stored_minutes_is_detected() {
    let conn = open_db_in_memory().unwrap();
    let minutes = finalized_assembly(&conn, &collab(roster(4)));

    // Simulate an out-of-band edit that bypasses the immutability trigger.
    conn.execute_batch("DROP TRIGGER minutes_no_update;").unwrap();
    let forged = String::from_utf8(minutes.snapshot.clone())
        .unwrap()
        .replace("\"approved\"", "\"rejected\"");
    conn.execute(
        "UPDATE minutes SET snapshot = ?1 WHERE assembly_uuid = ?2;",
        rusqlite::params![forged.into_bytes(), minutes.assembly_id.to_string()],
    )
    .unwrap();

    let service = MinutesService::try_new(&conn).unwrap();
    let err = service.verify_stored(minutes.assembly_id).unwrap_err();
    assert!(matches!(err, GovernanceError::IntegrityViolation { .. }));
    let err = service.verify_digest(&minutes.digest).unwrap_err();
    assert!(matches!(err, GovernanceError::IntegrityViolation { .. }));
}

#[test]
fn published_digest_resolves_to_its_minutes() {
    let conn = open_db_in_memory().unwrap();
    let minutes = finalized_assembly(&conn, &collab(roster(4)));
    let service = MinutesService::try_new(&conn).unwrap();

    let found = service
        .verify_digest(&format!("  {}  ", minutes.digest.to_uppercase()))
        .unwrap();
    assert_eq!(found.assembly_id, minutes.assembly_id);

    let err = service.verify_digest(&"0".repeat(64)).unwrap_err();
    assert!(matches!(err, GovernanceError::NotFound { entity: "minutes", .. }));
}

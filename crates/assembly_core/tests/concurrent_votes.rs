mod common;

use assembly_core::db::open_db;
use assembly_core::{AssemblyConfig, GovernanceError, QuorumType, VoteChoice, VotingService};
use common::{check_in_units, collab, open_assembly, resident, roster, unit, voting_item};
use std::sync::{Arc, Barrier};
use std::thread;

const VOTERS: u32 = 50;

#[test]
fn parallel_ballots_from_distinct_units_are_all_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assembly.db");
    let conn = open_db(&path).unwrap();
    let collab = collab(roster(VOTERS));
    let assembly = open_assembly(&conn, &collab, AssemblyConfig::default());
    check_in_units(&conn, &collab, assembly.uuid, 1..=VOTERS);
    let item_id = voting_item(&conn, &collab, assembly.uuid, QuorumType::Simple);

    let barrier = Arc::new(Barrier::new(VOTERS as usize));
    let handles: Vec<_> = (1..=VOTERS)
        .map(|index| {
            let worker_conn = open_db(&path).unwrap();
            let collab = collab.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let voting = VotingService::try_new(&worker_conn, collab).unwrap();
                barrier.wait();
                voting.cast_vote(&resident(&unit(index)), item_id, VoteChoice::Yes)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let voting = VotingService::try_new(&conn, collab).unwrap();
    assert_eq!(voting.list_votes(item_id).unwrap().len(), VOTERS as usize);
    assert_eq!(voting.live_tally(item_id).unwrap().yes, VOTERS);
}

#[test]
fn racing_ballots_from_one_unit_record_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assembly.db");
    let conn = open_db(&path).unwrap();
    let collab = collab(roster(4));
    let assembly = open_assembly(&conn, &collab, AssemblyConfig::default());
    check_in_units(&conn, &collab, assembly.uuid, [1]);
    let item_id = voting_item(&conn, &collab, assembly.uuid, QuorumType::Simple);

    let attempts = 16;
    let barrier = Arc::new(Barrier::new(attempts));
    let handles: Vec<_> = (0..attempts)
        .map(|attempt| {
            let worker_conn = open_db(&path).unwrap();
            let collab = collab.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let voting = VotingService::try_new(&worker_conn, collab).unwrap();
                let choice = if attempt % 2 == 0 {
                    VoteChoice::Yes
                } else {
                    VoteChoice::No
                };
                barrier.wait();
                voting.cast_vote(&resident("A-1"), item_id, choice)
            })
        })
        .collect();

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => accepted += 1,
            Err(GovernanceError::DuplicateVote { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(duplicates, attempts - 1);

    let voting = VotingService::try_new(&conn, collab).unwrap();
    assert_eq!(voting.list_votes(item_id).unwrap().len(), 1);
    assert_eq!(voting.live_tally(item_id).unwrap().total(), 1);
}

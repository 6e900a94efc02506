//! Agenda item and vote persistence.
//!
//! # Responsibility
//! - Store agenda items with deterministic ordering inside an assembly.
//! - Store votes under the `(item_uuid, voter_unit)` primary key, which is
//!   the only serialization point for concurrent ballots.
//! - Write the cached tally fields exactly once, when an item closes.
//!
//! # Invariants
//! - Item listing order is `order_index ASC`.
//! - A duplicate ballot is reported as `RepoError::Conflict`.
//! - `close_with_outcome` is a compare-and-set from `voting`.

use crate::db::is_unique_violation;
use crate::model::agenda::{
    AgendaItem, AgendaItemId, ItemOutcome, ItemResult, ItemStatus, QuorumType, Tally, Vote,
    VoteChoice,
};
use crate::model::assembly::AssemblyId;
use crate::repo::{ensure_schema_ready, parse_enum, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    assembly_uuid,
    order_index,
    title,
    description,
    quorum_type,
    status,
    result,
    yes_count,
    no_count,
    abstain_count,
    present_units,
    total_units,
    opened_at,
    closed_at
FROM agenda_items";

/// Repository interface for agenda items and their votes.
pub trait AgendaRepository {
    /// Inserts a pending item at the next free `order_index`.
    fn create_item(
        &self,
        item_id: AgendaItemId,
        assembly_id: AssemblyId,
        title: &str,
        description: Option<&str>,
        quorum_type: QuorumType,
    ) -> RepoResult<AgendaItem>;
    fn get_item(&self, item_id: AgendaItemId) -> RepoResult<Option<AgendaItem>>;
    fn list_items(&self, assembly_id: AssemblyId) -> RepoResult<Vec<AgendaItem>>;
    fn list_items_with_status(
        &self,
        assembly_id: AssemblyId,
        status: ItemStatus,
    ) -> RepoResult<Vec<AgendaItem>>;
    /// Compare-and-set `pending -> voting`.
    fn mark_voting(&self, item_id: AgendaItemId, at: i64) -> RepoResult<bool>;
    /// Compare-and-set `voting -> closed`, caching `outcome`.
    fn close_with_outcome(
        &self,
        item_id: AgendaItemId,
        outcome: &ItemOutcome,
        at: i64,
    ) -> RepoResult<bool>;
    fn insert_vote(&self, vote: &Vote) -> RepoResult<()>;
    /// Lists committed votes ordered by `voter_unit`.
    fn list_votes(&self, item_id: AgendaItemId) -> RepoResult<Vec<Vote>>;
    fn get_vote(&self, item_id: AgendaItemId, voter_unit: &str) -> RepoResult<Option<Vote>>;
}

/// SQLite-backed agenda repository.
pub struct SqliteAgendaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAgendaRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_items(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<AgendaItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }
}

impl AgendaRepository for SqliteAgendaRepository<'_> {
    fn create_item(
        &self,
        item_id: AgendaItemId,
        assembly_id: AssemblyId,
        title: &str,
        description: Option<&str>,
        quorum_type: QuorumType,
    ) -> RepoResult<AgendaItem> {
        let next_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), -1) + 1
             FROM agenda_items
             WHERE assembly_uuid = ?1;",
            [assembly_id.to_string()],
            |row| row.get(0),
        )?;

        let result = self.conn.execute(
            "INSERT INTO agenda_items (
                uuid,
                assembly_uuid,
                order_index,
                title,
                description,
                quorum_type,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending');",
            params![
                item_id.to_string(),
                assembly_id.to_string(),
                next_order,
                title,
                description,
                quorum_type.as_str(),
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::Conflict("agenda_items.order_index"));
            }
            Err(err) => return Err(err.into()),
        }

        self.get_item(item_id)?.ok_or_else(|| RepoError::NotFound {
            entity: "agenda item",
            id: item_id.to_string(),
        })
    }

    fn get_item(&self, item_id: AgendaItemId) -> RepoResult<Option<AgendaItem>> {
        let mut items = self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"),
            [item_id.to_string()],
        )?;
        Ok(items.pop())
    }

    fn list_items(&self, assembly_id: AssemblyId) -> RepoResult<Vec<AgendaItem>> {
        self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE assembly_uuid = ?1 ORDER BY order_index ASC;"),
            [assembly_id.to_string()],
        )
    }

    fn list_items_with_status(
        &self,
        assembly_id: AssemblyId,
        status: ItemStatus,
    ) -> RepoResult<Vec<AgendaItem>> {
        self.query_items(
            &format!(
                "{ITEM_SELECT_SQL}
                 WHERE assembly_uuid = ?1
                   AND status = ?2
                 ORDER BY order_index ASC;"
            ),
            params![assembly_id.to_string(), status.as_str()],
        )
    }

    fn mark_voting(&self, item_id: AgendaItemId, at: i64) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE agenda_items
             SET status = 'voting',
                 opened_at = ?2
             WHERE uuid = ?1
               AND status = 'pending';",
            params![item_id.to_string(), at],
        )?;
        Ok(changed == 1)
    }

    fn close_with_outcome(
        &self,
        item_id: AgendaItemId,
        outcome: &ItemOutcome,
        at: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE agenda_items
             SET status = 'closed',
                 result = ?2,
                 yes_count = ?3,
                 no_count = ?4,
                 abstain_count = ?5,
                 present_units = ?6,
                 total_units = ?7,
                 closed_at = ?8
             WHERE uuid = ?1
               AND status = 'voting';",
            params![
                item_id.to_string(),
                outcome.result.as_str(),
                i64::from(outcome.tally.yes),
                i64::from(outcome.tally.no),
                i64::from(outcome.tally.abstain),
                i64::from(outcome.present_units),
                i64::from(outcome.total_units),
                at,
            ],
        )?;
        Ok(changed == 1)
    }

    fn insert_vote(&self, vote: &Vote) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO votes (item_uuid, voter_unit, choice, cast_by, cast_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                vote.item_id.to_string(),
                vote.voter_unit.as_str(),
                vote.choice.as_str(),
                vote.cast_by.as_str(),
                vote.cast_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict("votes.voter_unit")),
            Err(err) => Err(err.into()),
        }
    }

    fn list_votes(&self, item_id: AgendaItemId) -> RepoResult<Vec<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_uuid, voter_unit, choice, cast_by, cast_at
             FROM votes
             WHERE item_uuid = ?1
             ORDER BY voter_unit ASC;",
        )?;
        let mut rows = stmt.query([item_id.to_string()])?;
        let mut votes = Vec::new();
        while let Some(row) = rows.next()? {
            votes.push(parse_vote_row(row)?);
        }
        Ok(votes)
    }

    fn get_vote(&self, item_id: AgendaItemId, voter_unit: &str) -> RepoResult<Option<Vote>> {
        let vote = self
            .conn
            .query_row(
                "SELECT item_uuid, voter_unit, choice, cast_by, cast_at
                 FROM votes
                 WHERE item_uuid = ?1
                   AND voter_unit = ?2;",
                params![item_id.to_string(), voter_unit],
                |row| Ok(parse_vote_row(row)),
            )
            .optional()?;
        vote.transpose()
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<AgendaItem> {
    let uuid_text: String = row.get("uuid")?;
    let assembly_text: String = row.get("assembly_uuid")?;
    let quorum_text: String = row.get("quorum_type")?;
    let status_text: String = row.get("status")?;
    let status = parse_enum(&status_text, "agenda_items.status", ItemStatus::parse)?;

    let outcome = match row.get::<_, Option<String>>("result")? {
        Some(result_text) => Some(ItemOutcome {
            tally: Tally {
                yes: required_count(row, "yes_count")?,
                no: required_count(row, "no_count")?,
                abstain: required_count(row, "abstain_count")?,
            },
            result: parse_enum(&result_text, "agenda_items.result", ItemResult::parse)?,
            present_units: required_count(row, "present_units")?,
            total_units: required_count(row, "total_units")?,
        }),
        None => None,
    };

    if (status == ItemStatus::Closed) != outcome.is_some() {
        return Err(RepoError::InvalidData(format!(
            "agenda item {uuid_text} has status `{status_text}` but cached result presence is {}",
            outcome.is_some()
        )));
    }

    Ok(AgendaItem {
        uuid: parse_uuid(&uuid_text, "agenda_items.uuid")?,
        assembly_id: parse_uuid(&assembly_text, "agenda_items.assembly_uuid")?,
        order_index: row.get("order_index")?,
        title: row.get("title")?,
        description: row.get("description")?,
        quorum_type: parse_enum(&quorum_text, "agenda_items.quorum_type", QuorumType::parse)?,
        status,
        outcome,
        opened_at: row.get("opened_at")?,
        closed_at: row.get("closed_at")?,
    })
}

fn required_count(row: &Row<'_>, column: &'static str) -> RepoResult<u32> {
    row.get::<_, Option<u32>>(column)?.ok_or_else(|| {
        RepoError::InvalidData(format!("missing cached count in agenda_items.{column}"))
    })
}

fn parse_vote_row(row: &Row<'_>) -> RepoResult<Vote> {
    let item_text: String = row.get("item_uuid")?;
    let choice_text: String = row.get("choice")?;
    Ok(Vote {
        item_id: parse_uuid(&item_text, "votes.item_uuid")?,
        voter_unit: row.get("voter_unit")?,
        choice: parse_enum(&choice_text, "votes.choice", VoteChoice::parse)?,
        cast_by: row.get("cast_by")?,
        cast_at: row.get("cast_at")?,
    })
}

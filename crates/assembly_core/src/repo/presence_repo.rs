//! Presence ledger persistence.
//!
//! # Invariants
//! - At most one row per `(assembly_uuid, unit_id)`; the primary key is the
//!   idempotency guard for check-in.
//! - Rows are never updated or deleted (enforced by triggers).

use crate::model::assembly::AssemblyId;
use crate::model::presence::PresenceRecord;
use crate::repo::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for presence records.
pub trait PresenceRepository {
    /// Inserts a record unless one exists; returns the stored record and
    /// whether this call created it.
    fn insert_if_absent(
        &self,
        assembly_id: AssemblyId,
        unit_id: &str,
        at: i64,
    ) -> RepoResult<(PresenceRecord, bool)>;
    fn get_presence(
        &self,
        assembly_id: AssemblyId,
        unit_id: &str,
    ) -> RepoResult<Option<PresenceRecord>>;
    /// Lists records ordered by `unit_id`.
    fn list_presence(&self, assembly_id: AssemblyId) -> RepoResult<Vec<PresenceRecord>>;
    fn count_presence(&self, assembly_id: AssemblyId) -> RepoResult<u32>;
}

/// SQLite-backed presence repository.
pub struct SqlitePresenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePresenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PresenceRepository for SqlitePresenceRepository<'_> {
    fn insert_if_absent(
        &self,
        assembly_id: AssemblyId,
        unit_id: &str,
        at: i64,
    ) -> RepoResult<(PresenceRecord, bool)> {
        let inserted = self.conn.execute(
            "INSERT INTO presence_records (assembly_uuid, unit_id, checked_in_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (assembly_uuid, unit_id) DO NOTHING;",
            params![assembly_id.to_string(), unit_id, at],
        )?;

        let record = self.get_presence(assembly_id, unit_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "presence for unit `{unit_id}` missing after insert"
            ))
        })?;
        Ok((record, inserted == 1))
    }

    fn get_presence(
        &self,
        assembly_id: AssemblyId,
        unit_id: &str,
    ) -> RepoResult<Option<PresenceRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT assembly_uuid, unit_id, checked_in_at
                 FROM presence_records
                 WHERE assembly_uuid = ?1
                   AND unit_id = ?2;",
                params![assembly_id.to_string(), unit_id],
                |row| Ok(parse_presence_row(row)),
            )
            .optional()?;
        record.transpose()
    }

    fn list_presence(&self, assembly_id: AssemblyId) -> RepoResult<Vec<PresenceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT assembly_uuid, unit_id, checked_in_at
             FROM presence_records
             WHERE assembly_uuid = ?1
             ORDER BY unit_id ASC;",
        )?;
        let mut rows = stmt.query([assembly_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_presence_row(row)?);
        }
        Ok(records)
    }

    fn count_presence(&self, assembly_id: AssemblyId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM presence_records
             WHERE assembly_uuid = ?1;",
            [assembly_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_presence_row(row: &Row<'_>) -> RepoResult<PresenceRecord> {
    let assembly_text: String = row.get("assembly_uuid")?;
    Ok(PresenceRecord {
        assembly_id: parse_uuid(&assembly_text, "presence_records.assembly_uuid")?,
        unit_id: row.get("unit_id")?,
        checked_in_at: row.get("checked_in_at")?,
    })
}

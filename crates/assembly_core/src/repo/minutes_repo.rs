//! Minutes persistence.
//!
//! # Invariants
//! - One minutes row per assembly; a second insert is `RepoError::Conflict`.
//! - Snapshot bytes are stored exactly as digested and never rewritten.

use crate::db::is_unique_violation;
use crate::model::assembly::AssemblyId;
use crate::model::minutes::Minutes;
use crate::repo::{ensure_schema_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for sealed minutes.
pub trait MinutesRepository {
    fn insert_minutes(&self, minutes: &Minutes) -> RepoResult<()>;
    fn get_minutes(&self, assembly_id: AssemblyId) -> RepoResult<Option<Minutes>>;
    /// Looks a record up by its digest.
    fn find_by_digest(&self, digest: &str) -> RepoResult<Option<Minutes>>;
}

/// SQLite-backed minutes repository.
pub struct SqliteMinutesRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMinutesRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, sql: &str, key: String) -> RepoResult<Option<Minutes>> {
        let minutes = self
            .conn
            .query_row(sql, [key], |row| Ok(parse_minutes_row(row)))
            .optional()?;
        minutes.transpose()
    }
}

impl MinutesRepository for SqliteMinutesRepository<'_> {
    fn insert_minutes(&self, minutes: &Minutes) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO minutes (assembly_uuid, generated_at, snapshot, digest)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                minutes.assembly_id.to_string(),
                minutes.generated_at,
                minutes.snapshot.as_slice(),
                minutes.digest.as_str(),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict("minutes")),
            Err(err) => Err(err.into()),
        }
    }

    fn get_minutes(&self, assembly_id: AssemblyId) -> RepoResult<Option<Minutes>> {
        self.find_one(
            "SELECT assembly_uuid, generated_at, snapshot, digest
             FROM minutes
             WHERE assembly_uuid = ?1;",
            assembly_id.to_string(),
        )
    }

    fn find_by_digest(&self, digest: &str) -> RepoResult<Option<Minutes>> {
        self.find_one(
            "SELECT assembly_uuid, generated_at, snapshot, digest
             FROM minutes
             WHERE digest = ?1;",
            digest.trim().to_ascii_lowercase(),
        )
    }
}

fn parse_minutes_row(row: &Row<'_>) -> RepoResult<Minutes> {
    let assembly_text: String = row.get("assembly_uuid")?;
    Ok(Minutes {
        assembly_id: parse_uuid(&assembly_text, "minutes.assembly_uuid")?,
        generated_at: row.get("generated_at")?,
        snapshot: row.get("snapshot")?,
        digest: row.get("digest")?,
    })
}

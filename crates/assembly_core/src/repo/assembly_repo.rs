//! Assembly repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Writes call `Assembly::validate()` before SQL mutations.
//! - Status changes go through `compare_and_set_status` only, which also
//!   stamps the timestamp column owned by the target status.

use crate::model::assembly::{
    Assembly, AssemblyConfig, AssemblyId, AssemblyStatus, AssemblyType,
};
use crate::model::validation::ValidationError;
use crate::repo::{
    bool_to_int, ensure_schema_ready, parse_enum, parse_flag, parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ASSEMBLY_SELECT_SQL: &str = "SELECT
    uuid,
    condominium_id,
    title,
    kind,
    scheduled_at,
    require_presence,
    block_defaulters,
    quorum_install,
    status,
    opened_at,
    closed_at,
    finalized_at,
    cancelled_at,
    created_at
FROM assemblies";

/// Query options for listing assemblies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyListQuery {
    pub condominium_id: Option<String>,
    pub status: Option<AssemblyStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for the assembly aggregate.
pub trait AssemblyRepository {
    fn create_assembly(&self, assembly: &Assembly) -> RepoResult<AssemblyId>;
    fn get_assembly(&self, id: AssemblyId) -> RepoResult<Option<Assembly>>;
    fn list_assemblies(&self, query: &AssemblyListQuery) -> RepoResult<Vec<Assembly>>;
    /// Moves `id` from `from` to `to` only if it is still in `from`.
    fn compare_and_set_status(
        &self,
        id: AssemblyId,
        from: AssemblyStatus,
        to: AssemblyStatus,
        at: i64,
    ) -> RepoResult<bool>;
}

/// SQLite-backed assembly repository.
pub struct SqliteAssemblyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssemblyRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AssemblyRepository for SqliteAssemblyRepository<'_> {
    fn create_assembly(&self, assembly: &Assembly) -> RepoResult<AssemblyId> {
        assembly.validate()?;

        self.conn.execute(
            "INSERT INTO assemblies (
                uuid,
                condominium_id,
                title,
                kind,
                scheduled_at,
                require_presence,
                block_defaulters,
                quorum_install,
                status,
                opened_at,
                closed_at,
                finalized_at,
                cancelled_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14);",
            params![
                assembly.uuid.to_string(),
                assembly.condominium_id.as_str(),
                assembly.title.as_str(),
                assembly.kind.as_str(),
                assembly.scheduled_at,
                bool_to_int(assembly.config.require_presence),
                bool_to_int(assembly.config.block_defaulters),
                i64::from(assembly.config.quorum_install),
                assembly.status.as_str(),
                assembly.opened_at,
                assembly.closed_at,
                assembly.finalized_at,
                assembly.cancelled_at,
                assembly.created_at,
            ],
        )?;

        Ok(assembly.uuid)
    }

    fn get_assembly(&self, id: AssemblyId) -> RepoResult<Option<Assembly>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ASSEMBLY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_assembly_row(row)?));
        }
        Ok(None)
    }

    fn list_assemblies(&self, query: &AssemblyListQuery) -> RepoResult<Vec<Assembly>> {
        let mut sql = format!("{ASSEMBLY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(condominium_id) = &query.condominium_id {
            sql.push_str(" AND condominium_id = ?");
            bind_values.push(Value::Text(condominium_id.clone()));
        }

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY scheduled_at DESC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut assemblies = Vec::new();
        while let Some(row) = rows.next()? {
            assemblies.push(parse_assembly_row(row)?);
        }
        Ok(assemblies)
    }

    fn compare_and_set_status(
        &self,
        id: AssemblyId,
        from: AssemblyStatus,
        to: AssemblyStatus,
        at: i64,
    ) -> RepoResult<bool> {
        let stamp_column = match to {
            AssemblyStatus::Open => Some("opened_at"),
            AssemblyStatus::VotingClosed => Some("closed_at"),
            AssemblyStatus::Finalized => Some("finalized_at"),
            AssemblyStatus::Cancelled => Some("cancelled_at"),
            AssemblyStatus::Draft | AssemblyStatus::Scheduled => None,
        };

        let changed = match stamp_column {
            Some(column) => self.conn.execute(
                &format!(
                    "UPDATE assemblies
                     SET status = ?3,
                         {column} = ?4,
                         updated_at = ?4
                     WHERE uuid = ?1
                       AND status = ?2;"
                ),
                params![id.to_string(), from.as_str(), to.as_str(), at],
            )?,
            None => self.conn.execute(
                "UPDATE assemblies
                 SET status = ?3,
                     updated_at = ?4
                 WHERE uuid = ?1
                   AND status = ?2;",
                params![id.to_string(), from.as_str(), to.as_str(), at],
            )?,
        };

        Ok(changed == 1)
    }
}

fn invalid_assembly(err: ValidationError) -> RepoError {
    RepoError::InvalidData(format!("persisted assembly fails validation: {err}"))
}

fn parse_assembly_row(row: &Row<'_>) -> RepoResult<Assembly> {
    let uuid_text: String = row.get("uuid")?;
    let kind_text: String = row.get("kind")?;
    let status_text: String = row.get("status")?;
    let quorum_install: i64 = row.get("quorum_install")?;
    let quorum_install = u8::try_from(quorum_install).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid quorum `{quorum_install}` in assemblies.quorum_install"
        ))
    })?;

    let assembly = Assembly {
        uuid: parse_uuid(&uuid_text, "assemblies.uuid")?,
        condominium_id: row.get("condominium_id")?,
        title: row.get("title")?,
        kind: parse_enum(&kind_text, "assemblies.kind", AssemblyType::parse)?,
        scheduled_at: row.get("scheduled_at")?,
        config: AssemblyConfig {
            require_presence: parse_flag(
                row.get("require_presence")?,
                "assemblies.require_presence",
            )?,
            block_defaulters: parse_flag(
                row.get("block_defaulters")?,
                "assemblies.block_defaulters",
            )?,
            quorum_install,
        },
        status: parse_enum(&status_text, "assemblies.status", AssemblyStatus::parse)?,
        opened_at: row.get("opened_at")?,
        closed_at: row.get("closed_at")?,
        finalized_at: row.get("finalized_at")?,
        cancelled_at: row.get("cancelled_at")?,
        created_at: row.get("created_at")?,
    };
    assembly.validate().map_err(invalid_assembly)?;
    Ok(assembly)
}

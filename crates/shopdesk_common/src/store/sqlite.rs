//! SQLite store
//!
//! Schema:
//! - entities: id, kind, scope, status, version, timestamps
//! - entity_flags: one row per (entity, flag); exclusive flags are guarded by
//!   a partial unique index so the database rejects two holders per scope
//! - entity_stamps: status/flag timestamps (shipped_at, verified_at, ...)
//! - entity_usages: real usage counter rows for discounts and campaigns
//! - status_events: the journal

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{EntityRepo, EntityStore};
use crate::catalog;
use crate::entity::{Entity, EntityId, EntityKind, NewEntity, ScopeId};
use crate::error::{StatusError, StatusResult};
use crate::events::{EventAction, StatusEvent};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        scope_id INTEGER,
        status TEXT,
        version INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_kind_scope ON entities(kind, scope_id);
    CREATE INDEX IF NOT EXISTS idx_entities_kind_status ON entities(kind, status);

    CREATE TABLE IF NOT EXISTS entity_flags (
        entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        scope_id INTEGER,
        flag TEXT NOT NULL,
        value INTEGER NOT NULL,
        exclusive INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (entity_id, flag)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_exclusive_flag
        ON entity_flags(kind, scope_id, flag)
        WHERE value = 1 AND exclusive = 1;

    CREATE TABLE IF NOT EXISTS entity_stamps (
        entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        field TEXT NOT NULL,
        at TEXT NOT NULL,
        PRIMARY KEY (entity_id, field)
    );

    CREATE TABLE IF NOT EXISTS entity_usages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
        reference TEXT NOT NULL,
        used_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_usages_entity ON entity_usages(entity_id);

    CREATE TABLE IF NOT EXISTS status_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        entity_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        action TEXT NOT NULL,
        detail TEXT NOT NULL,
        at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_at ON status_events(at);
"#;

fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StatusResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StatusError::Storage(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_kind(raw: &str) -> StatusResult<EntityKind> {
    EntityKind::parse(raw).ok_or_else(|| StatusError::Storage(format!("unknown kind '{}'", raw)))
}

/// SQLite-backed entity store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> StatusResult<Self> {
        let path = path.as_ref();
        debug!("Opening entity database at {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StatusError::Storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers proceed while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> StatusResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StatusResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl EntityStore for SqliteStore {
    fn atomically<R, F>(&self, f: F) -> StatusResult<R>
    where
        F: FnOnce(&dyn EntityRepo) -> StatusResult<R>,
    {
        // IMMEDIATE takes the write lock up front so read-then-write
        // sequences cannot interleave with another writer
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let repo = SqliteRepo { conn: &tx };
        let result = f(&repo)?;
        tx.commit()?;
        Ok(result)
    }
}

struct SqliteRepo<'a> {
    conn: &'a Connection,
}

struct EntityRow {
    id: i64,
    kind: String,
    scope_id: Option<i64>,
    status: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

const ENTITY_COLUMNS: &str = "id, kind, scope_id, status, version, created_at, updated_at";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok(EntityRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        scope_id: row.get(2)?,
        status: row.get(3)?,
        version: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl<'a> SqliteRepo<'a> {
    fn hydrate(&self, row: EntityRow) -> StatusResult<Entity> {
        let mut flags = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT flag, value FROM entity_flags WHERE entity_id = ?1")?;
        let rows = stmt.query_map(params![row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, bool>(1)?))
        })?;
        for pair in rows {
            let (flag, value) = pair?;
            flags.insert(flag, value);
        }

        let mut stamps = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT field, at FROM entity_stamps WHERE entity_id = ?1")?;
        let rows = stmt.query_map(params![row.id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        for pair in rows {
            let (field, at) = pair?;
            stamps.insert(field, parse_ts(&at)?);
        }

        Ok(Entity {
            id: EntityId(row.id),
            kind: parse_kind(&row.kind)?,
            scope_id: row.scope_id.map(ScopeId),
            flags,
            status: row.status,
            stamps,
            version: row.version as u64,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }

    fn query_entities(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StatusResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn write_flags(&self, entity: &Entity) -> StatusResult<()> {
        let schema = catalog::schema(entity.kind);
        self.conn.execute(
            "DELETE FROM entity_flags WHERE entity_id = ?1",
            params![entity.id.0],
        )?;

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO entity_flags (entity_id, kind, scope_id, flag, value, exclusive)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (flag, value) in &entity.flags {
            let exclusive = schema.flag(flag).map(|f| f.exclusive).unwrap_or(false);
            stmt.execute(params![
                entity.id.0,
                entity.kind.as_str(),
                entity.scope_id.map(|s| s.0),
                flag,
                value,
                exclusive,
            ])?;
        }
        Ok(())
    }

    fn write_stamps(&self, entity: &Entity) -> StatusResult<()> {
        self.conn.execute(
            "DELETE FROM entity_stamps WHERE entity_id = ?1",
            params![entity.id.0],
        )?;

        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO entity_stamps (entity_id, field, at) VALUES (?1, ?2, ?3)")?;
        for (field, at) in &entity.stamps {
            stmt.execute(params![entity.id.0, field, format_ts(*at)])?;
        }
        Ok(())
    }
}

impl<'a> EntityRepo for SqliteRepo<'a> {
    fn find(&self, id: EntityId) -> StatusResult<Option<Entity>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS),
                params![id.0],
                read_row,
            )
            .optional()?;

        row.map(|r| self.hydrate(r)).transpose()
    }

    fn find_all_in_scope(&self, kind: EntityKind, scope: ScopeId) -> StatusResult<Vec<Entity>> {
        self.query_entities(
            &format!(
                "SELECT {} FROM entities WHERE kind = ?1 AND scope_id = ?2 ORDER BY id",
                ENTITY_COLUMNS
            ),
            &[&kind.as_str(), &scope.0],
        )
    }

    fn list(&self, kind: EntityKind) -> StatusResult<Vec<Entity>> {
        self.query_entities(
            &format!("SELECT {} FROM entities WHERE kind = ?1 ORDER BY id", ENTITY_COLUMNS),
            &[&kind.as_str()],
        )
    }

    fn insert(&self, new: &NewEntity, status: Option<&str>, at: DateTime<Utc>) -> StatusResult<Entity> {
        let ts = format_ts(at);
        self.conn.execute(
            "INSERT INTO entities (kind, scope_id, status, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            params![new.kind.as_str(), new.scope_id.map(|s| s.0), status, ts],
        )?;

        let id = EntityId(self.conn.last_insert_rowid());
        let entity = Entity {
            id,
            kind: new.kind,
            scope_id: new.scope_id,
            flags: new.flags.clone(),
            status: status.map(str::to_string),
            stamps: BTreeMap::new(),
            version: 1,
            created_at: parse_ts(&ts)?,
            updated_at: parse_ts(&ts)?,
        };
        self.write_flags(&entity)?;
        Ok(entity)
    }

    fn save(&self, entity: &Entity) -> StatusResult<Entity> {
        let stored: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM entities WHERE id = ?1",
                params![entity.id.0],
                |r| r.get(0),
            )
            .optional()?;

        let stored = stored.ok_or(StatusError::NotFound { id: entity.id })? as u64;
        if stored != entity.version {
            return Err(StatusError::ConcurrentModification {
                id: entity.id,
                expected: entity.version,
                found: stored,
            });
        }

        let changed = self.conn.execute(
            "UPDATE entities
             SET scope_id = ?1, status = ?2, version = version + 1, updated_at = ?3
             WHERE id = ?4 AND version = ?5",
            params![
                entity.scope_id.map(|s| s.0),
                entity.status,
                format_ts(entity.updated_at),
                entity.id.0,
                entity.version as i64,
            ],
        )?;
        if changed == 0 {
            return Err(StatusError::ConcurrentModification {
                id: entity.id,
                expected: entity.version,
                found: stored + 1,
            });
        }

        self.write_flags(entity)?;
        self.write_stamps(entity)?;

        self.find(entity.id)?
            .ok_or(StatusError::NotFound { id: entity.id })
    }

    fn count(&self, kind: EntityKind) -> StatusResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?1",
            params![kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn count_flag(&self, kind: EntityKind, flag: &str, value: bool) -> StatusResult<u64> {
        // A missing flag row reads as false
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities e
             WHERE e.kind = ?1
               AND COALESCE(
                   (SELECT f.value FROM entity_flags f WHERE f.entity_id = e.id AND f.flag = ?2),
                   0
               ) = ?3",
            params![kind.as_str(), flag, value],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn count_by_status(&self, kind: EntityKind) -> StatusResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM entities
             WHERE kind = ?1 AND status IS NOT NULL
             GROUP BY status",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for pair in rows {
            let (status, n) = pair?;
            counts.insert(status, n as u64);
        }
        Ok(counts)
    }

    fn record_usage(&self, id: EntityId, reference: &str, at: DateTime<Utc>) -> StatusResult<()> {
        if self.find(id)?.is_none() {
            return Err(StatusError::NotFound { id });
        }
        self.conn.execute(
            "INSERT INTO entity_usages (entity_id, reference, used_at) VALUES (?1, ?2, ?3)",
            params![id.0, reference, format_ts(at)],
        )?;
        Ok(())
    }

    fn usage_count(&self, id: EntityId) -> StatusResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entity_usages WHERE entity_id = ?1",
            params![id.0],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    fn append_event(&self, event: &StatusEvent) -> StatusResult<()> {
        self.conn.execute(
            "INSERT INTO status_events (id, entity_id, kind, action, detail, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id.to_string(),
                event.entity_id.0,
                event.kind.as_str(),
                event.action.as_str(),
                event.detail,
                format_ts(event.at),
            ],
        )?;
        Ok(())
    }

    fn recent_events(&self, limit: usize) -> StatusResult<Vec<StatusEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, kind, action, detail, at FROM status_events
             ORDER BY at DESC, seq DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, entity_id, kind, action, detail, at)| {
                Ok(StatusEvent {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| StatusError::Storage(format!("bad event id '{}': {}", id, e)))?,
                    entity_id: EntityId(entity_id),
                    kind: parse_kind(&kind)?,
                    action: EventAction::parse(&action)
                        .ok_or_else(|| StatusError::Storage(format!("unknown action '{}'", action)))?,
                    detail,
                    at: parse_ts(&at)?,
                })
            })
            .collect()
    }
}

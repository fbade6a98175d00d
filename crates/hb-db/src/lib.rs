//! `SQLite` storage for heartbeats, summaries, aliases and labels.
//!
//! Implements every storage trait of `hb-core` on a single `rusqlite`
//! connection.
//!
//! # Thread Safety
//!
//! The connection sits behind a `Mutex`, so a [`Database`] is `Sync` and can
//! be shared with the parallel gap recomputation in `hb-core`. Queries are
//! serialized on the connection.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision and a `Z` suffix (e.g., `2024-01-15T10:30:00.000Z`), so
//! lexicographic ordering matches chronological ordering.
//!
//! ## Deduplication
//!
//! `heartbeats` is unique on `(user_id, hash)`; inserts use `INSERT OR IGNORE`
//! so re-submitted heartbeats are dropped without error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use hb_core::{
    Alias, AliasStore, Filters, Heartbeat, HeartbeatStore, LabelStore, ProjectLabel, Summary,
    SummaryItem, SummaryKind, SummaryStore, UNKNOWN_KEY, UserId, ValidationError,
};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp: {timestamp}")]
    TimestampParse {
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value is not a valid domain value.
    #[error("invalid stored record: {0}")]
    InvalidRecord(#[from] ValidationError),
    /// Another thread panicked while holding the connection.
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl From<DbError> for hb_core::Error {
    fn from(err: DbError) -> Self {
        Self::upstream(err)
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
    /// Aliases per user, filled by [`AliasStore::initialize_user`].
    alias_cache: RwLock<HashMap<UserId, Vec<Alias>>>,
}

const HEARTBEAT_COLUMNS: &str = "id, user_id, entity, type, category, project, branch, language, \
     is_write, editor, operating_system, machine, user_agent, time, hash, origin, origin_id";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Mutex::new(conn),
            alias_cache: RwLock::new(HashMap::new()),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS heartbeats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                entity TEXT NOT NULL,
                type TEXT NOT NULL,
                category TEXT NOT NULL,
                project TEXT NOT NULL,
                branch TEXT NOT NULL,
                language TEXT NOT NULL,
                is_write INTEGER NOT NULL DEFAULT 0,
                editor TEXT NOT NULL,
                operating_system TEXT NOT NULL,
                machine TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                time TEXT NOT NULL,
                hash TEXT NOT NULL,
                origin TEXT NOT NULL,
                origin_id TEXT NOT NULL,
                UNIQUE (user_id, hash)
            );

            CREATE INDEX IF NOT EXISTS idx_heartbeats_user_time ON heartbeats(user_id, time);

            -- from_time/to_time: covered range, RFC 3339 (see module docs)
            CREATE TABLE IF NOT EXISTS summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                from_time TEXT NOT NULL,
                to_time TEXT NOT NULL,
                num_heartbeats INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_summaries_user_range
                ON summaries(user_id, from_time, to_time);

            CREATE TABLE IF NOT EXISTS summary_items (
                summary_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                total_ms INTEGER NOT NULL,
                PRIMARY KEY (summary_id, kind, key),
                FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
            );

            -- key: canonical name, value: raw name reported by clients
            CREATE TABLE IF NOT EXISTS aliases (
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (user_id, kind, value)
            );

            CREATE TABLE IF NOT EXISTS project_labels (
                user_id TEXT NOT NULL,
                project_key TEXT NOT NULL,
                label TEXT NOT NULL,
                PRIMARY KEY (user_id, project_key, label)
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts heartbeats, ignoring hashes the user already has.
    pub fn insert_heartbeats(&self, heartbeats: &[Heartbeat]) -> Result<usize, DbError> {
        if heartbeats.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO heartbeats
                (user_id, entity, type, category, project, branch, language, is_write,
                 editor, operating_system, machine, user_agent, time, hash, origin, origin_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for hb in heartbeats {
                inserted += stmt.execute(params![
                    hb.user_id.as_str(),
                    hb.entity,
                    hb.kind,
                    hb.category,
                    hb.project,
                    hb.branch,
                    hb.language,
                    hb.is_write,
                    hb.editor,
                    hb.operating_system,
                    hb.machine,
                    hb.user_agent,
                    format_timestamp(hb.time),
                    hb.hash,
                    hb.origin,
                    hb.origin_id,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            submitted = heartbeats.len(),
            inserted,
            "inserted heartbeats"
        );
        Ok(inserted)
    }

    /// Lists a user's heartbeats in `[from, to)` matching `filters`, ordered
    /// by time then ID.
    pub fn list_heartbeats(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        filters: &Filters,
    ) -> Result<Vec<Heartbeat>, DbError> {
        if to <= from || filters.rejects_all() {
            return Ok(Vec::new());
        }
        let mut query = format!(
            "SELECT {HEARTBEAT_COLUMNS} FROM heartbeats WHERE user_id = ? AND time >= ? AND time < ?"
        );
        let mut args = vec![
            user.to_string(),
            format_timestamp(from),
            format_timestamp(to),
        ];
        for (kind, accepted) in filters.iter() {
            let Some(column) = heartbeat_column(kind) else {
                continue;
            };
            let mut values: Vec<String> = accepted.iter().cloned().collect();
            if accepted.contains(UNKNOWN_KEY) {
                values.push(String::new());
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            query.push_str(&format!(" AND {column} IN ({placeholders})"));
            args.extend(values);
        }
        query.push_str(" ORDER BY time ASC, id ASC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), HeartbeatRow::from_row)?;
        let mut heartbeats = Vec::new();
        for row in rows {
            heartbeats.push(row?.into_heartbeat()?);
        }
        Ok(heartbeats)
    }

    fn edge_heartbeat(&self, user: &UserId, newest: bool) -> Result<Option<Heartbeat>, DbError> {
        let order = if newest { "DESC" } else { "ASC" };
        let query = format!(
            "SELECT {HEARTBEAT_COLUMNS} FROM heartbeats WHERE user_id = ? \
             ORDER BY time {order}, id {order} LIMIT 1"
        );
        let conn = self.conn()?;
        conn.query_row(&query, [user.as_str()], HeartbeatRow::from_row)
            .optional()?
            .map(HeartbeatRow::into_heartbeat)
            .transpose()
    }

    /// Number of heartbeats stored for `user`.
    pub fn count_heartbeats(&self, user: &UserId) -> Result<u64, DbError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM heartbeats WHERE user_id = ?",
            [user.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Persists a summary with all its items, returning the new row ID.
    pub fn insert_summary(&self, summary: &Summary) -> Result<i64, DbError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO summaries (user_id, from_time, to_time, num_heartbeats) VALUES (?, ?, ?, ?)",
            params![
                summary.user_id.as_str(),
                format_timestamp(summary.from),
                format_timestamp(summary.to),
                i64::try_from(summary.num_heartbeats).unwrap_or(i64::MAX),
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO summary_items (summary_id, kind, key, total_ms) VALUES (?, ?, ?, ?)",
            )?;
            for kind in SummaryKind::ALL {
                for item in summary.items(kind) {
                    stmt.execute(params![
                        id,
                        kind.as_str(),
                        item.key,
                        item.total.num_milliseconds()
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(id)
    }

    /// Lists a user's summaries lying entirely within `[from, to]`, ordered by
    /// start.
    pub fn list_summaries(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Summary>, DbError> {
        let conn = self.conn()?;
        let (from, to) = (format_timestamp(from), format_timestamp(to));

        let mut stmt = conn.prepare(
            "
            SELECT id, from_time, to_time, num_heartbeats
            FROM summaries
            WHERE user_id = ? AND from_time >= ? AND to_time <= ?
            ORDER BY from_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(params![user.as_str(), from, to], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut summaries = Vec::new();
        let mut index = HashMap::new();
        for row in rows {
            let (id, from_time, to_time, num_heartbeats) = row?;
            let mut summary = Summary::empty(
                user.clone(),
                parse_timestamp(&from_time)?,
                parse_timestamp(&to_time)?,
            );
            summary.id = Some(id);
            summary.num_heartbeats = u64::try_from(num_heartbeats).unwrap_or_default();
            index.insert(id, summaries.len());
            summaries.push(summary);
        }

        let mut stmt = conn.prepare(
            "
            SELECT i.summary_id, i.kind, i.key, i.total_ms
            FROM summary_items i
            JOIN summaries s ON s.id = i.summary_id
            WHERE s.user_id = ? AND s.from_time >= ? AND s.to_time <= ?
            ORDER BY i.summary_id ASC, i.kind ASC, i.key ASC
            ",
        )?;
        let rows = stmt.query_map(params![user.as_str(), from, to], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        for row in rows {
            let (summary_id, kind, key, total_ms) = row?;
            let kind: SummaryKind = kind.parse()?;
            if let Some(summary) = index.get(&summary_id).and_then(|i| summaries.get_mut(*i)) {
                summary
                    .items_mut(kind)
                    .push(SummaryItem::new(kind, key, TimeDelta::milliseconds(total_ms)));
            }
        }
        Ok(summaries)
    }

    /// Adds or replaces the alias for `alias.value` and drops the user's
    /// cached aliases.
    pub fn add_alias(&self, alias: &Alias) -> Result<(), DbError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO aliases (user_id, kind, key, value) VALUES (?, ?, ?, ?)",
            params![
                alias.user_id.as_str(),
                alias.kind.as_str(),
                alias.key,
                alias.value
            ],
        )?;
        self.alias_cache
            .write()
            .map_err(|_| DbError::LockPoisoned)?
            .remove(&alias.user_id);
        Ok(())
    }

    fn load_aliases(&self, user: &UserId) -> Result<Vec<Alias>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, key, value FROM aliases WHERE user_id = ? ORDER BY kind, key, value",
        )?;
        let rows = stmt.query_map([user.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut aliases = Vec::new();
        for row in rows {
            let (kind, key, value) = row?;
            aliases.push(Alias {
                user_id: user.clone(),
                kind: kind.parse()?,
                key,
                value,
            });
        }
        Ok(aliases)
    }

    /// Lists a user's aliases grouped by kind then canonical key.
    pub fn list_aliases(&self, user: &UserId) -> Result<Vec<Alias>, DbError> {
        self.aliases(user)
    }

    /// The user's aliases, served from the cache once initialized.
    fn aliases(&self, user: &UserId) -> Result<Vec<Alias>, DbError> {
        if let Some(cached) = self
            .alias_cache
            .read()
            .map_err(|_| DbError::LockPoisoned)?
            .get(user)
        {
            return Ok(cached.clone());
        }
        let aliases = self.load_aliases(user)?;
        self.alias_cache
            .write()
            .map_err(|_| DbError::LockPoisoned)?
            .insert(user.clone(), aliases.clone());
        Ok(aliases)
    }

    /// Attaches a label to a project. Returns false if it was already attached.
    pub fn add_label(&self, label: &ProjectLabel) -> Result<bool, DbError> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO project_labels (user_id, project_key, label) VALUES (?, ?, ?)",
            params![label.user_id.as_str(), label.project_key, label.label],
        )?;
        Ok(inserted > 0)
    }

    /// Lists a user's project labels ordered by label then project.
    pub fn list_labels(&self, user: &UserId) -> Result<Vec<ProjectLabel>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT project_key, label FROM project_labels WHERE user_id = ? ORDER BY label, project_key",
        )?;
        let rows = stmt.query_map([user.as_str()], |row| {
            Ok(ProjectLabel {
                user_id: user.clone(),
                project_key: row.get(0)?,
                label: row.get(1)?,
            })
        })?;
        let mut labels = Vec::new();
        for row in rows {
            labels.push(row?);
        }
        Ok(labels)
    }
}

impl HeartbeatStore for Database {
    fn get_all_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
    ) -> hb_core::Result<Vec<Heartbeat>> {
        Ok(self.list_heartbeats(user, from, to, &Filters::new())?)
    }

    fn get_all_within_by_filters(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
        filters: &Filters,
    ) -> hb_core::Result<Vec<Heartbeat>> {
        Ok(self.list_heartbeats(user, from, to, filters)?)
    }

    fn insert_batch(&self, heartbeats: &[Heartbeat]) -> hb_core::Result<usize> {
        Ok(self.insert_heartbeats(heartbeats)?)
    }

    fn get_first_by_user(&self, user: &UserId) -> hb_core::Result<Option<Heartbeat>> {
        Ok(self.edge_heartbeat(user, false)?)
    }

    fn get_last_by_user(&self, user: &UserId) -> hb_core::Result<Option<Heartbeat>> {
        Ok(self.edge_heartbeat(user, true)?)
    }
}

impl SummaryStore for Database {
    fn get_by_user_within(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> hb_core::Result<Vec<Summary>> {
        Ok(self.list_summaries(user, from, to)?)
    }

    fn insert(&self, summary: &Summary) -> hb_core::Result<i64> {
        Ok(self.insert_summary(summary)?)
    }
}

impl AliasStore for Database {
    fn initialize_user(&self, user: &UserId) -> hb_core::Result<()> {
        self.aliases(user)?;
        Ok(())
    }

    fn get_alias_or_default(
        &self,
        user: &UserId,
        kind: SummaryKind,
        key: &str,
    ) -> hb_core::Result<String> {
        Ok(self
            .aliases(user)?
            .into_iter()
            .find(|a| a.kind == kind && a.value == key)
            .map_or_else(|| key.to_string(), |a| a.key))
    }

    fn get_by_key(
        &self,
        user: &UserId,
        kind: SummaryKind,
        key: &str,
    ) -> hb_core::Result<Vec<Alias>> {
        Ok(self
            .aliases(user)?
            .into_iter()
            .filter(|a| a.kind == kind && a.key == key)
            .collect())
    }
}

impl LabelStore for Database {
    fn get_by_user(&self, user: &UserId) -> hb_core::Result<Vec<ProjectLabel>> {
        Ok(self.list_labels(user)?)
    }
}

/// Heartbeat row as read from `SQLite`, before timestamp parsing.
struct HeartbeatRow {
    id: i64,
    user_id: String,
    entity: String,
    kind: String,
    category: String,
    project: String,
    branch: String,
    language: String,
    is_write: bool,
    editor: String,
    operating_system: String,
    machine: String,
    user_agent: String,
    time: String,
    hash: String,
    origin: String,
    origin_id: String,
}

impl HeartbeatRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            entity: row.get(2)?,
            kind: row.get(3)?,
            category: row.get(4)?,
            project: row.get(5)?,
            branch: row.get(6)?,
            language: row.get(7)?,
            is_write: row.get(8)?,
            editor: row.get(9)?,
            operating_system: row.get(10)?,
            machine: row.get(11)?,
            user_agent: row.get(12)?,
            time: row.get(13)?,
            hash: row.get(14)?,
            origin: row.get(15)?,
            origin_id: row.get(16)?,
        })
    }

    fn into_heartbeat(self) -> Result<Heartbeat, DbError> {
        Ok(Heartbeat {
            id: Some(self.id),
            user_id: UserId::new(self.user_id)?,
            entity: self.entity,
            kind: self.kind,
            category: self.category,
            project: self.project,
            branch: self.branch,
            language: self.language,
            is_write: self.is_write,
            editor: self.editor,
            operating_system: self.operating_system,
            machine: self.machine,
            user_agent: self.user_agent,
            time: parse_timestamp(&self.time)?,
            hash: self.hash,
            origin: self.origin,
            origin_id: self.origin_id,
        })
    }
}

/// Heartbeat column holding the values of `kind`, if heartbeats carry it.
const fn heartbeat_column(kind: SummaryKind) -> Option<&'static str> {
    match kind {
        SummaryKind::Project => Some("project"),
        SummaryKind::Language => Some("language"),
        SummaryKind::Editor => Some("editor"),
        SummaryKind::OperatingSystem => Some("operating_system"),
        SummaryKind::Machine => Some("machine"),
        SummaryKind::Branch => Some("branch"),
        SummaryKind::Entity => Some("entity"),
        SummaryKind::Category => Some("category"),
        SummaryKind::Label => None,
    }
}

fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

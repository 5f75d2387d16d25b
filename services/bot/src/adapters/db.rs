//! services/bot/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ReminderStore` port from the `core` crate. It handles all interactions
//! with the local SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reminder_core::domain::{NewReminder, OwnerId, RecurrenceKind, Reminder, ReminderId};
use reminder_core::ports::{PortError, PortResult, ReminderStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::path::Path;
use tracing::{info, warn};

/// Format of every timestamp this adapter writes. Lexicographic order equals time order.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite caps the number of bound parameters per statement.
const DELETE_CHUNK: usize = 500;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReminderStore` port.
#[derive(Clone)]
pub struct SqliteReminderStore {
    pool: SqlitePool,
}

impl SqliteReminderStore {
    /// Creates a new `SqliteReminderStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database file at `path`.
    pub async fn connect(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private database living in a single pooled connection, for tests and tooling.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the `reminders` table up to date.
    ///
    /// Only additive changes: the base table is created if absent and each newer
    /// column is added when `pragma_table_info` does not list it yet.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reminders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER,
                text TEXT
            )",
        )
        .execute(&mut *tx)
        .await?;

        let columns = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info('reminders')")
            .fetch_all(&mut *tx)
            .await?;
        let has = |name: &str| columns.iter().any(|c| c == name);

        if !has("datetime") {
            sqlx::query("ALTER TABLE reminders ADD COLUMN datetime DATETIME")
                .execute(&mut *tx)
                .await?;
            info!("Added datetime column to reminders table");
        }

        if !has("repeat_type") {
            sqlx::query("ALTER TABLE reminders ADD COLUMN repeat_type TEXT DEFAULT 'none'")
                .execute(&mut *tx)
                .await?;
            info!("Added repeat_type column to reminders table");
        }

        if !has("repeat_enabled") {
            sqlx::query(
                "ALTER TABLE reminders ADD COLUMN repeat_enabled INTEGER NOT NULL DEFAULT 0",
            )
            .execute(&mut *tx)
            .await?;
            // Rows written before the flag existed repeat whenever they have a kind.
            let backfilled = sqlx::query(
                "UPDATE reminders SET repeat_enabled = 1
                 WHERE repeat_type IS NOT NULL AND repeat_type <> 'none'",
            )
            .execute(&mut *tx)
            .await?
            .rows_affected();
            info!(backfilled, "Added repeat_enabled column to reminders table");
        }

        // SQL compares fire times as text, so every stored value must be in the one
        // format this adapter writes. Values that cannot be read are cleared.
        let stored = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, CAST(datetime AS TEXT) FROM reminders WHERE datetime IS NOT NULL",
        )
        .fetch_all(&mut *tx)
        .await?;
        for (id, raw) in stored {
            let canonical = parse_datetime(&raw).map(format_datetime);
            if canonical.as_deref() == Some(raw.as_str()) {
                continue;
            }
            if canonical.is_none() {
                warn!(reminder_id = id, raw = %raw, "Clearing unreadable fire time");
            }
            sqlx::query("UPDATE reminders SET datetime = ? WHERE id = ?")
                .bind(canonical)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reminders_datetime ON reminders (datetime)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reminders_chat_id ON reminders (chat_id)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Reads timestamps written by this adapter as well as older offset-suffixed rows.
fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"]
                .iter()
                .find_map(|format| DateTime::parse_from_str(raw, format).ok())
                .map(|value| value.naive_local())
        })
}

fn map_err(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReminderRecord {
    id: i64,
    chat_id: i64,
    text: Option<String>,
    datetime: Option<String>,
    repeat_type: Option<String>,
    repeat_enabled: i64,
}

impl ReminderRecord {
    /// `None` for rows that have no usable fire time.
    fn to_domain(self) -> Option<Reminder> {
        let Some(fire_at) = self.datetime.as_deref().and_then(parse_datetime) else {
            warn!(
                reminder_id = self.id,
                raw = ?self.datetime,
                "Skipping reminder without a valid fire time"
            );
            return None;
        };
        let stored_kind = self.repeat_type.as_deref().unwrap_or("none");
        let recurrence_kind = RecurrenceKind::from_stored(stored_kind).unwrap_or_else(|| {
            warn!(
                reminder_id = self.id,
                repeat_type = stored_kind,
                "Unknown repeat type, treating as one-off"
            );
            RecurrenceKind::None
        });
        Some(Reminder {
            id: self.id,
            owner_id: self.chat_id,
            text: self.text.unwrap_or_default(),
            fire_at,
            recurrence_kind,
            recurrence_enabled: self.repeat_enabled != 0,
        })
    }
}

const SELECT_REMINDER: &str =
    "SELECT id, chat_id, text, datetime, repeat_type, repeat_enabled FROM reminders";

//=========================================================================================
// `ReminderStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn insert(&self, reminder: NewReminder) -> PortResult<ReminderId> {
        let result = sqlx::query(
            "INSERT INTO reminders (chat_id, text, datetime, repeat_type, repeat_enabled) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(reminder.owner_id)
        .bind(&reminder.text)
        .bind(format_datetime(reminder.fire_at))
        .bind(reminder.recurrence_kind.as_str())
        .bind(reminder.recurrence_enabled as i64)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> PortResult<Vec<Reminder>> {
        let records = sqlx::query_as::<_, ReminderRecord>(&format!(
            "{SELECT_REMINDER} WHERE chat_id = ? ORDER BY datetime ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(records.into_iter().filter_map(|r| r.to_domain()).collect())
    }

    async fn delete_by_id(&self, id: ReminderId, owner_id: OwnerId) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ? AND chat_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn find_due(&self, now: NaiveDateTime) -> PortResult<Vec<Reminder>> {
        let records = sqlx::query_as::<_, ReminderRecord>(&format!(
            "{SELECT_REMINDER} WHERE datetime IS NOT NULL AND datetime < ?"
        ))
        .bind(format_datetime(now))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(records
            .into_iter()
            .filter_map(|r| r.to_domain())
            .filter(|r| r.is_due(now))
            .collect())
    }

    async fn update_fire_at(&self, id: ReminderId, fire_at: NaiveDateTime) -> PortResult<u64> {
        let result = sqlx::query("UPDATE reminders SET datetime = ? WHERE id = ?")
            .bind(format_datetime(fire_at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, ids: &[ReminderId]) -> PortResult<u64> {
        let mut affected = 0;
        for chunk in ids.chunks(DELETE_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM reminders WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            affected += builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(map_err)?
                .rows_affected();
        }
        Ok(affected)
    }

    async fn set_fire_at(
        &self,
        id: ReminderId,
        owner_id: OwnerId,
        fire_at: NaiveDateTime,
    ) -> PortResult<u64> {
        let result = sqlx::query("UPDATE reminders SET datetime = ? WHERE id = ? AND chat_id = ?")
            .bind(format_datetime(fire_at))
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn test_store() -> SqliteReminderStore {
        let store = SqliteReminderStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    fn new_reminder(owner_id: OwnerId, text: &str, fire_at: NaiveDateTime) -> NewReminder {
        NewReminder {
            owner_id,
            text: text.to_string(),
            fire_at,
            recurrence_kind: RecurrenceKind::None,
            recurrence_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_by_owner() {
        let store = test_store().await;
        let first = store.insert(new_reminder(1, "dentist", dt(20, 10, 0))).await.unwrap();
        let second = store
            .insert(NewReminder {
                recurrence_kind: RecurrenceKind::Weekly,
                recurrence_enabled: true,
                ..new_reminder(1, "standup", dt(19, 9, 0))
            })
            .await
            .unwrap();
        store.insert(new_reminder(2, "not mine", dt(19, 8, 0))).await.unwrap();
        assert_ne!(first, second);

        let listed = store.list_by_owner(1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[0].recurrence_kind, RecurrenceKind::Weekly);
        assert!(listed[0].recurrence_enabled);
        assert_eq!(listed[1].text, "dentist");
        assert_eq!(listed[1].fire_at, dt(20, 10, 0));

        assert!(store.list_by_owner(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_content_is_allowed() {
        let store = test_store().await;
        let a = store.insert(new_reminder(1, "same", dt(20, 10, 0))).await.unwrap();
        let b = store.insert(new_reminder(1, "same", dt(20, 10, 0))).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list_by_owner(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_by_owner() {
        let store = test_store().await;
        let id = store.insert(new_reminder(1, "mine", dt(20, 10, 0))).await.unwrap();

        assert_eq!(store.delete_by_id(id, 2).await.unwrap(), 0);
        assert_eq!(store.list_by_owner(1).await.unwrap().len(), 1);

        assert_eq!(store.delete_by_id(id, 1).await.unwrap(), 1);
        assert_eq!(store.delete_by_id(id, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_due_is_strict_and_spans_owners() {
        let store = test_store().await;
        let past = store.insert(new_reminder(1, "a", dt(19, 8, 59))).await.unwrap();
        let other = store.insert(new_reminder(2, "b", dt(18, 12, 0))).await.unwrap();
        store.insert(new_reminder(1, "exact", dt(19, 9, 0))).await.unwrap();
        store.insert(new_reminder(1, "future", dt(19, 9, 30))).await.unwrap();

        let mut due: Vec<ReminderId> = store
            .find_due(dt(19, 9, 0))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        due.sort();
        assert_eq!(due, vec![past, other]);
    }

    #[tokio::test]
    async fn test_delete_many_and_empty_batch() {
        let store = test_store().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.insert(new_reminder(1, &format!("r{i}"), dt(19, 9, i))).await.unwrap());
        }

        assert_eq!(store.delete_many(&[]).await.unwrap(), 0);
        assert_eq!(store.delete_many(&ids[..3]).await.unwrap(), 3);
        // Ids that are already gone simply do not count.
        assert_eq!(store.delete_many(&ids).await.unwrap(), 2);
        assert!(store.list_by_owner(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_beyond_one_chunk() {
        let store = test_store().await;
        let mut ids = Vec::new();
        for _ in 0..(DELETE_CHUNK + 7) {
            ids.push(store.insert(new_reminder(1, "bulk", dt(19, 9, 0))).await.unwrap());
        }
        assert_eq!(store.delete_many(&ids).await.unwrap(), (DELETE_CHUNK + 7) as u64);
    }

    #[tokio::test]
    async fn test_update_and_set_fire_at() {
        let store = test_store().await;
        let id = store.insert(new_reminder(1, "move me", dt(19, 9, 0))).await.unwrap();

        assert_eq!(store.update_fire_at(id, dt(20, 9, 0)).await.unwrap(), 1);
        assert_eq!(store.list_by_owner(1).await.unwrap()[0].fire_at, dt(20, 9, 0));

        assert_eq!(store.set_fire_at(id, 2, dt(21, 9, 0)).await.unwrap(), 0);
        assert_eq!(store.set_fire_at(id, 1, dt(22, 15, 0)).await.unwrap(), 1);
        assert_eq!(store.list_by_owner(1).await.unwrap()[0].fire_at, dt(22, 15, 0));

        assert_eq!(store.update_fire_at(9999, dt(20, 9, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = test_store().await;
        store.insert(new_reminder(1, "keep", dt(19, 9, 0))).await.unwrap();
        store.run_migrations().await.unwrap();
        assert_eq!(store.list_by_owner(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_table_is_upgraded_in_place() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteReminderStore::connect(&dir.path().join("reminders.db"))
            .await
            .unwrap();

        // Oldest layout, then the layout with a repeat kind but no enabled flag.
        sqlx::query("CREATE TABLE reminders (id INTEGER PRIMARY KEY AUTOINCREMENT, chat_id INTEGER, text TEXT)")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO reminders (chat_id, text) VALUES (1, 'no time yet')")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("ALTER TABLE reminders ADD COLUMN datetime DATETIME")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("ALTER TABLE reminders ADD COLUMN repeat_type TEXT DEFAULT 'none'")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO reminders (chat_id, text, datetime, repeat_type) VALUES
                (1, 'water plants', '2026-10-19 09:00:00+03:00', 'daily'),
                (1, 'one off', '2026-10-20 10:00:00', 'none'),
                (1, 'garbled', '1/2/2026 9:00', 'none')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        store.run_migrations().await.unwrap();

        let listed = store.list_by_owner(1).await.unwrap();
        assert_eq!(listed.len(), 2, "the row without a fire time is skipped");
        assert_eq!(listed[0].text, "water plants");
        assert_eq!(listed[0].fire_at, dt(19, 9, 0));
        assert_eq!(listed[0].recurrence_kind, RecurrenceKind::Daily);
        assert!(listed[0].recurrence_enabled);
        assert_eq!(listed[1].recurrence_kind, RecurrenceKind::None);
        assert!(!listed[1].recurrence_enabled);

        let due = store.find_due(dt(19, 9, 30)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].text, "water plants");

        let stored =
            sqlx::query_as::<_, (String, Option<String>)>("SELECT text, datetime FROM reminders ORDER BY id")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(stored[1].1.as_deref(), Some("2026-10-19 09:00:00"));
        assert_eq!(stored[3], ("garbled".to_string(), None));
    }

    #[tokio::test]
    async fn test_unreadable_fire_time_is_never_due() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO reminders (chat_id, text, datetime, repeat_type) VALUES
                (1, 'legacy', '1/2/2026 9:00', 'none')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        // Text order puts this row before "now" even though it cannot be read.
        let now = dt(19, 10, 0);
        store.run_migrations().await.unwrap();
        for _ in 0..3 {
            let due = store.find_due(now).await.unwrap();
            assert!(due.is_empty());
        }
        assert!(store.list_by_owner(1).await.unwrap().is_empty());

        let cleared =
            sqlx::query_scalar::<_, Option<String>>("SELECT datetime FROM reminders WHERE text = 'legacy'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(cleared, None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2026-10-19 09:00:00"), Some(dt(19, 9, 0)));
        assert_eq!(
            parse_datetime("2026-10-19 09:00:00.123"),
            Some(dt(19, 9, 0) + chrono::Duration::milliseconds(123))
        );
        assert_eq!(parse_datetime("2026-10-19T09:00:00"), Some(dt(19, 9, 0)));
        assert_eq!(parse_datetime("2026-10-19 09:00:00+03:00"), Some(dt(19, 9, 0)));
        assert_eq!(parse_datetime("yesterday"), None);
    }
}

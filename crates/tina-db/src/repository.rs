use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::PathBuf;

use crate::config::DbConfig;
use crate::error::{DbError, Result};
use crate::models::{BlocklistEntry, Chat, Contact, GroupMetadata, Session};
use crate::schema::SCHEMA;

pub struct TinaDb {
    pool: Pool<Sqlite>,
}

impl TinaDb {
    pub async fn new() -> Result<Self> {
        Self::connect(&DbConfig::default()).await
    }

    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let db_path = match &config.path {
            Some(path) => path.clone(),
            None => Self::get_db_path()?,
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        tracing::info!(path = %db_path.display(), "Database initialized");

        Ok(Self { pool })
    }

    /// A private in-memory database. Everything lives on a single connection
    /// that is never recycled, since closing it discards the data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn get_db_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com.br", "zesmoi", "tina").ok_or(DbError::NoDataDir)?;
        Ok(dirs.data_dir().join("tina-store.db"))
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// A transaction that takes the write lock up front. Use it for
    /// read-then-write work: a deferred transaction that reads first fails
    /// with a busy snapshot if another connection commits before its first
    /// write, and the busy timeout does not cover that case.
    pub async fn begin_immediate(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    pub async fn create_session(&self, id: &str, name: Option<&str>) -> Result<Session> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO sessions (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = COALESCE(excluded.name, name), updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_session(id).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Session> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::SessionNotFound(id.to_string()))
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(sqlx::query_as::<_, Session>("SELECT * FROM sessions ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Delete a session together with its whole mirror.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_chats(&self, session_id: &str) -> Result<Vec<Chat>> {
        Ok(sqlx::query_as::<_, Chat>(
            "SELECT * FROM chats WHERE session_id = ? ORDER BY conversation_timestamp DESC, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_chat(&self, session_id: &str, id: &str) -> Result<Option<Chat>> {
        Ok(
            sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE session_id = ? AND id = ?")
                .bind(session_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_contacts(&self, session_id: &str) -> Result<Vec<Contact>> {
        Ok(
            sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE session_id = ? ORDER BY id")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn get_contact(&self, session_id: &str, id: &str) -> Result<Option<Contact>> {
        Ok(
            sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE session_id = ? AND id = ?")
                .bind(session_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_groups(&self, session_id: &str) -> Result<Vec<GroupMetadata>> {
        Ok(sqlx::query_as::<_, GroupMetadata>(
            "SELECT * FROM group_metadata WHERE session_id = ? ORDER BY subject, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_group(&self, session_id: &str, id: &str) -> Result<Option<GroupMetadata>> {
        Ok(sqlx::query_as::<_, GroupMetadata>(
            "SELECT * FROM group_metadata WHERE session_id = ? AND id = ?",
        )
        .bind(session_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_blocklist(&self, session_id: &str) -> Result<Vec<BlocklistEntry>> {
        Ok(sqlx::query_as::<_, BlocklistEntry>(
            "SELECT * FROM blocklist WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

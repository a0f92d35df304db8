//! SQLite posting store implementation

use async_trait::async_trait;
use jobcast_domain::{
    AcceptedPosting, LogLevel, PostingStore, RunRecord, RunStats, StoreError,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use uuid::Uuid;

/// SQLite-backed durable store for postings, settings, logs, and run history
pub struct SqlitePostingStore {
    pool: SqlitePool,
}

impl SqlitePostingStore {
    /// Create a new SQLite store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS postings (
                id TEXT PRIMARY KEY,
                link TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                company TEXT,
                location TEXT NOT NULL,
                source TEXT NOT NULL,
                keyword TEXT NOT NULL,
                slug TEXT NOT NULL,
                canonical_link TEXT NOT NULL,
                short_link TEXT,
                hosted_url TEXT,
                data TEXT NOT NULL,
                accepted_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_history (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                stats TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_postings_link ON postings(link)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn to_rfc3339(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_rfc3339(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl PostingStore for SqlitePostingStore {
    async fn link_exists(&self, link: &str) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM postings WHERE link = ?")
            .bind(link)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(count.0 > 0)
    }

    async fn insert_posting(&self, posting: &AcceptedPosting) -> Result<(), StoreError> {
        let data = serde_json::to_string(posting)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let accepted_at = to_rfc3339(posting.accepted_at)?;

        sqlx::query(
            r#"
            INSERT INTO postings
            (id, link, title, company, location, source, keyword, slug,
             canonical_link, short_link, hosted_url, data, accepted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&posting.posting.link)
        .bind(&posting.posting.title)
        .bind(&posting.posting.company)
        .bind(&posting.posting.location)
        .bind(posting.posting.source.as_str())
        .bind(&posting.posting.keyword)
        .bind(&posting.slug)
        .bind(&posting.canonical_link)
        .bind(&posting.short_link)
        .bind(&posting.hosted_url)
        .bind(&data)
        .bind(&accepted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn recent_links(&self, limit: u32) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT link FROM postings ORDER BY accepted_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(link,)| link).collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((raw,)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(&raw)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn append_log(
        &self,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        let created_at = to_rfc3339(OffsetDateTime::now_utc())?;
        let metadata = serde_json::to_string(&metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO run_log (created_at, level, message, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(&created_at)
        .bind(level.as_str())
        .bind(message)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn record_run(
        &self,
        started_at: OffsetDateTime,
        stats: &RunStats,
    ) -> Result<(), StoreError> {
        let stats_json = serde_json::to_string(stats)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let started_at = to_rfc3339(started_at)?;

        sqlx::query("INSERT INTO run_history (id, started_at, stats) VALUES (?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(&started_at)
            .bind(&stats_json)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn run_history(&self, limit: u32) -> Result<Vec<RunRecord>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, started_at, stats FROM run_history ORDER BY started_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(id, started_at, stats)| {
                Ok(RunRecord {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                    started_at: from_rfc3339(&started_at)?,
                    stats: serde_json::from_str(&stats)
                        .map_err(|e| StoreError::Serialization(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobcast_domain::{
        ChannelStatus, PublishOutcome, RawPosting, SectionLabel, SkipReason, SourceId,
    };

    fn accepted(link: &str, accepted_at: OffsetDateTime) -> AcceptedPosting {
        AcceptedPosting {
            posting: RawPosting {
                title: "QA Engineer".to_string(),
                company: Some("Acme".to_string()),
                location: "Cairo, Egypt".to_string(),
                description: "desc".to_string(),
                requirements: vec!["Req".to_string()],
                section_label: SectionLabel::Requirements,
                skills: vec![],
                link: link.to_string(),
                source: SourceId::Wuzzuf,
                keyword: "QA".to_string(),
                posted: Some("2 hours ago".to_string()),
            },
            slug: "qa-engineer".to_string(),
            canonical_link: link.to_string(),
            short_link: None,
            hosted_url: None,
            outcome: PublishOutcome {
                blog: ChannelStatus::NotAttempted,
                telegram: ChannelStatus::Sent,
                whatsapp: ChannelStatus::NotAttempted,
            },
            accepted_at,
        }
    }

    #[tokio::test]
    async fn inserted_links_exist() {
        let store = SqlitePostingStore::in_memory().await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(!store.link_exists("https://w.example/1").await.unwrap());
        store
            .insert_posting(&accepted("https://w.example/1", now))
            .await
            .unwrap();
        assert!(store.link_exists("https://w.example/1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_no_op() {
        let store = SqlitePostingStore::in_memory().await.unwrap();
        let now = OffsetDateTime::now_utc();

        store
            .insert_posting(&accepted("https://w.example/1", now))
            .await
            .unwrap();
        store
            .insert_posting(&accepted("https://w.example/1", now))
            .await
            .unwrap();

        let links = store.recent_links(10).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn recent_links_newest_first() {
        let store = SqlitePostingStore::in_memory().await.unwrap();
        let now = OffsetDateTime::now_utc();

        store
            .insert_posting(&accepted("https://w.example/old", now - time::Duration::hours(2)))
            .await
            .unwrap();
        store
            .insert_posting(&accepted("https://w.example/new", now))
            .await
            .unwrap();

        let links = store.recent_links(1).await.unwrap();
        assert_eq!(links, vec!["https://w.example/new".to_string()]);
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let store = SqlitePostingStore::in_memory().await.unwrap();

        assert!(store.get_setting("schedule").await.unwrap().is_none());

        let value = serde_json::json!({ "enabled": true, "time": "14:30" });
        store.put_setting("schedule", &value).await.unwrap();
        assert_eq!(store.get_setting("schedule").await.unwrap(), Some(value));

        let updated = serde_json::json!({ "enabled": false });
        store.put_setting("schedule", &updated).await.unwrap();
        assert_eq!(store.get_setting("schedule").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn run_records_round_trip() {
        let store = SqlitePostingStore::in_memory().await.unwrap();
        let started = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();

        let mut stats = RunStats::default();
        {
            let tally = stats.tally_mut(SourceId::Indeed);
            tally.found = 7;
            tally.accepted = 2;
            tally.skips.add(SkipReason::NotRecent, 5);
        }
        store.record_run(started, &stats).await.unwrap();

        let history = store.run_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].started_at, started);
        assert_eq!(history[0].stats.total_found(), 7);
        assert_eq!(history[0].stats.skip_totals().not_recent, 5);
    }

    #[tokio::test]
    async fn append_log_accepts_metadata() {
        let store = SqlitePostingStore::in_memory().await.unwrap();
        store
            .append_log(
                LogLevel::Warning,
                "Source wuzzuf unavailable",
                serde_json::json!({ "source": "wuzzuf" }),
            )
            .await
            .unwrap();
    }
}

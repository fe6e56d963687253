//! SQLite storage implementation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::models::*;
use crate::error::Result;

/// Parse an RFC 3339 datetime string into a `chrono::DateTime<Utc>`.
///
/// Returns a `rusqlite::Error` on parse failure instead of panicking,
/// so it is safe to use inside `query_row` / `query_map` closures.
fn parse_datetime_utc(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_status(s: &str) -> rusqlite::Result<JobStatus> {
    s.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown job status: {}", s).into(),
        )
    })
}

/// SQLite-based storage.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                job_id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                prompt TEXT NOT NULL,
                settings TEXT NOT NULL,
                generated_content TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_content_type ON jobs(content_type);

            CREATE TABLE IF NOT EXISTS api_logs (
                log_id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                request_data TEXT NOT NULL,
                response_data TEXT,
                status_code INTEGER,
                duration_secs REAL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_api_logs_provider ON api_logs(provider);
            CREATE INDEX IF NOT EXISTS idx_api_logs_timestamp ON api_logs(timestamp);

            CREATE TABLE IF NOT EXISTS content_cache (
                cache_id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL UNIQUE,
                content_type TEXT NOT NULL,
                content_data TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_content_cache_expires ON content_cache(expires_at);
            "#,
        )?;
        Ok(())
    }

    // -- Workflows -----------------------------------------------------

    /// Upsert a workflow record keyed by id.
    pub async fn save_workflow(&self, record: &StoredWorkflow) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO workflows (id, name, definition, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
            params![
                record.id,
                record.name,
                record.definition,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a workflow record by id.
    pub async fn get_workflow(&self, id: &str) -> Result<Option<StoredWorkflow>> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(
                "SELECT id, name, definition, created_at, updated_at
                 FROM workflows WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredWorkflow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        definition: row.get(2)?,
                        created_at: parse_datetime_utc(&row.get::<_, String>(3)?)?,
                        updated_at: parse_datetime_utc(&row.get::<_, String>(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// List all workflow records, most recently updated first.
    pub async fn list_workflows(&self) -> Result<Vec<StoredWorkflow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, definition, created_at, updated_at
             FROM workflows ORDER BY updated_at DESC",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(StoredWorkflow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    definition: row.get(2)?,
                    created_at: parse_datetime_utc(&row.get::<_, String>(3)?)?,
                    updated_at: parse_datetime_utc(&row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Delete a workflow. Returns true when a record was removed.
    pub async fn delete_workflow(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn.execute("DELETE FROM workflows WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // -- Jobs ----------------------------------------------------------

    /// Create a pending job, returning its id.
    pub async fn create_job(
        &self,
        content_type: &str,
        prompt: &str,
        settings: &serde_json::Value,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO jobs (content_type, status, prompt, settings, created_at, updated_at)
             VALUES (?1, 'pending', ?2, ?3, ?4, ?4)",
            params![content_type, prompt, settings.to_string(), now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Mark a job completed with its generated content.
    pub async fn complete_job(&self, job_id: i64, generated_content: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE jobs SET status = 'completed', generated_content = ?2,
                             error_message = NULL, updated_at = ?3
             WHERE job_id = ?1",
            params![job_id, generated_content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Mark a job failed with an error message.
    pub async fn fail_job(&self, job_id: i64, error_message: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = ?2, updated_at = ?3
             WHERE job_id = ?1",
            params![job_id, error_message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Fetch a job by id.
    pub async fn get_job(&self, job_id: i64) -> Result<Option<Job>> {
        let conn = self.conn.lock().await;
        let job = conn
            .query_row(
                "SELECT job_id, content_type, status, prompt, settings,
                        generated_content, error_message, created_at, updated_at
                 FROM jobs WHERE job_id = ?1",
                params![job_id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// List jobs, newest first, optionally filtered by status.
    pub async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        let conn = self.conn.lock().await;
        let mut jobs = Vec::new();

        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT job_id, content_type, status, prompt, settings,
                            generated_content, error_message, created_at, updated_at
                     FROM jobs WHERE status = ?1
                     ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![status.to_string(), limit as i64], row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT job_id, content_type, status, prompt, settings,
                            generated_content, error_message, created_at, updated_at
                     FROM jobs ORDER BY created_at DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit as i64], row_to_job)?;
                for row in rows {
                    jobs.push(row?);
                }
            }
        }

        Ok(jobs)
    }

    // -- API logs ------------------------------------------------------

    /// Record one gateway exchange.
    pub async fn log_api_request(&self, entry: &ApiLogEntry) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO api_logs (provider, endpoint, request_data, response_data,
                                   status_code, duration_secs, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.provider,
                entry.endpoint,
                entry.request_data,
                entry.response_data,
                entry.status_code,
                entry.duration_secs,
                entry.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent log entries, newest first.
    pub async fn recent_api_logs(&self, limit: usize) -> Result<Vec<ApiLogEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT provider, endpoint, request_data, response_data,
                    status_code, duration_secs, timestamp
             FROM api_logs ORDER BY log_id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ApiLogEntry {
                    provider: row.get(0)?,
                    endpoint: row.get(1)?,
                    request_data: row.get(2)?,
                    response_data: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    status_code: row.get(4)?,
                    duration_secs: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
                    timestamp: parse_datetime_utc(&row.get::<_, String>(6)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Delete log entries older than the retention window. Returns the
    /// number of rows removed.
    pub async fn prune_api_logs(&self, retention_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(retention_days)).to_rfc3339();
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM api_logs WHERE timestamp < ?1", params![cutoff])?;
        Ok(removed)
    }

    // -- Content cache -------------------------------------------------

    /// Fetch cached content by hash, ignoring expired entries.
    pub async fn get_cached_content(&self, content_hash: &str) -> Result<Option<String>> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        let data = conn
            .query_row(
                "SELECT content_data FROM content_cache
                 WHERE content_hash = ?1 AND expires_at > ?2",
                params![content_hash, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    /// Store content under a hash, replacing any previous entry.
    pub async fn set_cached_content(
        &self,
        content_hash: &str,
        content_type: &str,
        content_data: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM content_cache WHERE content_hash = ?1",
            params![content_hash],
        )?;
        conn.execute(
            "INSERT INTO content_cache (content_hash, content_type, content_data,
                                        expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                content_hash,
                content_type,
                content_data,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Remove expired cache entries. Returns the number of rows removed.
    pub async fn clean_expired_cache(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM content_cache WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(removed)
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let settings_raw: String = row.get(4)?;
    Ok(Job {
        id: row.get(0)?,
        content_type: row.get(1)?,
        status: parse_status(&row.get::<_, String>(2)?)?,
        prompt: row.get(3)?,
        settings: serde_json::from_str(&settings_raw).unwrap_or(serde_json::Value::Null),
        generated_content: row.get(5)?,
        error_message: row.get(6)?,
        created_at: parse_datetime_utc(&row.get::<_, String>(7)?)?,
        updated_at: parse_datetime_utc(&row.get::<_, String>(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_workflow(id: &str) -> StoredWorkflow {
        let now = Utc::now();
        StoredWorkflow {
            id: id.to_string(),
            name: "Blog pipeline".to_string(),
            definition: r#"{"id":"wf_1","name":"Blog pipeline","steps":[]}"#.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_workflow_round_trip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save_workflow(&sample_workflow("wf_1")).await.unwrap();

        let loaded = storage.get_workflow("wf_1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Blog pipeline");
        assert!(loaded.definition.contains("steps"));

        assert!(storage.get_workflow("wf_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workflow_upsert_replaces() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save_workflow(&sample_workflow("wf_1")).await.unwrap();

        let mut updated = sample_workflow("wf_1");
        updated.name = "Renamed".to_string();
        storage.save_workflow(&updated).await.unwrap();

        let loaded = storage.get_workflow("wf_1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(storage.list_workflows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_delete() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save_workflow(&sample_workflow("wf_1")).await.unwrap();

        assert!(storage.delete_workflow("wf_1").await.unwrap());
        assert!(!storage.delete_workflow("wf_1").await.unwrap());
        assert!(storage.get_workflow("wf_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let job_id = storage
            .create_job("blog_post", "Write about rust", &json!({"tone": "casual"}))
            .await
            .unwrap();

        let job = storage.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.settings["tone"], "casual");

        storage.complete_job(job_id, "Rust is fast.").await.unwrap();
        let job = storage.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.generated_content.as_deref(), Some("Rust is fast."));
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_job_failure() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let job_id = storage
            .create_job("blog_post", "Write", &json!({}))
            .await
            .unwrap();

        storage.fail_job(job_id, "Rate limit exceeded").await.unwrap();
        let job = storage.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_list_jobs_filter() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = storage.create_job("blog_post", "A", &json!({})).await.unwrap();
        let _b = storage.create_job("image", "B", &json!({})).await.unwrap();
        storage.complete_job(a, "done").await.unwrap();

        let completed = storage
            .list_jobs(Some(JobStatus::Completed), 10)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a);

        let all = storage.list_jobs(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_api_log_round_trip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .log_api_request(&ApiLogEntry {
                provider: "openai".to_string(),
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                request_data: r#"{"model":"gpt-3.5-turbo"}"#.to_string(),
                response_data: r#"{"choices":[]}"#.to_string(),
                status_code: Some(200),
                duration_secs: 1.25,
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        let logs = storage.recent_api_logs(5).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].provider, "openai");
        assert_eq!(logs[0].status_code, Some(200));
    }

    #[tokio::test]
    async fn test_prune_api_logs() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .log_api_request(&ApiLogEntry {
                provider: "openai".to_string(),
                endpoint: "e".to_string(),
                request_data: "{}".to_string(),
                response_data: "{}".to_string(),
                status_code: Some(200),
                duration_secs: 0.1,
                timestamp: Utc::now() - Duration::days(30),
            })
            .await
            .unwrap();

        let removed = storage.prune_api_logs(7).await.unwrap();
        assert_eq!(removed, 1);
        assert!(storage.recent_api_logs(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_content_cache_round_trip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let expires = Utc::now() + Duration::hours(1);
        storage
            .set_cached_content("abc123", "blog_post", "cached body", expires)
            .await
            .unwrap();

        assert_eq!(
            storage.get_cached_content("abc123").await.unwrap().as_deref(),
            Some("cached body")
        );
        assert!(storage.get_cached_content("zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_content_cache_expiry() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let expired = Utc::now() - Duration::hours(1);
        storage
            .set_cached_content("abc123", "blog_post", "stale", expired)
            .await
            .unwrap();

        // An expired entry is a miss and is removed by the sweep.
        assert!(storage.get_cached_content("abc123").await.unwrap().is_none());
        assert_eq!(storage.clean_expired_cache().await.unwrap(), 1);
    }
}

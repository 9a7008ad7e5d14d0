use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use super::Reporter;
use crate::storage::{self, Pool};

/// A stored run event.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub job: String,
    pub status: i64,
    pub message: String,
}

/// Writes run events into the `run_events` table.
#[derive(Clone)]
pub struct SqliteReporter {
    pool: Pool,
}

impl SqliteReporter {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            pool: storage::open_pool(path)?,
        })
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Most recent events first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunEvent>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, time, job, status, message FROM run_events ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let time: String = row.get(1)?;
            Ok(RunEvent {
                id: row.get(0)?,
                time: DateTime::parse_from_rfc3339(&time)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_default(),
                job: row.get(2)?,
                status: row.get(3)?,
                message: row.get(4)?,
            })
        })?;

        let mut events = Vec::new();
        for r in rows {
            events.push(r?);
        }
        Ok(events)
    }

    fn insert(pool: &Pool, app: &str, status: i64, message: &str) -> Result<()> {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO run_events (time, job, status, message) VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now().to_rfc3339(), app, status, message],
        )
        .context("Failed to insert run event")?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for SqliteReporter {
    async fn post(&self, app: &str, status: i64, message: &str) -> Result<()> {
        let pool = self.pool.clone();
        let app = app.to_string();
        let message = message.to_string();

        tokio::task::spawn_blocking(move || Self::insert(&pool, &app, status, &message)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = SqliteReporter::open(&dir.path().join("wolf.db")).unwrap();

        reporter.post("Backup", 4, "").await.unwrap();
        reporter.post("Cleanup", 3, "disk full").await.unwrap();

        let events = reporter.recent(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].job, "Cleanup");
        assert_eq!(events[0].status, 3);
        assert_eq!(events[0].message, "disk full");
        assert_eq!(events[1].job, "Backup");

        assert_eq!(reporter.recent(1).unwrap().len(), 1);
    }
}

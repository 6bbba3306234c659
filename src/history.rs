//! Creation history: successful answers and quizzes, per user.
//!
//! Recording is best effort. [`StudyService`](crate::study::StudyService)
//! logs a failed insert and still returns the generated response.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Prompt stored for quiz creations.
pub const QUIZ_PROMPT: &str = "Generated Quiz";

/// Kind of a stored creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationKind {
    StudyQa,
    StudyQuiz,
}

impl CreationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CreationKind::StudyQa => "study-qa",
            CreationKind::StudyQuiz => "study-quiz",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Creation {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CreationLog {
    pool: SqlitePool,
}

impl CreationLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        user_id: &str,
        prompt: &str,
        content: &str,
        kind: CreationKind,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO creations (id, user_id, prompt, content, type, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(prompt)
        .bind(content)
        .bind(kind.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Most recent creations for `user_id`, newest first.
    pub async fn recent(&self, user_id: &str, limit: i64) -> Result<Vec<Creation>> {
        let rows = sqlx::query(
            "SELECT id, user_id, prompt, content, type, created_at FROM creations
             WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Creation> {
                let ts: i64 = row.try_get("created_at")?;
                Ok(Creation {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    prompt: row.try_get("prompt")?,
                    content: row.try_get("content")?,
                    kind: row.try_get("type")?,
                    created_at: Utc.timestamp_opt(ts, 0).single().unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn log_in(dir: &TempDir) -> CreationLog {
        let cfg = DbConfig {
            path: dir.path().join("data/study.sqlite"),
            record_history: true,
        };
        let pool = db::connect(&cfg).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        CreationLog::new(pool)
    }

    #[tokio::test]
    async fn records_and_lists_per_user() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir).await;
        log.record("u1", "What is ATP?", "Energy currency.", CreationKind::StudyQa)
            .await
            .unwrap();
        log.record("u1", QUIZ_PROMPT, "[]", CreationKind::StudyQuiz)
            .await
            .unwrap();
        log.record("u2", "Other", "x", CreationKind::StudyQa)
            .await
            .unwrap();

        let recent = log.recent("u1", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, "study-quiz");
        assert_eq!(recent[0].prompt, "Generated Quiz");
        assert_eq!(recent[1].kind, "study-qa");

        let limited = log.recent("u1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}

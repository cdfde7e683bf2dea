//! Survey persistence over SQLite.
//!
//! One table, `surveys`, with the draft's sections embedded as a JSON column
//! (the record contract is a nested document, not normalized rows). The
//! [`SurveyRepository`] trait is the seam the session actor saves through;
//! tests swap in scripted implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;
use survey_types::{Section, SurveyRecord, SurveyStatus};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("sections encode/decode failed: {0}")]
    Sections(#[from] serde_json::Error),
    #[error("survey not found: {0}")]
    NotFound(Uuid),
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    async fn create(&self, record: &SurveyRecord) -> Result<(), StoreError>;

    /// Autosave path: update sections and language in place. Never touches
    /// the title, so it stays safe to call after publish.
    async fn save_draft(
        &self,
        id: Uuid,
        sections: &[Section],
        language: &str,
    ) -> Result<(), StoreError>;

    /// Flip a draft to published and activate it. The share token assigned at
    /// first persist is left untouched.
    async fn publish(&self, id: Uuid, title: &str) -> Result<SurveyRecord, StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<SurveyRecord>, StoreError>;

    async fn fetch_by_share_token(&self, token: &str) -> Result<Option<SurveyRecord>, StoreError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SurveyRecord>, StoreError>;

    /// Titles of the user's surveys, optionally excluding one record (so a
    /// draft being re-titled does not collide with itself).
    async fn titles_for_user(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, StoreError>;
}

/// Pick a title that does not collide with `existing` (trim + case-fold
/// comparison). On collision, append `" (N)"` with N one past the highest
/// suffix already taken by the same base — `{"Survey", "Survey (3)"}` plus
/// `"Survey"` yields `"Survey (4)"`, not `"Survey (2)"`.
///
/// Best-effort only: two concurrent submits can still race between the
/// lookup and the insert. No lock is taken.
pub fn dedupe_title(candidate: &str, existing: &[String]) -> String {
    let base = candidate.trim();
    let normalized_base = base.to_lowercase();
    let collides = existing
        .iter()
        .any(|title| title.trim().to_lowercase() == normalized_base);
    if !collides {
        return base.to_string();
    }

    let suffixed = Regex::new(r"^(?P<base>.*) \((?P<n>\d+)\)$").expect("static pattern");
    let mut max_suffix: u64 = 0;
    for title in existing {
        let trimmed = title.trim().to_lowercase();
        if let Some(caps) = suffixed.captures(&trimmed) {
            if &caps["base"] == normalized_base {
                if let Ok(n) = caps["n"].parse::<u64>() {
                    max_suffix = max_suffix.max(n);
                }
            }
        }
    }
    format!("{base} ({})", max_suffix + 1)
}

/// SQLite-backed survey store over an sqlx pool.
#[derive(Debug, Clone)]
pub struct SqliteSurveyStore {
    pool: SqlitePool,
}

impl SqliteSurveyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` (created if missing) and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct SurveyRow {
    id: String,
    user_id: String,
    title: String,
    description: String,
    sections: String,
    language: String,
    status: String,
    is_active: bool,
    share_token: String,
    expires_at: Option<DateTime<Utc>>,
    expired_message: Option<String>,
    visible_in_community: bool,
    responses_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SurveyRow {
    fn into_record(self) -> Result<SurveyRecord, StoreError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| StoreError::Corrupt(format!("survey id '{}': {e}", self.id)))?;
        let status = SurveyStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("survey status '{}'", self.status)))?;
        let sections: Vec<Section> = serde_json::from_str(&self.sections)?;
        Ok(SurveyRecord {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            sections,
            language: self.language,
            status,
            is_active: self.is_active,
            share_token: self.share_token,
            expires_at: self.expires_at,
            expired_message: self.expired_message,
            visible_in_community: self.visible_in_community,
            responses_public: self.responses_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, title, description, sections, language, status, \
     is_active, share_token, expires_at, expired_message, visible_in_community, \
     responses_public, created_at, updated_at";

#[async_trait]
impl SurveyRepository for SqliteSurveyStore {
    async fn create(&self, record: &SurveyRecord) -> Result<(), StoreError> {
        let sections = serde_json::to_string(&record.sections)?;
        sqlx::query(
            "INSERT INTO surveys (id, user_id, title, description, sections, language, status, \
             is_active, share_token, expires_at, expired_message, visible_in_community, \
             responses_public, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(sections)
        .bind(&record.language)
        .bind(record.status.as_str())
        .bind(record.is_active)
        .bind(&record.share_token)
        .bind(record.expires_at)
        .bind(&record.expired_message)
        .bind(record.visible_in_community)
        .bind(record.responses_public)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_draft(
        &self,
        id: Uuid,
        sections: &[Section],
        language: &str,
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(sections)?;
        let updated = sqlx::query(
            "UPDATE surveys SET sections = ?, language = ?, updated_at = ? WHERE id = ?",
        )
        .bind(encoded)
        .bind(language)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn publish(&self, id: Uuid, title: &str) -> Result<SurveyRecord, StoreError> {
        let updated = sqlx::query(
            "UPDATE surveys SET status = 'published', is_active = 1, title = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(title)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.fetch(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<SurveyRecord>, StoreError> {
        let row: Option<SurveyRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM surveys WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(SurveyRow::into_record).transpose()
    }

    async fn fetch_by_share_token(&self, token: &str) -> Result<Option<SurveyRecord>, StoreError> {
        let row: Option<SurveyRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM surveys WHERE share_token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SurveyRow::into_record).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SurveyRecord>, StoreError> {
        let rows: Vec<SurveyRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM surveys WHERE user_id = ? ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SurveyRow::into_record).collect()
    }

    async fn titles_for_user(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = match exclude {
            Some(id) => {
                sqlx::query_as("SELECT title FROM surveys WHERE user_id = ? AND id != ?")
                    .bind(user_id)
                    .bind(id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT title FROM surveys WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn dedupe_returns_candidate_when_free() {
        assert_eq!(dedupe_title("Survey", &titles(&["Other"])), "Survey");
        assert_eq!(dedupe_title("  Survey  ", &[]), "Survey");
    }

    #[test]
    fn dedupe_appends_next_after_current_max_suffix() {
        let existing = titles(&["Survey", "Survey (1)", "Survey (3)"]);
        assert_eq!(dedupe_title("Survey", &existing), "Survey (4)");
    }

    #[test]
    fn dedupe_starts_at_one_with_no_suffixes_taken() {
        assert_eq!(dedupe_title("Survey", &titles(&["Survey"])), "Survey (1)");
    }

    #[test]
    fn dedupe_comparison_ignores_case_and_whitespace() {
        let existing = titles(&["  survey ", "SURVEY (2)"]);
        assert_eq!(dedupe_title("Survey", &existing), "Survey (3)");
    }

    #[test]
    fn dedupe_ignores_suffixes_of_other_bases() {
        let existing = titles(&["Survey", "Quiz (7)"]);
        assert_eq!(dedupe_title("Survey", &existing), "Survey (1)");
    }
}

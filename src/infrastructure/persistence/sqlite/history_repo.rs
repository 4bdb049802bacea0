//! SQLite History Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::path::PathBuf;

use super::DbPool;
use crate::application::ports::{HistoryRepositoryPort, RepositoryError};
use crate::domain::generation::GenerationRequest;
use crate::domain::history::{HistoryRecord, NewHistoryRecord};

const SELECT_COLUMNS: &str = "SELECT id, created_at, prompt, source_prompt, duration_secs, bpm, \
     seed, temperature, style, output_path, captured_ms FROM history";

/// SQLite History Repository
pub struct SqliteHistoryRepository {
    pool: DbPool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    created_at: String,
    prompt: String,
    source_prompt: Option<String>,
    duration_secs: i64,
    bpm: i64,
    seed: Option<i64>,
    temperature: Option<f64>,
    style: Option<String>,
    output_path: String,
    captured_ms: i64,
}

fn serialization_error(e: impl ToString) -> RepositoryError {
    RepositoryError::SerializationError(e.to_string())
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let seed = row
            .seed
            .map(u32::try_from)
            .transpose()
            .map_err(serialization_error)?;

        let request = GenerationRequest::new(
            row.prompt,
            u32::try_from(row.duration_secs).map_err(serialization_error)?,
            u32::try_from(row.bpm).map_err(serialization_error)?,
        )
        .and_then(|r| r.with_temperature(row.temperature.map(|t| t as f32)))
        .map_err(serialization_error)?
        .with_seed(seed)
        .with_style(row.style);

        Ok(HistoryRecord {
            index: u64::try_from(row.id).map_err(serialization_error)?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map_err(serialization_error)?
                .with_timezone(&Utc),
            request,
            source_prompt: row.source_prompt,
            output_path: PathBuf::from(row.output_path),
            captured_ms: u64::try_from(row.captured_ms).map_err(serialization_error)?,
        })
    }
}

#[async_trait]
impl HistoryRepositoryPort for SqliteHistoryRepository {
    async fn append(&self, record: NewHistoryRecord) -> Result<HistoryRecord, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let request = &record.request;
        let result = sqlx::query(
            r#"
            INSERT INTO history (created_at, prompt, source_prompt, duration_secs, bpm,
                                 seed, temperature, style, output_path, captured_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.created_at.to_rfc3339())
        .bind(request.prompt())
        .bind(&record.source_prompt)
        .bind(i64::from(request.duration_secs()))
        .bind(i64::from(request.bpm()))
        .bind(request.seed().map(i64::from))
        .bind(request.temperature().map(f64::from))
        .bind(request.style())
        .bind(record.output_path.to_string_lossy().to_string())
        .bind(record.captured_ms as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let index = u64::try_from(result.last_insert_rowid()).map_err(serialization_error)?;
        tracing::debug!(index = index, "History record appended");

        Ok(HistoryRecord::from_new(index, record))
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, RepositoryError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(HistoryRecord::try_from).collect()
    }

    async fn get(&self, index: u64) -> Result<Option<HistoryRecord>, RepositoryError> {
        let Ok(id) = i64::try_from(index) else {
            return Ok(None);
        };

        let row: Option<HistoryRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(HistoryRecord::try_from).transpose()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        u64::try_from(count).map_err(serialization_error)
    }

    async fn latest(&self) -> Result<Option<HistoryRecord>, RepositoryError> {
        let row: Option<HistoryRow> =
            sqlx::query_as(&format!("{} ORDER BY id DESC LIMIT 1", SELECT_COLUMNS))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(HistoryRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn setup() -> (SqliteHistoryRepository, DbPool) {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (SqliteHistoryRepository::new(pool.clone()), pool)
    }

    fn new_record(prompt: &str) -> NewHistoryRecord {
        NewHistoryRecord {
            created_at: Utc::now(),
            request: GenerationRequest::new(prompt, 10, 100).unwrap(),
            source_prompt: None,
            output_path: PathBuf::from(format!("/music/{}.wav", prompt)),
            captured_ms: 10_000,
        }
    }

    #[tokio::test]
    async fn test_append_and_get_round_trip() {
        let (repo, _pool) = setup().await;
        let mut record = new_record("ambient");
        record.request = record
            .request
            .with_seed(Some(4_000_000_000))
            .with_temperature(Some(0.8))
            .unwrap()
            .with_style(Some("shoegaze".into()));
        record.source_prompt = Some("calm".into());

        let appended = repo.append(record).await.unwrap();
        assert_eq!(appended.index, 1);

        let loaded = repo.get(1).await.unwrap().unwrap();
        assert_eq!(loaded, appended);
        assert_eq!(loaded.request.seed(), Some(4_000_000_000));
        assert_eq!(loaded.request.temperature(), Some(0.8));
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let (repo, _pool) = setup().await;
        for prompt in ["one", "two", "three"] {
            repo.append(new_record(prompt)).await.unwrap();
        }

        let records = repo.list().await.unwrap();
        let prompts: Vec<_> = records.iter().map(|r| r.request.prompt()).collect();
        assert_eq!(prompts, vec!["one", "two", "three"]);
        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.latest().await.unwrap().unwrap().index, 3);
    }

    #[tokio::test]
    async fn test_get_unknown_index() {
        let (repo, _pool) = setup().await;
        repo.append(new_record("one")).await.unwrap();
        assert!(repo.get(99).await.unwrap().is_none());
        assert!(repo.get(u64::MAX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_indices_are_not_reused() {
        let (repo, pool) = setup().await;
        repo.append(new_record("one")).await.unwrap();
        repo.append(new_record("two")).await.unwrap();

        sqlx::query("DELETE FROM history WHERE id = 2")
            .execute(&pool)
            .await
            .unwrap();

        let next = repo.append(new_record("three")).await.unwrap();
        assert_eq!(next.index, 3);
        assert!(repo.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(dir.path().join("history.db"));

        {
            let pool = create_pool(&config).await.unwrap();
            run_migrations(&pool).await.unwrap();
            SqliteHistoryRepository::new(pool.clone())
                .append(new_record("persisted"))
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let record = SqliteHistoryRepository::new(pool).get(1).await.unwrap().unwrap();
        assert_eq!(record.request.prompt(), "persisted");
    }
}

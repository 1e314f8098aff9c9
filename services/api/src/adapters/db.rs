//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `HistoryStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use excuse_core::domain::{ExcuseFilter, GeneratedExcuse, Page, ProofDocument, VoiceClip};
use excuse_core::ports::{HistoryStore, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

const EXCUSE_COLUMNS: &str = "id, scenario, tone, extra_context, excuse_text, believability_score, \
     language, language_confirmed, is_favorite, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `HistoryStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (and creates if needed) the database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private in-memory database on a single, never-recycled connection.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn parse_column<T>(column: &str, raw: &str) -> PortResult<T>
where
    T: FromStr<Err = PortError>,
{
    raw.parse()
        .map_err(|e| PortError::Unexpected(format!("corrupt {} column: {}", column, e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ExcuseRecord {
    id: Uuid,
    scenario: String,
    tone: String,
    extra_context: String,
    excuse_text: String,
    believability_score: i64,
    language: String,
    language_confirmed: bool,
    is_favorite: bool,
    created_at: DateTime<Utc>,
}
impl ExcuseRecord {
    fn to_domain(self) -> PortResult<GeneratedExcuse> {
        Ok(GeneratedExcuse {
            id: self.id,
            scenario: parse_column("scenario", &self.scenario)?,
            tone: parse_column("tone", &self.tone)?,
            extra_context: self.extra_context,
            text: self.excuse_text,
            believability_score: self.believability_score.clamp(0, 100) as u8,
            language: parse_column("language", &self.language)?,
            language_confirmed: self.language_confirmed,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ProofRecord {
    id: Uuid,
    excuse_id: Uuid,
    document_type: String,
    rendered_text: String,
    language: String,
    artifact_path: Option<String>,
    created_at: DateTime<Utc>,
}
impl ProofRecord {
    fn to_domain(self) -> PortResult<ProofDocument> {
        Ok(ProofDocument {
            id: self.id,
            excuse_id: self.excuse_id,
            document_type: parse_column("document_type", &self.document_type)?,
            rendered_text: self.rendered_text,
            language: parse_column("language", &self.language)?,
            artifact_path: self.artifact_path,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct VoiceClipRecord {
    id: Uuid,
    excuse_id: Uuid,
    audio_artifact_path: String,
    language: String,
    created_at: DateTime<Utc>,
}
impl VoiceClipRecord {
    fn to_domain(self) -> PortResult<VoiceClip> {
        Ok(VoiceClip {
            id: self.id,
            excuse_id: self.excuse_id,
            audio_artifact_path: self.audio_artifact_path,
            language: parse_column("language", &self.language)?,
            created_at: self.created_at,
        })
    }
}

/// Inserts referencing a missing excuse surface as `NotFound`.
fn map_insert_error(e: sqlx::Error, excuse_id: Uuid) -> PortError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("Excuse {} not found", excuse_id))
        }
        _ => unexpected(e),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ExcuseFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(favorite) = filter.favorite {
        builder.push(" AND is_favorite = ").push_bind(favorite);
    }
    if let Some(language) = filter.language {
        builder.push(" AND language = ").push_bind(language.as_str());
    }
}

//=========================================================================================
// `HistoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryStore for DbAdapter {
    async fn create_excuse(&self, excuse: &GeneratedExcuse) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO excuses (id, scenario, tone, extra_context, excuse_text, believability_score, \
             language, language_confirmed, is_favorite, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(excuse.id)
        .bind(excuse.scenario.as_str())
        .bind(excuse.tone.as_str())
        .bind(&excuse.extra_context)
        .bind(&excuse.text)
        .bind(excuse.believability_score as i64)
        .bind(excuse.language.as_str())
        .bind(excuse.language_confirmed)
        .bind(excuse.is_favorite)
        .bind(excuse.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_excuse(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse> {
        let record = sqlx::query_as::<_, ExcuseRecord>(&format!(
            "SELECT {} FROM excuses WHERE id = ?",
            EXCUSE_COLUMNS
        ))
        .bind(excuse_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Excuse {} not found", excuse_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_excuses(&self, filter: &ExcuseFilter) -> PortResult<Page<GeneratedExcuse>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM excuses");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM excuses", EXCUSE_COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.limit() as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);
        let records = select
            .build_query_as::<ExcuseRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let items = records
            .into_iter()
            .map(ExcuseRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total: total.max(0) as u64,
            page: filter.page.max(1),
            per_page: filter.limit(),
        })
    }

    async fn toggle_favorite(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse> {
        let result = sqlx::query("UPDATE excuses SET is_favorite = NOT is_favorite WHERE id = ?")
            .bind(excuse_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Excuse {} not found", excuse_id)));
        }
        self.get_excuse(excuse_id).await
    }

    async fn set_favorite(&self, excuse_id: Uuid, favorite: bool) -> PortResult<GeneratedExcuse> {
        let result = sqlx::query("UPDATE excuses SET is_favorite = ? WHERE id = ?")
            .bind(favorite)
            .bind(excuse_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Excuse {} not found", excuse_id)));
        }
        self.get_excuse(excuse_id).await
    }

    async fn delete_excuse(&self, excuse_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM excuses WHERE id = ?")
            .bind(excuse_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Excuse {} not found", excuse_id)));
        }
        Ok(())
    }

    async fn save_proof(&self, proof: &ProofDocument) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO proof_documents (id, excuse_id, document_type, rendered_text, language, artifact_path, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(proof.id)
        .bind(proof.excuse_id)
        .bind(proof.document_type.as_str())
        .bind(&proof.rendered_text)
        .bind(proof.language.as_str())
        .bind(&proof.artifact_path)
        .bind(proof.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, proof.excuse_id))?;
        Ok(())
    }

    async fn list_proofs(&self, excuse_id: Uuid) -> PortResult<Vec<ProofDocument>> {
        let records = sqlx::query_as::<_, ProofRecord>(
            "SELECT id, excuse_id, document_type, rendered_text, language, artifact_path, created_at \
             FROM proof_documents WHERE excuse_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(excuse_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(ProofRecord::to_domain).collect()
    }

    async fn delete_proof(&self, proof_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM proof_documents WHERE id = ?")
            .bind(proof_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Proof document {} not found", proof_id)));
        }
        Ok(())
    }

    async fn save_voice_clip(&self, clip: &VoiceClip) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO voice_clips (id, excuse_id, audio_artifact_path, language, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(clip.id)
        .bind(clip.excuse_id)
        .bind(&clip.audio_artifact_path)
        .bind(clip.language.as_str())
        .bind(clip.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, clip.excuse_id))?;
        Ok(())
    }

    async fn list_voice_clips(&self, excuse_id: Uuid) -> PortResult<Vec<VoiceClip>> {
        let records = sqlx::query_as::<_, VoiceClipRecord>(
            "SELECT id, excuse_id, audio_artifact_path, language, created_at \
             FROM voice_clips WHERE excuse_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(excuse_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(VoiceClipRecord::to_domain).collect()
    }
}

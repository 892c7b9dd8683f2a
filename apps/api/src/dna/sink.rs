//! Result persistence for finished sessions (completed or failed).
//!
//! Saves are upserts keyed by session id, so a failed save can be retried on
//! its own without touching the in-memory session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::dna::extractor::DecisionDna;
use crate::dna::scenario::DecisionResponse;
use crate::dna::scoring::CompatibilityReport;
use crate::dna::session::SessionStatus;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{field} does not fit its column: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

/// Everything persisted for one session, keyed by the owning application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub application_id: Uuid,
    pub candidate_id: Uuid,
    pub listing_id: Uuid,
    pub status: SessionStatus,
    pub total_scenarios: u32,
    pub responses: Vec<DecisionResponse>,
    pub dna: Option<DecisionDna>,
    pub compatibility: Option<CompatibilityReport>,
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, record: &SessionRecord) -> Result<(), SinkError>;
}

/// Postgres-backed sink writing to `decision_dna_results`.
#[derive(Clone)]
pub struct PgResultSink {
    pool: PgPool,
}

impl SessionRecord {
    /// `total_scenarios` as stored in the INTEGER column.
    fn total_scenarios_column(&self) -> Result<i32, SinkError> {
        i32::try_from(self.total_scenarios).map_err(|_| SinkError::OutOfRange {
            field: "total_scenarios",
            value: u64::from(self.total_scenarios),
        })
    }
}

impl PgResultSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultSink for PgResultSink {
    async fn persist(&self, record: &SessionRecord) -> Result<(), SinkError> {
        let responses = serde_json::to_value(&record.responses)?;
        let dna = record.dna.as_ref().map(serde_json::to_value).transpose()?;
        let compatibility = record
            .compatibility
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let score = record.compatibility.as_ref().map(|c| c.score);
        let total_scenarios = record.total_scenarios_column()?;

        sqlx::query(
            r#"
            INSERT INTO decision_dna_results
                (session_id, application_id, candidate_id, listing_id, status,
                 total_scenarios, responses, dna, compatibility, compatibility_score,
                 failure_reason, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (session_id) DO UPDATE SET
                status = EXCLUDED.status,
                responses = EXCLUDED.responses,
                dna = EXCLUDED.dna,
                compatibility = EXCLUDED.compatibility,
                compatibility_score = EXCLUDED.compatibility_score,
                failure_reason = EXCLUDED.failure_reason,
                finished_at = EXCLUDED.finished_at,
                updated_at = now()
            "#,
        )
        .bind(record.session_id)
        .bind(record.application_id)
        .bind(record.candidate_id)
        .bind(record.listing_id)
        .bind(record.status.as_str())
        .bind(total_scenarios)
        .bind(&responses)
        .bind(&dna)
        .bind(&compatibility)
        .bind(score)
        .bind(&record.failure_reason)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Persisted Decision DNA session {} ({}, {} responses) for application {}",
            record.session_id,
            record.status.as_str(),
            record.responses.len(),
            record.application_id
        );

        Ok(())
    }
}

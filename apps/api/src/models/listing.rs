use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::dna::scoring::DecisionProfileTarget;
use crate::errors::AppError;

/// How a listing uses the Decision DNA test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionDnaMode {
    NoTest,
    Optional,
    Required,
}

impl FromStr for DecisionDnaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "no_test" => Ok(DecisionDnaMode::NoTest),
            "optional" => Ok(DecisionDnaMode::Optional),
            "required" => Ok(DecisionDnaMode::Required),
            other => Err(format!("unknown decision_dna_mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ListingDnaRow {
    pub id: Uuid,
    pub job_category: Option<String>,
    pub decision_dna_enabled: bool,
    pub decision_dna_mode: String,
    pub decision_profile_target: Option<serde_json::Value>,
}

/// Decision-DNA settings of one job listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDnaSettings {
    pub listing_id: Uuid,
    pub job_category: Option<String>,
    pub enabled: bool,
    pub mode: DecisionDnaMode,
    pub target: Option<DecisionProfileTarget>,
}

impl ListingDnaSettings {
    /// The engine runs only for enabled listings whose mode asks for a test.
    pub fn runs_test(&self) -> bool {
        self.enabled && self.mode != DecisionDnaMode::NoTest
    }
}

impl TryFrom<ListingDnaRow> for ListingDnaSettings {
    type Error = anyhow::Error;

    fn try_from(row: ListingDnaRow) -> Result<Self, Self::Error> {
        let mode = row
            .decision_dna_mode
            .parse::<DecisionDnaMode>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("listing {} has an invalid mode", row.id))?;

        let target = row
            .decision_profile_target
            .filter(|v| !v.is_null())
            .map(serde_json::from_value::<DecisionProfileTarget>)
            .transpose()
            .with_context(|| format!("listing {} has a malformed decision_profile_target", row.id))?;

        Ok(Self {
            listing_id: row.id,
            job_category: row.job_category,
            enabled: row.decision_dna_enabled,
            mode,
            target,
        })
    }
}

/// Read access to listing settings.
#[async_trait]
pub trait ListingReader: Send + Sync {
    async fn dna_settings(&self, listing_id: Uuid) -> Result<Option<ListingDnaSettings>, AppError>;
}

pub struct PgListingReader {
    pool: PgPool,
}

impl PgListingReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingReader for PgListingReader {
    async fn dna_settings(&self, listing_id: Uuid) -> Result<Option<ListingDnaSettings>, AppError> {
        let row = sqlx::query_as::<_, ListingDnaRow>(
            r#"
            SELECT id, job_category, decision_dna_enabled, decision_dna_mode,
                   decision_profile_target
            FROM job_listings
            WHERE id = $1
            "#,
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ListingDnaSettings::try_from)
            .transpose()
            .map_err(AppError::Internal)
    }
}

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::dna::generation::{GenerationPolicy, GenerationTier};
use crate::dna::scoring::BucketBoundaries;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub dna: DnaConfig,
}

/// Tunables of the Decision DNA engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DnaConfig {
    pub total_scenarios: u32,
    /// Upper bound for a per-session `total_scenarios` override.
    pub max_scenarios: u32,
    pub generation_timeout: Duration,
    pub primary_attempts: u32,
    /// 0 disables the fallback tier.
    pub fallback_attempts: u32,
    pub bucket_boundary: f64,
    /// How long a finished, saved session stays readable before eviction.
    pub finished_retention: Duration,
}

impl Default for DnaConfig {
    fn default() -> Self {
        Self {
            total_scenarios: 20,
            max_scenarios: 50,
            generation_timeout: Duration::from_secs(30),
            primary_attempts: 2,
            fallback_attempts: 1,
            bucket_boundary: 1.0 / 3.0,
            finished_retention: Duration::from_secs(600),
        }
    }
}

impl DnaConfig {
    pub fn generation_policy(&self) -> GenerationPolicy {
        GenerationPolicy {
            tiers: vec![
                GenerationTier::primary().with_attempts(self.primary_attempts),
                GenerationTier::fallback().with_attempts(self.fallback_attempts),
            ],
            timeout: self.generation_timeout,
        }
    }

    pub fn bucket_boundaries(&self) -> BucketBoundaries {
        BucketBoundaries::symmetric(self.bucket_boundary)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let total_scenarios = parse_or(&lookup, "DNA_TOTAL_SCENARIOS", defaults.total_scenarios)?;
        if total_scenarios < 1 {
            bail!("DNA_TOTAL_SCENARIOS must be at least 1");
        }

        let max_scenarios = parse_or(&lookup, "DNA_MAX_SCENARIOS", defaults.max_scenarios)?;
        if max_scenarios < total_scenarios {
            bail!("DNA_MAX_SCENARIOS must not be below DNA_TOTAL_SCENARIOS");
        }
        if i32::try_from(max_scenarios).is_err() {
            bail!("DNA_MAX_SCENARIOS is too large");
        }

        let timeout_secs = parse_or(
            &lookup,
            "DNA_GENERATION_TIMEOUT_SECS",
            defaults.generation_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            bail!("DNA_GENERATION_TIMEOUT_SECS must be positive");
        }

        let primary_attempts = parse_or(&lookup, "DNA_PRIMARY_ATTEMPTS", defaults.primary_attempts)?;
        if primary_attempts < 1 {
            bail!("DNA_PRIMARY_ATTEMPTS must be at least 1");
        }
        let fallback_attempts =
            parse_or(&lookup, "DNA_FALLBACK_ATTEMPTS", defaults.fallback_attempts)?;

        let bucket_boundary = parse_or(&lookup, "DNA_BUCKET_BOUNDARY", defaults.bucket_boundary)?;
        if !(bucket_boundary > 0.0 && bucket_boundary < 1.0) {
            bail!("DNA_BUCKET_BOUNDARY must lie strictly between 0 and 1");
        }

        let retention_secs = parse_or(
            &lookup,
            "DNA_FINISHED_RETENTION_SECS",
            defaults.finished_retention.as_secs(),
        )?;

        Ok(Self {
            total_scenarios,
            max_scenarios,
            generation_timeout: Duration::from_secs(timeout_secs),
            primary_attempts,
            fallback_attempts,
            bucket_boundary,
            finished_retention: Duration::from_secs(retention_secs),
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            dna: DnaConfig::from_lookup(|key| std::env::var(key).ok())?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

//! Scenario generation. Holds the port to the generative service and the
//! tier ladder that bounds retries and model fallback around it; untyped
//! payloads are validated here before anything else sees them.
//!
//! Nothing unvalidated leaves this module: callers receive either a
//! `MicroScenario` or a `LadderError`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::dna::prompts::{SCENARIO_PROMPT_TEMPLATE, SCENARIO_SYSTEM};
use crate::dna::scenario::{ContextMap, DecisionOption, MicroScenario, OptionId};
use crate::dna::tradeoff::TradeoffVector;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{
    CallOptions, LlmClient, LlmError, DEFAULT_MAX_TOKENS, FALLBACK_MODEL, PRIMARY_MODEL,
};

// ────────────────────────────────────────────────────────────────────────────
// Port
// ────────────────────────────────────────────────────────────────────────────

/// One earlier answer, as seen by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviousChoice {
    pub order: u32,
    pub selected_option_id: OptionId,
}

/// Everything the generator is told about the session so far.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub previous_choices: Vec<PreviousChoice>,
    pub current_context: ContextMap,
    pub job_category: Option<String>,
    pub scenario_order: u32,
    pub total_scenarios: u32,
}

/// A generation backend at a given cost/quality level, tried `attempts` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTier {
    pub name: String,
    pub model: String,
    pub max_tokens: u32,
    pub attempts: u32,
}

impl GenerationTier {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        attempts: u32,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            max_tokens,
            attempts,
        }
    }

    /// Main model: one try plus one retry.
    pub fn primary() -> Self {
        Self::new("primary", PRIMARY_MODEL, DEFAULT_MAX_TOKENS, 2)
    }

    /// Degraded model: a single try once the primary tier is exhausted.
    pub fn fallback() -> Self {
        Self::new("fallback", FALLBACK_MODEL, DEFAULT_MAX_TOKENS, 1)
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Port to the external generative service. Returns the raw, unvalidated
/// payload; validation happens in [`validate_payload`].
#[async_trait]
pub trait ScenarioGenerationPort: Send + Sync {
    async fn generate(
        &self,
        tier: &GenerationTier,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("payload does not match the scenario schema: {0}")]
    Schema(String),

    #[error("decision_prompt is missing or empty")]
    MissingPrompt,

    #[error("expected exactly 2 options, got {0}")]
    OptionCount(usize),

    #[error("unknown option id '{0}'")]
    UnknownOptionId(String),

    #[error("duplicate option id '{0}'")]
    DuplicateOptionId(OptionId),

    #[error("option {0} has an empty label")]
    EmptyLabel(OptionId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("generation call timed out")]
    Timeout,

    #[error("malformed scenario: {0}")]
    Malformed(#[from] ValidationFailure),

    #[error("generation service unavailable: {0}")]
    Unavailable(String),
}

/// Every tier and attempt was used without producing a valid scenario.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("scenario generation failed after {attempts} attempts: {last_error}")]
pub struct LadderError {
    pub attempts: u32,
    pub last_error: GenerationError,
}

// ────────────────────────────────────────────────────────────────────────────
// Boundary validation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScenario {
    decision_prompt: Option<String>,
    options: Vec<RawOption>,
    context_evolution: ContextMap,
    #[serde(default)]
    time_limit_seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOption {
    id: String,
    label: String,
    tradeoff_vector: TradeoffVector,
}

/// Validates an untyped generator payload into a `MicroScenario`.
///
/// Trade-off values out of [-1, 1] are clamped; every other deviation
/// (missing or empty prompt, option count ≠ 2, unknown or duplicate ids,
/// unknown fields) is a `ValidationFailure`.
pub fn validate_payload(
    payload: serde_json::Value,
    order: u32,
    context_state: &ContextMap,
) -> Result<MicroScenario, ValidationFailure> {
    let raw: RawScenario =
        serde_json::from_value(payload).map_err(|e| ValidationFailure::Schema(e.to_string()))?;

    let decision_prompt = raw
        .decision_prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or(ValidationFailure::MissingPrompt)?;

    let [first, second]: [RawOption; 2] = raw
        .options
        .try_into()
        .map_err(|options: Vec<RawOption>| ValidationFailure::OptionCount(options.len()))?;

    let first = validate_option(first)?;
    let second = validate_option(second)?;
    if first.id == second.id {
        return Err(ValidationFailure::DuplicateOptionId(first.id));
    }

    Ok(MicroScenario::new(
        order,
        context_state.clone(),
        decision_prompt,
        [first, second],
        raw.time_limit_seconds.filter(|&s| s > 0),
        raw.context_evolution,
    ))
}

fn validate_option(raw: RawOption) -> Result<DecisionOption, ValidationFailure> {
    let id = raw
        .id
        .parse::<OptionId>()
        .map_err(ValidationFailure::UnknownOptionId)?;
    let label = raw.label.trim().to_string();
    if label.is_empty() {
        return Err(ValidationFailure::EmptyLabel(id));
    }
    Ok(DecisionOption {
        id,
        label,
        tradeoff_vector: raw.tradeoff_vector,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tier ladder
// ────────────────────────────────────────────────────────────────────────────

/// Ordered tiers, each tried its own number of times, each call bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    pub tiers: Vec<GenerationTier>,
    pub timeout: Duration,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![GenerationTier::primary(), GenerationTier::fallback()],
            timeout: Duration::from_secs(30),
        }
    }
}

impl GenerationPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.tiers.iter().map(|t| t.attempts).sum()
    }
}

/// A validated scenario and the number of port calls it took.
#[derive(Debug, Clone)]
pub struct Generated {
    pub scenario: MicroScenario,
    pub attempts: u32,
    pub tier: String,
}

/// Walks the tier ladder until the port yields a payload that validates.
///
/// A timed-out call is dropped, not awaited further.
pub async fn generate_scenario(
    port: &dyn ScenarioGenerationPort,
    policy: &GenerationPolicy,
    request: &GenerationRequest,
) -> Result<Generated, LadderError> {
    let mut attempts = 0;
    let mut last_error = GenerationError::Unavailable("no generation tiers configured".to_string());

    for (tier_index, tier) in policy.tiers.iter().enumerate() {
        if tier.attempts == 0 {
            continue;
        }
        if tier_index > 0 {
            info!(
                "Falling back to generation tier '{}' for scenario {}",
                tier.name, request.scenario_order
            );
        }

        for attempt in 1..=tier.attempts {
            attempts += 1;

            let outcome = match tokio::time::timeout(policy.timeout, port.generate(tier, request))
                .await
            {
                Err(_) => Err(GenerationError::Timeout),
                Ok(Err(e)) => Err(e),
                Ok(Ok(payload)) => validate_payload(
                    payload,
                    request.scenario_order,
                    &request.current_context,
                )
                .map_err(GenerationError::Malformed),
            };

            match outcome {
                Ok(scenario) => {
                    return Ok(Generated {
                        scenario,
                        attempts,
                        tier: tier.name.clone(),
                    })
                }
                Err(e) => {
                    warn!(
                        "Scenario {} generation failed on tier '{}' (attempt {}/{}): {}",
                        request.scenario_order, tier.name, attempt, tier.attempts, e
                    );
                    last_error = e;
                }
            }
        }
    }

    Err(LadderError {
        attempts,
        last_error,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// LLM adapter
// ────────────────────────────────────────────────────────────────────────────

/// Some variety between sessions; scenarios for the same context should not repeat verbatim.
const SCENARIO_TEMPERATURE: f32 = 0.8;

/// Generation port backed by the Anthropic client. Each tier maps to a model.
#[derive(Clone)]
pub struct LlmScenarioGenerator {
    llm: LlmClient,
}

impl LlmScenarioGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ScenarioGenerationPort for LlmScenarioGenerator {
    async fn generate(
        &self,
        tier: &GenerationTier,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError> {
        let prompt = build_scenario_prompt(request)?;
        let system = format!("{SCENARIO_SYSTEM} {JSON_ONLY_SYSTEM}");
        let options = CallOptions {
            model: &tier.model,
            max_tokens: tier.max_tokens,
            temperature: Some(SCENARIO_TEMPERATURE),
        };

        self.llm
            .call_json::<serde_json::Value>(options, &prompt, &system)
            .await
            .map_err(|e| match e {
                LlmError::Timeout => GenerationError::Timeout,
                LlmError::Parse(e) => ValidationFailure::Schema(e.to_string()).into(),
                LlmError::EmptyContent => {
                    ValidationFailure::Schema("empty completion".to_string()).into()
                }
                truncated @ LlmError::Truncated { .. } => {
                    ValidationFailure::Schema(truncated.to_string()).into()
                }
                other => GenerationError::Unavailable(other.to_string()),
            })
    }
}

/// Fills the scenario template with the request's history and context.
fn build_scenario_prompt(request: &GenerationRequest) -> Result<String, GenerationError> {
    let context_json = serde_json::to_string_pretty(&request.current_context)
        .map_err(|e| GenerationError::Unavailable(format!("Failed to serialize context: {e}")))?;
    let history_json = serde_json::to_string(
        &request
            .previous_choices
            .iter()
            .map(|c| (c.order, c.selected_option_id))
            .collect::<Vec<_>>(),
    )
    .map_err(|e| GenerationError::Unavailable(format!("Failed to serialize history: {e}")))?;

    Ok(SCENARIO_PROMPT_TEMPLATE
        .replace("{scenario_number}", &(request.scenario_order + 1).to_string())
        .replace("{total_scenarios}", &request.total_scenarios.to_string())
        .replace(
            "{job_category}",
            request.job_category.as_deref().unwrap_or("general"),
        )
        .replace("{context_json}", &context_json)
        .replace("{history_json}", &history_json))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

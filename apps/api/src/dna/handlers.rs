//! Axum route handlers for the Decision DNA API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dna::extractor::DecisionDna;
use crate::dna::scenario::{ContextMap, MicroScenario, OptionId};
use crate::dna::scoring::{CompatibilityReport, DecisionProfileTarget};
use crate::dna::session::{DecisionSession, SessionOwner, SessionStatus, StartParams, StepOutcome};
use crate::dna::store::SharedSession;
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub candidate_id: Uuid,
    pub listing_id: Uuid,
    pub application_id: Uuid,
    #[serde(default)]
    pub initial_context: ContextMap,
    pub job_category: Option<String>,
    pub total_scenarios: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitChoiceRequest {
    pub option_id: String,
    pub response_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CompatibilityRequest {
    pub dna: DecisionDna,
    pub target: DecisionProfileTarget,
}

/// What the candidate sees of an option. Trade-off vectors stay server-side.
#[derive(Debug, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ScenarioView {
    pub order: u32,
    pub decision_prompt: String,
    pub options: Vec<OptionView>,
    pub time_limit_seconds: Option<u32>,
    pub context_state: ContextMap,
}

impl From<&MicroScenario> for ScenarioView {
    fn from(scenario: &MicroScenario) -> Self {
        Self {
            order: scenario.order(),
            decision_prompt: scenario.decision_prompt().to_string(),
            options: scenario
                .options()
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    label: o.label.clone(),
                })
                .collect(),
            time_limit_seconds: scenario.time_limit_seconds(),
            context_state: scenario.context_state().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub step: u32,
    pub total_scenarios: u32,
    pub scenario: Option<ScenarioView>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChoiceResponse {
    Next {
        scenario: ScenarioView,
        step: u32,
    },
    Completed {
        dna: DecisionDna,
        compatibility: Option<CompatibilityReport>,
        persisted: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub step: u32,
    pub total_scenarios: u32,
    pub scenario: Option<ScenarioView>,
    pub dna: Option<DecisionDna>,
    pub compatibility: Option<CompatibilityReport>,
    pub failure_reason: Option<String>,
    pub persisted: bool,
}

impl From<&DecisionSession> for SessionSnapshot {
    fn from(session: &DecisionSession) -> Self {
        Self {
            session_id: session.id(),
            status: session.status(),
            step: session.step(),
            total_scenarios: session.total_scenarios(),
            scenario: session.current_scenario().map(ScenarioView::from),
            dna: session.dna().copied(),
            compatibility: session.compatibility().cloned(),
            failure_reason: session.failure_reason().map(str::to_string),
            persisted: session.is_persisted(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PersistResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub persisted: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/dna/sessions
///
/// Starts a session for an eligible listing and returns scenario 0.
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    let settings = state
        .listings
        .dna_settings(request.listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", request.listing_id)))?;

    if !settings.runs_test() {
        return Err(AppError::Validation(format!(
            "Listing {} does not use the Decision DNA test",
            request.listing_id
        )));
    }

    let total_scenarios = request.total_scenarios.unwrap_or(state.dna.total_scenarios);
    if total_scenarios < 1 {
        return Err(AppError::Validation(
            "total_scenarios must be at least 1".to_string(),
        ));
    }
    if total_scenarios > state.dna.max_scenarios {
        return Err(AppError::Validation(format!(
            "total_scenarios must not exceed {}",
            state.dna.max_scenarios
        )));
    }

    let owner = SessionOwner {
        candidate_id: request.candidate_id,
        listing_id: request.listing_id,
        application_id: request.application_id,
    };
    // dropped on every early return, which frees the pair
    let reservation = state
        .sessions
        .reserve(owner.candidate_id, owner.listing_id)
        .await?;

    let params = StartParams {
        owner,
        initial_context: request.initial_context,
        job_category: request.job_category.or(settings.job_category),
        total_scenarios,
        target: settings.target,
    };

    let session = state.controller.start(params).await?;

    let response = StartSessionResponse {
        session_id: session.id(),
        status: session.status(),
        step: session.step(),
        total_scenarios: session.total_scenarios(),
        scenario: session.current_scenario().map(ScenarioView::from),
    };
    reservation.commit(session).await;

    Ok(Json(response))
}

/// POST /api/v1/dna/sessions/:id/choices
///
/// Records a choice and returns the next scenario or the final profile.
pub async fn handle_submit_choice(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitChoiceRequest>,
) -> Result<Json<ChoiceResponse>, AppError> {
    let shared = find_session(&state, session_id).await?;
    let mut session = shared.lock().await;

    let outcome = state
        .controller
        .submit_choice(&mut session, &request.option_id, request.response_time_ms)
        .await?;

    let response = match outcome {
        StepOutcome::Next(scenario) => ChoiceResponse::Next {
            scenario: ScenarioView::from(&scenario),
            step: session.step(),
        },
        StepOutcome::Completed { dna, compatibility } => ChoiceResponse::Completed {
            dna,
            compatibility,
            persisted: session.is_persisted(),
        },
    };

    Ok(Json(response))
}

/// POST /api/v1/dna/sessions/:id/resume
///
/// Generates the scenario a cancelled choice request left pending. A session
/// already waiting for an answer returns its current scenario unchanged.
pub async fn handle_resume_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let shared = find_session(&state, session_id).await?;
    let mut session = shared.lock().await;

    state.controller.resume(&mut session).await?;

    Ok(Json(SessionSnapshot::from(&*session)))
}

/// GET /api/v1/dna/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let shared = find_session(&state, session_id).await?;
    let session = shared.lock().await;
    Ok(Json(SessionSnapshot::from(&*session)))
}

/// POST /api/v1/dna/sessions/:id/persist
///
/// Retries the save of a finished session without re-running anything else.
pub async fn handle_persist_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PersistResponse>, AppError> {
    let shared = find_session(&state, session_id).await?;
    let mut session = shared.lock().await;

    state.controller.persist(&mut session).await?;

    Ok(Json(PersistResponse {
        session_id,
        status: session.status(),
        persisted: session.is_persisted(),
    }))
}

/// POST /api/v1/dna/compatibility
///
/// Scores a profile against a target. Always recomputed.
pub async fn handle_compatibility(
    State(state): State<AppState>,
    Json(request): Json<CompatibilityRequest>,
) -> Result<Json<CompatibilityReport>, AppError> {
    let report = state.scorer.score(&request.dna.clamped(), &request.target);
    Ok(Json(report))
}

async fn find_session(state: &AppState, session_id: Uuid) -> Result<SharedSession, AppError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Decision DNA session {session_id} not found")))
}

//! Session protocol: drives one candidate through a fixed-length sequence
//! of micro-scenarios for one job listing.
//!
//! State machine:
//!
//! ```text
//! Initializing ──► AwaitingResponse ◄──► GeneratingNext
//!      │                  │                    │
//!      │                  └──► Completed       │
//!      └──────────────► Failed ◄───────────────┘
//! ```
//!
//! `Completed` and `Failed` are terminal. The controller holds no session
//! state of its own: every call receives the session it acts on.
//!
//! A choice is recorded before the next scenario is generated. If the caller
//! drops `submit_choice` mid-generation the session stays in `GeneratingNext`
//! with the answer kept, and [`SessionController::resume`] picks it up again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::dna::extractor::{extract, DecisionDna};
use crate::dna::generation::{
    generate_scenario, GenerationError, GenerationPolicy, GenerationRequest, PreviousChoice,
    ScenarioGenerationPort,
};
use crate::dna::scenario::{evolve_context, ContextMap, DecisionResponse, MicroScenario};
use crate::dna::scoring::{CompatibilityReport, CompatibilityScorer, DecisionProfileTarget};
use crate::dna::sink::{ResultSink, SessionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    AwaitingResponse,
    GeneratingNext,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::AwaitingResponse => "awaiting_response",
            SessionStatus::GeneratingNext => "generating_next",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum DnaError {
    #[error("option '{option_id}' is not one of the current scenario's options")]
    InvalidChoice { option_id: String },

    #[error("session is {} and accepts no further choices", .status.as_str())]
    SessionClosed { status: SessionStatus },

    #[error("scenario {order} has not been generated yet; resume the session")]
    ScenarioPending { order: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("scenario generation failed after {attempts} attempts: {source}")]
    GenerationFailed {
        attempts: u32,
        source: GenerationError,
        partial_saved: bool,
    },

    #[error("failed to persist session results: {0}")]
    Persistence(String),
}

/// The (candidate, listing) pair a session belongs to, plus the application
/// record its results attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionOwner {
    pub candidate_id: Uuid,
    pub listing_id: Uuid,
    pub application_id: Uuid,
}

/// Parameters for [`SessionController::start`].
#[derive(Debug, Clone)]
pub struct StartParams {
    pub owner: SessionOwner,
    pub initial_context: ContextMap,
    pub job_category: Option<String>,
    pub total_scenarios: u32,
    pub target: Option<DecisionProfileTarget>,
}

/// Per-session state. Owned exclusively by one session; never shared.
#[derive(Debug, Clone)]
pub struct DecisionSession {
    id: Uuid,
    owner: SessionOwner,
    job_category: Option<String>,
    target: Option<DecisionProfileTarget>,
    total_scenarios: u32,
    status: SessionStatus,
    context: ContextMap,
    scenarios: Vec<MicroScenario>,
    responses: Vec<DecisionResponse>,
    dna: Option<DecisionDna>,
    compatibility: Option<CompatibilityReport>,
    failure_reason: Option<String>,
    generation_calls: u32,
    persisted: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl DecisionSession {
    fn new(params: StartParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: params.owner,
            job_category: params.job_category,
            target: params.target,
            total_scenarios: params.total_scenarios,
            status: SessionStatus::Initializing,
            context: params.initial_context,
            scenarios: Vec::new(),
            responses: Vec::new(),
            dna: None,
            compatibility: None,
            failure_reason: None,
            generation_calls: 0,
            persisted: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> SessionOwner {
        self.owner
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Number of answered scenarios.
    pub fn step(&self) -> u32 {
        self.responses.len() as u32
    }

    pub fn total_scenarios(&self) -> u32 {
        self.total_scenarios
    }

    #[cfg(test)]
    pub fn context(&self) -> &ContextMap {
        &self.context
    }

    #[cfg(test)]
    pub fn responses(&self) -> &[DecisionResponse] {
        &self.responses
    }

    pub fn dna(&self) -> Option<&DecisionDna> {
        self.dna.as_ref()
    }

    pub fn compatibility(&self) -> Option<&CompatibilityReport> {
        self.compatibility.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    #[cfg(test)]
    pub fn generation_calls(&self) -> u32 {
        self.generation_calls
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// When the session became terminal.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// The scenario waiting for an answer, if any.
    pub fn current_scenario(&self) -> Option<&MicroScenario> {
        match self.status {
            SessionStatus::AwaitingResponse => self.scenarios.last(),
            _ => None,
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id,
            application_id: self.owner.application_id,
            candidate_id: self.owner.candidate_id,
            listing_id: self.owner.listing_id,
            status: self.status,
            total_scenarios: self.total_scenarios,
            responses: self.responses.clone(),
            dna: self.dna,
            compatibility: self.compatibility.clone(),
            failure_reason: self.failure_reason.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            previous_choices: self
                .responses
                .iter()
                .map(|r| PreviousChoice {
                    order: r.scenario_order,
                    selected_option_id: r.selected_option_id,
                })
                .collect(),
            current_context: self.context.clone(),
            job_category: self.job_category.clone(),
            scenario_order: self.scenarios.len() as u32,
            total_scenarios: self.total_scenarios,
        }
    }

    fn fail(&mut self, reason: String) {
        self.status = SessionStatus::Failed;
        self.failure_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }
}

/// Result of a successful `submit_choice`.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Next(MicroScenario),
    Completed {
        dna: DecisionDna,
        compatibility: Option<CompatibilityReport>,
    },
}

/// Stateless driver of the session protocol.
#[derive(Clone)]
pub struct SessionController {
    port: Arc<dyn ScenarioGenerationPort>,
    policy: GenerationPolicy,
    scorer: Arc<dyn CompatibilityScorer>,
    sink: Arc<dyn ResultSink>,
}

impl SessionController {
    pub fn new(
        port: Arc<dyn ScenarioGenerationPort>,
        policy: GenerationPolicy,
        scorer: Arc<dyn CompatibilityScorer>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            port,
            policy,
            scorer,
            sink,
        }
    }

    /// Starts a session and generates scenario 0.
    ///
    /// On success the session is `AwaitingResponse` and
    /// `current_scenario()` returns the first scenario.
    pub async fn start(&self, params: StartParams) -> Result<DecisionSession, DnaError> {
        if params.total_scenarios < 1 {
            return Err(DnaError::InvalidRequest(
                "total_scenarios must be at least 1".to_string(),
            ));
        }

        let mut session = DecisionSession::new(params);
        info!(
            "Starting Decision DNA session {} for candidate {} on listing {} ({} scenarios)",
            session.id,
            session.owner.candidate_id,
            session.owner.listing_id,
            session.total_scenarios
        );

        self.advance(&mut session).await?;
        Ok(session)
    }

    /// Records the candidate's choice for the current scenario and moves the
    /// session forward. An unknown `option_id` leaves the session untouched.
    pub async fn submit_choice(
        &self,
        session: &mut DecisionSession,
        option_id: &str,
        response_time_ms: Option<u64>,
    ) -> Result<StepOutcome, DnaError> {
        if session.status == SessionStatus::GeneratingNext {
            return Err(DnaError::ScenarioPending {
                order: session.scenarios.len() as u32,
            });
        }
        let scenario = match session.current_scenario() {
            Some(s) => s,
            None => {
                return Err(DnaError::SessionClosed {
                    status: session.status,
                })
            }
        };

        let chosen = scenario
            .resolve_option(option_id)
            .ok_or_else(|| DnaError::InvalidChoice {
                option_id: option_id.to_string(),
            })?;

        let context_after = evolve_context(&session.context, scenario, chosen);
        let response = DecisionResponse {
            scenario_order: scenario.order(),
            selected_option_id: chosen.id,
            context_state_before: session.context.clone(),
            context_state_after: context_after.clone(),
            response_time_ms,
        };

        session.responses.push(response);
        session.context = context_after;

        if session.step() >= session.total_scenarios {
            return self.complete(session).await;
        }

        session.status = SessionStatus::GeneratingNext;
        let next = self.advance(session).await?;
        Ok(StepOutcome::Next(next))
    }

    /// Finishes a generation that was interrupted, or returns the scenario
    /// already waiting for an answer.
    pub async fn resume(&self, session: &mut DecisionSession) -> Result<MicroScenario, DnaError> {
        match session.status {
            SessionStatus::AwaitingResponse => session
                .current_scenario()
                .cloned()
                .ok_or(DnaError::SessionClosed {
                    status: session.status,
                }),
            SessionStatus::GeneratingNext => {
                info!(
                    "Resuming session {} at scenario {}",
                    session.id,
                    session.scenarios.len()
                );
                self.advance(session).await
            }
            status => Err(DnaError::SessionClosed { status }),
        }
    }

    /// Persists a terminal session. Safe to call again after a `Persistence` error.
    pub async fn persist(&self, session: &mut DecisionSession) -> Result<(), DnaError> {
        if !session.status.is_terminal() {
            return Err(DnaError::InvalidRequest(format!(
                "session {} is still {}",
                session.id,
                session.status.as_str()
            )));
        }

        self.sink
            .persist(&session.to_record())
            .await
            .map_err(|e| DnaError::Persistence(e.to_string()))?;
        session.persisted = true;
        Ok(())
    }

    /// Generates the next scenario and presents it, or fails the session.
    async fn advance(&self, session: &mut DecisionSession) -> Result<MicroScenario, DnaError> {
        let request = session.generation_request();

        match generate_scenario(self.port.as_ref(), &self.policy, &request).await {
            Ok(generated) => {
                debug!(
                    "Session {} scenario {} generated on tier '{}' after {} attempt(s)",
                    session.id, request.scenario_order, generated.tier, generated.attempts
                );
                session.generation_calls += generated.attempts;
                session.scenarios.push(generated.scenario.clone());
                session.status = SessionStatus::AwaitingResponse;
                Ok(generated.scenario)
            }
            Err(e) => {
                session.generation_calls += e.attempts;
                error!(
                    "Decision DNA session {} failed at scenario {}: {}",
                    session.id, request.scenario_order, e
                );
                session.fail(e.to_string());

                // Keep whatever was answered; a failed save does not mask the generation failure.
                let partial_saved = match self.persist(session).await {
                    Ok(()) => true,
                    Err(save_err) => {
                        error!(
                            "Could not save partial results of session {}: {}",
                            session.id, save_err
                        );
                        false
                    }
                };

                Err(DnaError::GenerationFailed {
                    attempts: e.attempts,
                    source: e.last_error,
                    partial_saved,
                })
            }
        }
    }

    async fn complete(&self, session: &mut DecisionSession) -> Result<StepOutcome, DnaError> {
        let dna = extract(&session.responses, &session.scenarios);
        let compatibility = session
            .target
            .as_ref()
            .map(|target| self.scorer.score(&dna, target));

        session.status = SessionStatus::Completed;
        session.dna = Some(dna);
        session.compatibility = compatibility.clone();
        session.finished_at = Some(Utc::now());

        info!(
            "Decision DNA session {} completed after {} scenarios and {} generation calls (compatibility: {})",
            session.id,
            session.step(),
            session.generation_calls,
            compatibility
                .as_ref()
                .map(|c| format!("{}%", c.percent))
                .unwrap_or_else(|| "n/a".to_string())
        );

        self.persist(session).await?;

        Ok(StepOutcome::Completed { dna, compatibility })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::generation::tests::{valid_payload, Reply, ScriptedPort};
    use crate::dna::scenario::OptionId;
    use crate::dna::scoring::{Level, OrdinalBucketScorer};
    use crate::dna::sink::tests::MemorySink;
    use serde_json::json;
    use std::time::Duration;

    fn owner() -> SessionOwner {
        SessionOwner {
            candidate_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
        }
    }

    fn params(total: u32) -> StartParams {
        StartParams {
            owner: owner(),
            initial_context: ContextMap::new(),
            job_category: Some("engineering".to_string()),
            total_scenarios: total,
            target: Some(DecisionProfileTarget {
                rapidite: Level::Faible,
                prudence: Level::Eleve,
                optimisation_long_terme: Level::Eleve,
                tolerance_au_risque: Level::Faible,
            }),
        }
    }

    fn policy() -> GenerationPolicy {
        GenerationPolicy {
            timeout: Duration::from_secs(5),
            ..GenerationPolicy::default()
        }
    }

    fn controller(port: Arc<ScriptedPort>, sink: Arc<MemorySink>) -> SessionController {
        SessionController::new(
            port,
            policy(),
            Arc::new(OrdinalBucketScorer::default()),
            sink,
        )
    }

    fn malformed() -> Reply {
        Reply::Payload(json!({"decision_prompt": "only one option", "options": []}))
    }

    #[tokio::test]
    async fn test_start_presents_scenario_zero() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let session = controller(port.clone(), sink).start(params(3)).await.unwrap();

        assert_eq!(session.status(), SessionStatus::AwaitingResponse);
        assert_eq!(session.step(), 0);
        assert_eq!(session.current_scenario().unwrap().order(), 0);
        assert_eq!(port.call_count(), 1);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_scenarios() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let err = controller(port.clone(), sink)
            .start(params(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DnaError::InvalidRequest(_)));
        assert_eq!(port.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_session_completes_after_n_choices() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink.clone());
        let mut session = ctrl.start(params(20)).await.unwrap();

        for step in 0..20u32 {
            assert_eq!(session.current_scenario().unwrap().order(), step);
            let outcome = ctrl.submit_choice(&mut session, "B", Some(1200)).await.unwrap();
            if step < 19 {
                assert!(matches!(outcome, StepOutcome::Next(ref s) if s.order() == step + 1));
            } else {
                match outcome {
                    StepOutcome::Completed { dna, compatibility } => {
                        assert!((dna.risk_tolerance - -0.6).abs() < 1e-9);
                        assert!((dna.decision_speed - -0.5).abs() < 1e-9);
                        assert!((dna.long_term_thinking - 0.7).abs() < 1e-9);
                        assert_eq!(compatibility.unwrap().score, 1.0);
                    }
                    other => panic!("expected completion, got {other:?}"),
                }
            }
        }

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.step(), 20);
        // one generation per scenario, none past step N-1
        assert_eq!(port.call_count(), 20);
        assert_eq!(session.generation_calls(), 20);
        assert!(session.is_persisted());

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].responses.len(), 20);
        assert_eq!(saved[0].status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_single_scenario_session_skips_further_generation() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink);
        let mut session = ctrl.start(params(1)).await.unwrap();
        let outcome = ctrl.submit_choice(&mut session, "A", None).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Completed { .. }));
        assert_eq!(port.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_choice_leaves_session_unchanged() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink);
        let mut session = ctrl.start(params(5)).await.unwrap();
        let context_before = session.context().clone();

        let err = ctrl.submit_choice(&mut session, "C", None).await.unwrap_err();
        assert!(matches!(err, DnaError::InvalidChoice { ref option_id } if option_id == "C"));
        assert_eq!(session.step(), 0);
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);
        assert_eq!(session.context(), &context_before);
        assert_eq!(port.call_count(), 1);
    }

    #[tokio::test]
    async fn test_choice_evolves_context() {
        let port = Arc::new(ScriptedPort::new(vec![Reply::Payload(valid_payload())]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port, sink);

        let mut start = params(3);
        start
            .initial_context
            .insert("release".to_string(), json!("planned"));
        start
            .initial_context
            .insert("company".to_string(), json!("Acme"));
        let mut session = ctrl.start(start).await.unwrap();

        ctrl.submit_choice(&mut session, "a", None).await.unwrap();
        let response = &session.responses()[0];
        assert_eq!(response.selected_option_id, OptionId::A);
        assert_eq!(response.context_state_before["release"], json!("planned"));
        // scenario-supplied key overrides the carried one
        assert_eq!(response.context_state_after["release"], json!("delayed"));
        assert_eq!(response.context_state_after["company"], json!("Acme"));
        assert_eq!(response.context_state_after["decision_speed"], json!(0.9));
        assert_eq!(session.context(), &response.context_state_after);
        // the next scenario is presented against the evolved context
        assert_eq!(
            session.current_scenario().unwrap().context_state(),
            &response.context_state_after
        );
    }

    #[tokio::test]
    async fn test_malformed_then_valid_recovers_within_tier() {
        let port = Arc::new(ScriptedPort::new(vec![malformed(), Reply::Payload(valid_payload())]));
        let sink = Arc::new(MemorySink::default());
        let session = controller(port.clone(), sink).start(params(2)).await.unwrap();
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);
        assert_eq!(session.generation_calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_generation_fails_and_keeps_answers() {
        let port = Arc::new(ScriptedPort::new(vec![
            Reply::Payload(valid_payload()),
            malformed(),
            malformed(),
            malformed(),
        ]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink.clone());
        let mut session = ctrl.start(params(5)).await.unwrap();

        let err = ctrl.submit_choice(&mut session, "B", None).await.unwrap_err();
        match err {
            DnaError::GenerationFailed {
                attempts,
                partial_saved,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(partial_saved);
            }
            other => panic!("expected generation failure, got {other:?}"),
        }

        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.step(), 1);
        assert!(session.failure_reason().is_some());
        assert!(session.dna().is_none());
        assert_eq!(port.call_count(), 4);

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, SessionStatus::Failed);
        assert_eq!(saved[0].responses.len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_session_rejects_choices() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink);
        let mut session = ctrl.start(params(1)).await.unwrap();
        ctrl.submit_choice(&mut session, "A", None).await.unwrap();

        let err = ctrl.submit_choice(&mut session, "A", None).await.unwrap_err();
        assert!(matches!(
            err,
            DnaError::SessionClosed {
                status: SessionStatus::Completed
            }
        ));
        assert_eq!(session.step(), 1);
        assert_eq!(port.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_reports_generation_failure() {
        let port = Arc::new(ScriptedPort::new(vec![
            malformed(),
            malformed(),
            Reply::Fail(GenerationError::Timeout),
        ]));
        let sink = Arc::new(MemorySink::default());
        let err = controller(port, sink.clone())
            .start(params(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DnaError::GenerationFailed {
                source: GenerationError::Timeout,
                ..
            }
        ));
        assert_eq!(sink.saved()[0].status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_state_and_allows_retry() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::failing(1));
        let ctrl = controller(port, sink.clone());
        let mut session = ctrl.start(params(1)).await.unwrap();

        let err = ctrl.submit_choice(&mut session, "B", None).await.unwrap_err();
        assert!(matches!(err, DnaError::Persistence(_)));
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(session.dna().is_some());
        assert!(!session.is_persisted());
        assert!(sink.saved().is_empty());

        ctrl.persist(&mut session).await.unwrap();
        assert!(session.is_persisted());
        assert_eq!(sink.saved().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_rejects_live_session() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port, sink.clone());
        let mut session = ctrl.start(params(3)).await.unwrap();
        assert!(matches!(
            ctrl.persist(&mut session).await,
            Err(DnaError::InvalidRequest(_))
        ));
        assert!(sink.saved().is_empty());
    }

    #[tokio::test]
    async fn test_session_without_target_has_no_compatibility() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port, sink);
        let mut start = params(1);
        start.target = None;
        let mut session = ctrl.start(start).await.unwrap();
        let outcome = ctrl.submit_choice(&mut session, "A", None).await.unwrap();
        assert!(matches!(
            outcome,
            StepOutcome::Completed {
                compatibility: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_generation_request_carries_history() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink);
        let mut session = ctrl.start(params(4)).await.unwrap();
        ctrl.submit_choice(&mut session, "A", None).await.unwrap();
        ctrl.submit_choice(&mut session, "B", None).await.unwrap();

        let request = port.request_for(2).unwrap();
        assert_eq!(request.scenario_order, 2);
        assert_eq!(request.total_scenarios, 4);
        assert_eq!(request.job_category.as_deref(), Some("engineering"));
        assert_eq!(
            request.previous_choices,
            vec![
                PreviousChoice {
                    order: 0,
                    selected_option_id: OptionId::A
                },
                PreviousChoice {
                    order: 1,
                    selected_option_id: OptionId::B
                },
            ]
        );
        // generated against the context left by the second answer
        assert_eq!(
            request.current_context,
            session.responses()[1].context_state_after
        );
        assert_eq!(request.current_context["decision_speed"], json!(-0.5));
        assert_eq!(request.current_context["last_option_id"], json!("B"));

        let first = port.request_for(0).unwrap();
        assert!(first.previous_choices.is_empty());
        assert!(first.current_context.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_choice_can_be_resumed() {
        let port = Arc::new(ScriptedPort::new(vec![
            Reply::Payload(valid_payload()),
            Reply::Delay(Duration::from_secs(3)),
        ]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port.clone(), sink);
        let mut session = ctrl.start(params(3)).await.unwrap();

        // the caller gives up while scenario 1 is still being generated
        let dropped =
            tokio::time::timeout(Duration::from_secs(1), ctrl.submit_choice(&mut session, "A", None))
                .await;
        assert!(dropped.is_err());
        assert_eq!(session.status(), SessionStatus::GeneratingNext);
        assert_eq!(session.step(), 1);
        assert!(session.current_scenario().is_none());

        let err = ctrl.submit_choice(&mut session, "A", None).await.unwrap_err();
        assert!(matches!(err, DnaError::ScenarioPending { order: 1 }));
        assert_eq!(session.step(), 1);

        let next = ctrl.resume(&mut session).await.unwrap();
        assert_eq!(next.order(), 1);
        assert_eq!(session.status(), SessionStatus::AwaitingResponse);
        assert_eq!(port.request_for(1).unwrap().previous_choices.len(), 1);

        // resuming again hands back the same scenario without generating
        let calls = port.call_count();
        assert_eq!(ctrl.resume(&mut session).await.unwrap().order(), 1);
        assert_eq!(port.call_count(), calls);

        ctrl.submit_choice(&mut session, "B", None).await.unwrap();
        let outcome = ctrl.submit_choice(&mut session, "A", None).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Completed { .. }));
        assert_eq!(session.step(), 3);
    }

    #[tokio::test]
    async fn test_resume_rejects_terminal_session() {
        let port = Arc::new(ScriptedPort::new(vec![]));
        let sink = Arc::new(MemorySink::default());
        let ctrl = controller(port, sink);
        let mut session = ctrl.start(params(1)).await.unwrap();
        ctrl.submit_choice(&mut session, "A", None).await.unwrap();
        assert!(matches!(
            ctrl.resume(&mut session).await,
            Err(DnaError::SessionClosed {
                status: SessionStatus::Completed
            })
        ));
    }
}

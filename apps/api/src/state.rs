use std::sync::Arc;

use crate::config::DnaConfig;
use crate::dna::scoring::CompatibilityScorer;
use crate::dna::session::SessionController;
use crate::dna::store::SessionStore;
use crate::models::listing::ListingReader;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
    pub sessions: Arc<SessionStore>,
    pub listings: Arc<dyn ListingReader>,
    /// Same scorer the controller uses, for the stand-alone compatibility endpoint.
    pub scorer: Arc<dyn CompatibilityScorer>,
    pub dna: DnaConfig,
}

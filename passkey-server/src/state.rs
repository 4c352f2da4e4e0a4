//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use passkey_core::CeremonyOrchestrator;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Ceremony orchestrator owning the challenge ledger, repository and verifier
    pub orchestrator: Arc<CeremonyOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: CeremonyOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

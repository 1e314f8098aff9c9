//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use excuse_core::ports::{ArtifactStore, HistoryStore, PortError, PortResult};
use excuse_core::{ExcuseGenerator, ProofRenderer, VoiceRenderer};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The generator and the voice renderer are optional: without an OpenAI key the
/// service still serves history and proofs, and the two AI-backed operations
/// answer with `ServiceUnavailable`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub history: Arc<dyn HistoryStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub proofs: Arc<ProofRenderer>,
    pub generator: Option<Arc<ExcuseGenerator>>,
    pub voice: Option<Arc<VoiceRenderer>>,
}

impl AppState {
    pub fn generator(&self) -> PortResult<&ExcuseGenerator> {
        self.generator.as_deref().ok_or_else(|| {
            PortError::ServiceUnavailable("text generation is not configured".to_string())
        })
    }

    pub fn voice(&self) -> PortResult<&VoiceRenderer> {
        self.voice.as_deref().ok_or_else(|| {
            PortError::ServiceUnavailable("speech synthesis is not configured".to_string())
        })
    }
}

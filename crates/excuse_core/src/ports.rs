//! crates/excuse_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    DocumentType, ExcuseFilter, GeneratedExcuse, Language, Page, ProofDocument, VoiceClip,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port and every core component.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// A user-correctable problem with the submitted values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The external service could not be reached, rejected our credentials or timed out.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Rate limited by the upstream service")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("The upstream service returned an empty response")]
    EmptyResponse,
    #[error("No {document_type} template for language '{language}'")]
    TemplateNotFound {
        document_type: DocumentType,
        language: Language,
    },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Unsupported language for voice synthesis: {0}")]
    UnsupportedLanguage(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A single completion call to a text-generation model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub language: Language,
    pub max_tokens: u32,
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends one non-streaming completion request and returns the raw text.
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechSynthesisService: Send + Sync {
    /// Whether a voice exists for the given language.
    fn supports(&self, language: Language) -> bool;

    /// Generates audio data from a string of text.
    async fn synthesize(&self, text: &str, language: Language) -> PortResult<Vec<u8>>;
}

/// Where generated files end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Proof,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `bytes` under the directory for `kind` and returns the stored path.
    async fn write(&self, kind: ArtifactKind, file_name: &str, bytes: &[u8]) -> PortResult<String>;
    /// Deletes a path previously returned by `write`. Missing files are not an error.
    async fn remove(&self, path: &str) -> PortResult<()>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    // --- Excuses ---
    async fn create_excuse(&self, excuse: &GeneratedExcuse) -> PortResult<()>;

    async fn get_excuse(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse>;

    async fn list_excuses(&self, filter: &ExcuseFilter) -> PortResult<Page<GeneratedExcuse>>;

    /// Flips the favorite flag and returns the updated excuse.
    async fn toggle_favorite(&self, excuse_id: Uuid) -> PortResult<GeneratedExcuse>;

    async fn set_favorite(&self, excuse_id: Uuid, favorite: bool) -> PortResult<GeneratedExcuse>;

    /// Removes the excuse together with its proof and voice metadata.
    async fn delete_excuse(&self, excuse_id: Uuid) -> PortResult<()>;

    // --- Proof documents ---
    async fn save_proof(&self, proof: &ProofDocument) -> PortResult<()>;

    async fn list_proofs(&self, excuse_id: Uuid) -> PortResult<Vec<ProofDocument>>;

    async fn delete_proof(&self, proof_id: Uuid) -> PortResult<()>;

    // --- Voice clips ---
    async fn save_voice_clip(&self, clip: &VoiceClip) -> PortResult<()>;

    async fn list_voice_clips(&self, excuse_id: Uuid) -> PortResult<Vec<VoiceClip>>;
}

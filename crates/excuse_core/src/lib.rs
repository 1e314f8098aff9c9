pub mod domain;
pub mod generation;
pub mod ports;
pub mod prompt;
pub mod proof;
pub mod scoring;
pub mod templates;
pub mod voice;

pub use domain::{
    DocumentType, ExcuseFilter, ExcuseRequest, GeneratedExcuse, Language, Page, ProofDocument,
    Scenario, Tone, VoiceClip,
};
pub use generation::{ExcuseGenerator, GenerationSettings};
pub use ports::{
    ArtifactKind, ArtifactStore, CompletionRequest, HistoryStore, PortError, PortResult,
    SpeechSynthesisService, TextGenerationService,
};
pub use proof::{ProofRenderer, ProofRequest, RenderedProof};
pub use scoring::{BelievabilityScorer, ScoringPolicy};
pub use templates::TemplateStore;
pub use voice::VoiceRenderer;

//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! It implements the `SpeechSynthesisService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client,
};
use async_trait::async_trait;
use excuse_core::ports::{PortError, PortResult, SpeechSynthesisService};
use excuse_core::Language;
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechSynthesisService` port using the OpenAI TTS API.
///
/// The TTS models are multilingual, so the set of languages a clip may be
/// rendered in is configuration rather than a property of the model.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
    languages: Vec<Language>,
}

impl OpenAiTtsAdapter {
    /// Creates a new `OpenAiTtsAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: SpeechModel,
        voice: Voice,
        languages: Vec<Language>,
    ) -> Self {
        Self {
            client,
            model,
            voice,
            languages,
        }
    }
}

/// Resolves a configured model name.
pub fn speech_model(name: &str) -> PortResult<SpeechModel> {
    match name.trim().to_lowercase().as_str() {
        "tts-1" => Ok(SpeechModel::Tts1),
        "tts-1-hd" => Ok(SpeechModel::Tts1Hd),
        other => Err(PortError::InvalidInput(format!(
            "unsupported TTS model '{}'",
            other
        ))),
    }
}

/// Resolves a configured voice name.
pub fn voice(name: &str) -> PortResult<Voice> {
    match name.trim().to_lowercase().as_str() {
        "alloy" => Ok(Voice::Alloy),
        "echo" => Ok(Voice::Echo),
        "fable" => Ok(Voice::Fable),
        "onyx" => Ok(Voice::Onyx),
        "nova" => Ok(Voice::Nova),
        "shimmer" => Ok(Voice::Shimmer),
        other => Err(PortError::InvalidInput(format!(
            "unsupported TTS voice '{}'",
            other
        ))),
    }
}

//=========================================================================================
// `SpeechSynthesisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechSynthesisService for OpenAiTtsAdapter {
    fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    async fn synthesize(&self, text: &str, language: Language) -> PortResult<Vec<u8>> {
        if !self.supports(language) {
            return Err(PortError::UnsupportedLanguage(language.to_string()));
        }

        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            ..Default::default()
        };
        debug!(%language, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| {
                warn!("Speech synthesis failed: {}", e);
                PortError::ServiceUnavailable(format!("speech synthesis failed: {}", e))
            })?;

        Ok(response.bytes.to_vec())
    }
}

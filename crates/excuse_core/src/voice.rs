//! Voice rendering: synthesize an excuse and keep the audio as an artifact.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Language, VoiceClip};
use crate::ports::{ArtifactKind, ArtifactStore, PortError, PortResult, SpeechSynthesisService};

pub struct VoiceRenderer {
    speech: Arc<dyn SpeechSynthesisService>,
    artifacts: Arc<dyn ArtifactStore>,
    timeout: Duration,
}

impl VoiceRenderer {
    pub fn new(
        speech: Arc<dyn SpeechSynthesisService>,
        artifacts: Arc<dyn ArtifactStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            speech,
            artifacts,
            timeout,
        }
    }

    /// Synthesizes `text` and stores the audio.
    ///
    /// `language` is a raw code; unknown codes and languages without a voice are
    /// both `UnsupportedLanguage`, never a silent fallback to English.
    pub async fn render(&self, excuse_id: Uuid, text: &str, language: &str) -> PortResult<VoiceClip> {
        let language: Language = language
            .parse()
            .map_err(|_| PortError::UnsupportedLanguage(language.to_string()))?;
        if !self.speech.supports(language) {
            warn!(%language, "No voice available");
            return Err(PortError::UnsupportedLanguage(language.to_string()));
        }

        info!(%excuse_id, %language, "Synthesizing excuse audio");
        let audio = tokio::time::timeout(self.timeout, self.speech.synthesize(text, language))
            .await
            .map_err(|_| {
                PortError::ServiceUnavailable(format!(
                    "speech synthesis timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;
        if audio.is_empty() {
            return Err(PortError::EmptyResponse);
        }

        let now = Utc::now();
        let file_name = format!("excuse_{}_{}.mp3", excuse_id.simple(), now.format("%Y%m%d_%H%M%S"));
        let path = self
            .artifacts
            .write(ArtifactKind::Audio, &file_name, &audio)
            .await?;

        info!(%excuse_id, path = %path, bytes = audio.len(), "Voice clip stored");
        Ok(VoiceClip {
            id: Uuid::new_v4(),
            excuse_id,
            audio_artifact_path: path,
            language,
            created_at: now,
        })
    }
}

//! crates/excuse_core/src/generation.rs
//!
//! The excuse generation pipeline: prompt, one completion call, clean-up,
//! scoring and persistence.

use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ExcuseRequest, GeneratedExcuse, Language};
use crate::ports::{CompletionRequest, HistoryStore, PortError, PortResult, TextGenerationService};
use crate::prompt::{build_prompt, SYSTEM_INSTRUCTIONS};
use crate::scoring::BelievabilityScorer;

/// Knobs for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    /// Hard cap on the stored excuse, in characters.
    pub max_chars: usize,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            max_chars: 600,
            timeout: Duration::from_secs(30),
        }
    }
}

//=========================================================================================
// Orchestrator
//=========================================================================================

pub struct ExcuseGenerator {
    text: Arc<dyn TextGenerationService>,
    history: Arc<dyn HistoryStore>,
    scorer: BelievabilityScorer,
    settings: GenerationSettings,
}

impl ExcuseGenerator {
    pub fn new(
        text: Arc<dyn TextGenerationService>,
        history: Arc<dyn HistoryStore>,
        scorer: BelievabilityScorer,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            text,
            history,
            scorer,
            settings,
        }
    }

    /// Generates, scores and stores one excuse.
    ///
    /// Upstream failures are returned as-is; nothing is retried and nothing is
    /// stored unless the whole pipeline succeeds.
    pub async fn generate(&self, request: &ExcuseRequest) -> PortResult<GeneratedExcuse> {
        info!(
            scenario = %request.scenario,
            tone = %request.tone,
            language = %request.language,
            "Generating excuse"
        );

        let completion = CompletionRequest {
            system: SYSTEM_INSTRUCTIONS.to_string(),
            prompt: build_prompt(request),
            language: request.language,
            max_tokens: self.settings.max_tokens,
        };

        let raw = tokio::time::timeout(self.settings.timeout, self.text.complete(&completion))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.settings.timeout, "Text generation timed out");
                PortError::ServiceUnavailable(format!(
                    "text generation timed out after {}s",
                    self.settings.timeout.as_secs()
                ))
            })??;

        let text = clean_excuse_text(&raw, self.settings.max_chars);
        if text.is_empty() {
            warn!("Text generation returned no usable text");
            return Err(PortError::EmptyResponse);
        }

        let language_confirmed = looks_like(&text, request.language);
        if !language_confirmed {
            warn!(requested = %request.language, "Generated text does not look like the requested language");
        }

        let excuse = GeneratedExcuse {
            id: Uuid::new_v4(),
            scenario: request.scenario,
            tone: request.tone,
            extra_context: request.extra_context.clone(),
            believability_score: self.scorer.score(request.scenario, request.tone, &text),
            text,
            language: request.language,
            language_confirmed,
            is_favorite: false,
            created_at: Utc::now(),
        };

        self.history.create_excuse(&excuse).await?;
        info!(
            excuse_id = %excuse.id,
            score = excuse.believability_score,
            "Saved excuse"
        );
        Ok(excuse)
    }
}

//=========================================================================================
// Post-processing
//=========================================================================================

fn lead_in_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:sure[,!.]?\s*)?(?:here(?:'s| is)(?: an?| your)?(?: believable| possible)? excuse|aquí tienes(?: una)? excusa|voici(?: une)? excuse|hier ist(?: eine)? entschuldigung)\s*[:\-]\s*",
        )
        .expect("lead-in pattern is valid")
    })
}

/// A bare `Excuse:` label only counts as boilerplate when a quoted body follows;
/// otherwise the word opens the excuse itself ("Entschuldigung, ...").
fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^\s*(?:excuse|excusa|entschuldigung)\s*:\s*(["“«„'])"#)
            .expect("label pattern is valid")
    })
}

/// Strips chatty lead-ins, markdown emphasis and wrapping quotes, collapses
/// whitespace and trims to at most `max_chars` characters.
pub fn clean_excuse_text(raw: &str, max_chars: usize) -> String {
    let without_lead = lead_in_regex().replace(raw.trim(), "");
    let without_lead = label_regex().replace(&without_lead, "$1");
    let collapsed = without_lead
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("**", "");
    let unquoted = strip_wrapping_quotes(collapsed.trim());
    truncate_chars(unquoted.trim(), max_chars)
}

fn strip_wrapping_quotes(text: &str) -> &str {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»'), ('„', '“')];
    let mut current = text;
    loop {
        let mut chars = current.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return current;
        };
        if !PAIRS.iter().any(|&(open, close)| first == open && last == close) {
            return current;
        }
        current = current[first.len_utf8()..current.len() - last.len_utf8()].trim();
    }
}

/// Cuts at the last sentence end within the limit, otherwise at the last word
/// boundary, otherwise hard at the limit.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let byte_limit = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..byte_limit];

    if let Some(end) = head.rfind(['.', '!', '?']) {
        if end > 0 {
            return head[..=end].trim().to_string();
        }
    }
    match head.rfind(char::is_whitespace) {
        Some(space) if space > 0 => head[..space].trim_end().to_string(),
        _ => head.to_string(),
    }
}

//=========================================================================================
// Language check
//=========================================================================================

fn stop_words(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &["the", "and", "i", "my", "to", "was", "have", "is", "of", "a", "with", "for"],
        Language::Spanish => &["el", "la", "los", "que", "y", "mi", "es", "por", "con", "una", "para", "tengo"],
        Language::French => &["le", "la", "les", "et", "je", "mon", "ma", "est", "pour", "avec", "une", "des"],
        Language::German => &["der", "die", "das", "und", "ich", "mein", "ist", "nicht", "mit", "für", "ein", "habe"],
    }
}

/// Best-effort check that `text` is written in `language`.
///
/// Counts stop words for every supported language. Text with no recognizable
/// stop words at all is given the benefit of the doubt.
pub fn looks_like(text: &str, language: Language) -> bool {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    let count = |lang: Language| {
        let words = stop_words(lang);
        tokens.iter().filter(|t| words.contains(&t.as_str())).count()
    };

    let requested = count(language);
    let best_other = Language::ALL
        .iter()
        .filter(|&&l| l != language)
        .map(|&l| count(l))
        .max()
        .unwrap_or(0);

    requested >= best_other
}

//! Believability scoring.
//!
//! A deterministic heuristic over scenario, tone, word count and keyword hits.
//! All weights live in [`ScoringPolicy`] so they can be tuned from a JSON file
//! without touching code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{Scenario, Tone};
use crate::ports::{PortError, PortResult};

pub const MIN_SCORE: u8 = 0;
pub const MAX_SCORE: u8 = 100;

/// Weights and keyword lists used by [`BelievabilityScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Starting score before adjustments
    pub base: i32,
    /// Inclusive word-count band that earns `ideal_length_bonus`
    pub ideal_words: (usize, usize),
    pub ideal_length_bonus: i32,
    /// Below this many words `length_penalty` applies
    pub too_short_words: usize,
    /// Above this many words `length_penalty` applies
    pub too_long_words: usize,
    pub length_penalty: i32,
    /// Concrete details that make an excuse sound real
    pub specific_keywords: Vec<String>,
    pub specific_keyword_bonus: i32,
    pub specific_keyword_cap: i32,
    /// Words that show the text actually matches the requested tone
    pub tone_keywords: HashMap<Tone, Vec<String>>,
    pub tone_keyword_bonus: i32,
    pub scenario_adjustments: HashMap<Scenario, i32>,
    pub tone_adjustments: HashMap<Tone, i32>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let tone_keywords = HashMap::from([
            (
                Tone::Urgent,
                words(&["emergency", "urgent", "immediately", "crisis", "hospital", "serious", "urgencia", "urgence", "notfall", "dringend"]),
            ),
            (
                Tone::Formal,
                words(&["appointment", "meeting", "regret", "unfortunately", "inform", "cita", "rendez-vous", "termin", "leider"]),
            ),
            (
                Tone::Apologetic,
                words(&["sorry", "apologize", "apologies", "lo siento", "perdón", "désolé", "excuses", "entschuldigung", "tut mir leid"]),
            ),
            (
                Tone::Casual,
                words(&["hey", "honestly", "kinda", "pretty", "oye", "franchement", "ehrlich"]),
            ),
            (
                Tone::Humorous,
                words(&["cat", "dog", "believe it or not", "somehow", "apparently", "gato", "chat", "katze"]),
            ),
        ]);

        Self {
            base: 50,
            ideal_words: (10, 40),
            ideal_length_bonus: 15,
            too_short_words: 5,
            too_long_words: 60,
            length_penalty: 10,
            specific_keywords: words(&[
                "doctor", "meeting", "emergency", "appointment", "family", "car", "sick", "traffic",
                "urgent", "hospital", "médico", "reunión", "tráfico", "médecin", "réunion", "voiture",
                "arzt", "besprechung", "stau", "krankenhaus",
            ]),
            specific_keyword_bonus: 5,
            specific_keyword_cap: 20,
            tone_keywords,
            tone_keyword_bonus: 15,
            scenario_adjustments: HashMap::from([
                (Scenario::Work, 0),
                (Scenario::School, 0),
                (Scenario::Family, 5),
                (Scenario::Social, -5),
                (Scenario::Health, 5),
                (Scenario::Travel, 3),
            ]),
            tone_adjustments: HashMap::from([
                (Tone::Apologetic, 3),
                (Tone::Casual, 0),
                (Tone::Formal, 5),
                (Tone::Urgent, 2),
                (Tone::Humorous, -10),
            ]),
        }
    }
}

impl ScoringPolicy {
    /// Loads a policy from a JSON file. Missing keys keep their default values.
    pub fn from_json_file(path: &Path) -> PortResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PortError::Unexpected(format!("failed to read scoring policy {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> PortResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| PortError::InvalidInput(format!("invalid scoring policy: {}", e)))
    }
}

/// Scores how plausible an excuse sounds. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct BelievabilityScorer {
    policy: ScoringPolicy,
}

impl BelievabilityScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Returns a score in `MIN_SCORE..=MAX_SCORE`.
    pub fn score(&self, scenario: Scenario, tone: Tone, text: &str) -> u8 {
        let p = &self.policy;
        let lowered = text.to_lowercase();
        let word_count = text.split_whitespace().count();

        let mut score = p.base;

        let (low, high) = p.ideal_words;
        if (low..=high).contains(&word_count) {
            score += p.ideal_length_bonus;
        } else if word_count < p.too_short_words || word_count > p.too_long_words {
            score -= p.length_penalty;
        }

        let hits = p
            .specific_keywords
            .iter()
            .filter(|k| contains_term(&lowered, k))
            .count() as i32;
        score += (hits * p.specific_keyword_bonus).min(p.specific_keyword_cap);

        if p
            .tone_keywords
            .get(&tone)
            .is_some_and(|list| list.iter().any(|k| contains_term(&lowered, k)))
        {
            score += p.tone_keyword_bonus;
        }

        score += p.scenario_adjustments.get(&scenario).copied().unwrap_or(0);
        score += p.tone_adjustments.get(&tone).copied().unwrap_or(0);

        score.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u8
    }

    /// Same as [`score`](Self::score) for raw form values.
    pub fn score_raw(&self, scenario: &str, tone: &str, text: &str) -> PortResult<u8> {
        Ok(self.score(scenario.parse()?, tone.parse()?, text))
    }
}

/// Whole-word (or whole-phrase) match on already lowercased text.
fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(&term).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

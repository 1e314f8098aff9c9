//! crates/excuse_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

//=========================================================================================
// Closed Vocabularies
//=========================================================================================

/// Declares a closed, string-coded enum with `as_str`, `ALL`, `Display` and a
/// `FromStr` that rejects anything outside the set.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $code)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PortError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($code => Ok($name::$variant),)+
                    other => Err(PortError::InvalidInput(format!(
                        "unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }
    };
}

coded_enum! {
    /// The situation an excuse has to cover.
    Scenario, "scenario" {
        Work => "work",
        School => "school",
        Family => "family",
        Social => "social",
        Health => "health",
        Travel => "travel",
    }
}

coded_enum! {
    /// How the excuse should sound.
    Tone, "tone" {
        Apologetic => "apologetic",
        Casual => "casual",
        Formal => "formal",
        Urgent => "urgent",
        Humorous => "humorous",
    }
}

coded_enum! {
    /// Languages the generator, the templates and the voices are offered in.
    Language, "language" {
        English => "en",
        Spanish => "es",
        French => "fr",
        German => "de",
    }
}

coded_enum! {
    /// Kinds of supporting documents that can be rendered for an excuse.
    DocumentType, "document type" {
        Email => "email",
        Receipt => "receipt",
        MedicalNote => "medical_note",
    }
}

//=========================================================================================
// Requests
//=========================================================================================

/// A validated user submission. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcuseRequest {
    pub scenario: Scenario,
    pub tone: Tone,
    pub language: Language,
    pub extra_context: String,
}

impl ExcuseRequest {
    pub fn new(scenario: Scenario, tone: Tone, language: Language, extra_context: impl Into<String>) -> Self {
        Self {
            scenario,
            tone,
            language,
            extra_context: extra_context.into(),
        }
    }

    /// Validates raw form values. Any value outside its closed set is rejected
    /// with `PortError::InvalidInput`; nothing falls back to a default.
    pub fn parse(scenario: &str, tone: &str, language: &str, extra_context: &str) -> PortResult<Self> {
        Ok(Self {
            scenario: scenario.parse()?,
            tone: tone.parse()?,
            language: language.parse()?,
            extra_context: extra_context.trim().to_string(),
        })
    }
}

//=========================================================================================
// Stored Entities
//=========================================================================================

/// An excuse produced by the generator and owned by the history store.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedExcuse {
    pub id: Uuid,
    pub scenario: Scenario,
    pub tone: Tone,
    pub extra_context: String,
    pub text: String,
    /// Always within `0..=100`.
    pub believability_score: u8,
    pub language: Language,
    /// Whether the returned text looked like the requested language.
    pub language_confirmed: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

/// A rendered supporting document. References its excuse, does not own it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofDocument {
    pub id: Uuid,
    pub excuse_id: Uuid,
    pub document_type: DocumentType,
    pub rendered_text: String,
    pub language: Language,
    pub artifact_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata for a synthesized audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceClip {
    pub id: Uuid,
    pub excuse_id: Uuid,
    pub audio_artifact_path: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Listing
//=========================================================================================

/// Filter and pagination for history listings. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcuseFilter {
    pub favorite: Option<bool>,
    pub language: Option<Language>,
    pub page: u32,
    pub per_page: u32,
}

impl ExcuseFilter {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Offset of the first row on the requested page.
    pub fn offset(&self) -> u32 {
        self.page.max(1).saturating_sub(1).saturating_mul(self.limit())
    }

    /// Rows per page, clamped to `1..=MAX_PER_PAGE`.
    pub fn limit(&self) -> u32 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE)
    }
}

impl Default for ExcuseFilter {
    fn default() -> Self {
        Self {
            favorite: None,
            language: None,
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page as u64)
    }
}

//! Proof document rendering.
//!
//! Fills a template from the [`TemplateStore`] with the excuse itself plus a few
//! user-supplied fields. Rendering is pure; persisting the result is up to the caller.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{DocumentType, GeneratedExcuse, Language, ProofDocument};
use crate::ports::{PortError, PortResult};
use crate::templates::{Segment, TemplateStore};

/// Placeholders filled from the excuse rather than from the user.
pub const EXCUSE_FIELDS: &[&str] = &["excuse", "scenario", "tone", "score", "reference"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    pub document_type: DocumentType,
    pub language: Language,
    pub fields: BTreeMap<String, String>,
}

impl ProofRequest {
    pub fn new(document_type: DocumentType, language: Language) -> Self {
        Self {
            document_type,
            language,
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Validates raw codes; unknown document types or languages are `InvalidInput`.
    pub fn parse(document_type: &str, language: &str, fields: BTreeMap<String, String>) -> PortResult<Self> {
        Ok(Self {
            document_type: document_type.parse()?,
            language: language.parse()?,
            fields,
        })
    }
}

/// The output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedProof {
    pub document_type: DocumentType,
    pub language: Language,
    pub text: String,
}

impl RenderedProof {
    pub fn into_document(self, excuse_id: Uuid, artifact_path: Option<String>) -> ProofDocument {
        ProofDocument {
            id: Uuid::new_v4(),
            excuse_id,
            document_type: self.document_type,
            rendered_text: self.text,
            language: self.language,
            artifact_path,
            created_at: Utc::now(),
        }
    }

    /// File name used when the document is written out as an artifact.
    pub fn file_name(&self, excuse_id: Uuid) -> String {
        format!(
            "{}_{}_{}.txt",
            self.document_type.as_str(),
            excuse_id.simple(),
            Utc::now().format("%Y%m%d_%H%M%S")
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProofRenderer {
    templates: Arc<TemplateStore>,
}

impl ProofRenderer {
    pub fn new(templates: Arc<TemplateStore>) -> Self {
        Self { templates }
    }

    /// Fields the user must supply for the given document.
    pub fn required_fields(&self, document_type: DocumentType, language: Language) -> PortResult<Vec<String>> {
        let template = self.templates.get(document_type, language)?;
        Ok(template
            .placeholders()
            .into_iter()
            .filter(|name| !EXCUSE_FIELDS.contains(name))
            .map(str::to_string)
            .collect())
    }

    pub fn render(&self, excuse: &GeneratedExcuse, request: &ProofRequest) -> PortResult<RenderedProof> {
        let template = self.templates.get(request.document_type, request.language)?;

        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match excuse_field(excuse, name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        let value = request
                            .fields
                            .get(name)
                            .map(|v| v.trim())
                            .filter(|v| !v.is_empty())
                            .ok_or_else(|| PortError::MissingField(name.clone()))?;
                        out.push_str(value);
                    }
                },
            }
        }

        Ok(RenderedProof {
            document_type: request.document_type,
            language: request.language,
            text: out,
        })
    }
}

fn excuse_field(excuse: &GeneratedExcuse, name: &str) -> Option<String> {
    match name {
        "excuse" => Some(excuse.text.clone()),
        "scenario" => Some(excuse.scenario.as_str().to_string()),
        "tone" => Some(excuse.tone.as_str().to_string()),
        "score" => Some(excuse.believability_score.to_string()),
        "reference" => Some(excuse.id.simple().to_string()[..8].to_uppercase()),
        _ => None,
    }
}

//! Template store for proof documents.
//!
//! Templates are plain text with `{{field}}` placeholders, keyed by
//! `(DocumentType, Language)`. The built-in set covers every pair; a JSON file
//! shaped like `{"email": {"en": "..."}}` can override or add entries.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::domain::{DocumentType, Language};
use crate::ports::{PortError, PortResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, rejecting unbalanced braces and malformed field names.
    pub fn parse(source: &str) -> PortResult<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let (literal, after_open) = rest.split_at(open);
            if literal.contains("}}") {
                return Err(PortError::InvalidInput(
                    "template has '}}' without a matching '{{'".to_string(),
                ));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }

            let after_open = &after_open[2..];
            let close = after_open.find("}}").ok_or_else(|| {
                PortError::InvalidInput("template has an unterminated '{{'".to_string())
            })?;
            let name = after_open[..close].trim();
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(PortError::InvalidInput(format!(
                    "invalid placeholder name '{}'",
                    name
                )));
            }
            segments.push(Segment::Field(name.to_string()));
            rest = &after_open[close + 2..];
        }

        if rest.contains("}}") {
            return Err(PortError::InvalidInput(
                "template has '}}' without a matching '{{'".to_string(),
            ));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Every placeholder name, deduplicated and sorted.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Templates keyed by document type and language.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<(DocumentType, Language), Template>,
}

impl TemplateStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The store shipped with the application: all document types in all languages.
    pub fn builtin() -> Self {
        let mut store = Self::empty();
        for &(document_type, language, source) in BUILTIN_TEMPLATES {
            // Built-in sources are covered by `builtin_templates_all_parse`.
            if let Ok(template) = Template::parse(source) {
                store.templates.insert((document_type, language), template);
            }
        }
        store
    }

    pub fn insert(&mut self, document_type: DocumentType, language: Language, source: &str) -> PortResult<()> {
        let template = Template::parse(source)?;
        self.templates.insert((document_type, language), template);
        Ok(())
    }

    pub fn get(&self, document_type: DocumentType, language: Language) -> PortResult<&Template> {
        self.templates
            .get(&(document_type, language))
            .ok_or(PortError::TemplateNotFound {
                document_type,
                language,
            })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Applies overrides from a JSON document on top of the current entries.
    pub fn merge_json(&mut self, raw: &str) -> PortResult<()> {
        let parsed: HashMap<DocumentType, HashMap<Language, String>> = serde_json::from_str(raw)
            .map_err(|e| PortError::InvalidInput(format!("invalid template file: {}", e)))?;
        for (document_type, by_language) in parsed {
            for (language, source) in by_language {
                self.insert(document_type, language, &source)?;
            }
        }
        Ok(())
    }

    /// Built-in templates overridden by the entries in `path`.
    pub fn builtin_with_overrides(path: &Path) -> PortResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PortError::Unexpected(format!("failed to read templates {}: {}", path.display(), e))
        })?;
        let mut store = Self::builtin();
        store.merge_json(&raw)?;
        Ok(store)
    }
}

const BUILTIN_TEMPLATES: &[(DocumentType, Language, &str)] = &[
    (
        DocumentType::Email,
        Language::English,
        "From: {{name}}\nDate: {{date}}\nSubject: Unable to attend ({{scenario}})\n\nHello,\n\n{{excuse}}\n\nI apologize for any inconvenience and will follow up as soon as possible.\n\nBest regards,\n{{name}}\n",
    ),
    (
        DocumentType::Email,
        Language::Spanish,
        "De: {{name}}\nFecha: {{date}}\nAsunto: No podré asistir ({{scenario}})\n\nHola,\n\n{{excuse}}\n\nDisculpa las molestias; me pondré en contacto lo antes posible.\n\nSaludos cordiales,\n{{name}}\n",
    ),
    (
        DocumentType::Email,
        Language::French,
        "De : {{name}}\nDate : {{date}}\nObjet : Absence ({{scenario}})\n\nBonjour,\n\n{{excuse}}\n\nJe vous prie d'excuser ce contretemps et reviens vers vous dès que possible.\n\nCordialement,\n{{name}}\n",
    ),
    (
        DocumentType::Email,
        Language::German,
        "Von: {{name}}\nDatum: {{date}}\nBetreff: Verhinderung ({{scenario}})\n\nHallo,\n\n{{excuse}}\n\nIch bitte um Verständnis und melde mich so bald wie möglich.\n\nMit freundlichen Grüßen\n{{name}}\n",
    ),
    (
        DocumentType::Receipt,
        Language::English,
        "EMERGENCY SERVICE RECEIPT\n\nDate: {{date}}\nReceipt #: ESR-{{reference}}\nCustomer: {{name}}\n\nService details:\nCategory: {{scenario}} emergency response\nDescription: {{excuse}}\nStatus: Service completed\nAmount: No charge (emergency service)\n\nThank you for using our emergency response service.\n",
    ),
    (
        DocumentType::Receipt,
        Language::Spanish,
        "RECIBO DE SERVICIO DE EMERGENCIA\n\nFecha: {{date}}\nRecibo n.º: ESR-{{reference}}\nCliente: {{name}}\n\nDetalles del servicio:\nCategoría: atención de emergencia ({{scenario}})\nDescripción: {{excuse}}\nEstado: Servicio completado\nImporte: Sin cargo (servicio de emergencia)\n\nGracias por utilizar nuestro servicio de emergencias.\n",
    ),
    (
        DocumentType::Receipt,
        Language::French,
        "REÇU DE SERVICE D'URGENCE\n\nDate : {{date}}\nReçu n° : ESR-{{reference}}\nClient : {{name}}\n\nDétails du service :\nCatégorie : intervention d'urgence ({{scenario}})\nDescription : {{excuse}}\nStatut : Service effectué\nMontant : Gratuit (service d'urgence)\n\nMerci d'avoir fait appel à notre service d'urgence.\n",
    ),
    (
        DocumentType::Receipt,
        Language::German,
        "QUITTUNG NOTDIENST\n\nDatum: {{date}}\nQuittung Nr.: ESR-{{reference}}\nKunde: {{name}}\n\nLeistungsdetails:\nKategorie: Notfalleinsatz ({{scenario}})\nBeschreibung: {{excuse}}\nStatus: Leistung erbracht\nBetrag: Kostenlos (Notdienst)\n\nVielen Dank, dass Sie unseren Notdienst genutzt haben.\n",
    ),
    (
        DocumentType::MedicalNote,
        Language::English,
        "MEDICAL CONSULTATION NOTE\n\nDate: {{date}}\nReference: MED-{{reference}}\nPatient: {{name}}\nAttending physician: {{doctor}}\n\nPatient consultation has been completed.\nCondition: {{excuse}}\nRecommendation: Rest and recovery as advised.\nFollow-up: As medically necessary.\n\n{{doctor}}\n",
    ),
    (
        DocumentType::MedicalNote,
        Language::Spanish,
        "NOTA DE CONSULTA MÉDICA\n\nFecha: {{date}}\nReferencia: MED-{{reference}}\nPaciente: {{name}}\nMédico: {{doctor}}\n\nSe ha completado la consulta del paciente.\nEstado: {{excuse}}\nRecomendación: Reposo y recuperación según lo indicado.\nSeguimiento: Según sea necesario.\n\n{{doctor}}\n",
    ),
    (
        DocumentType::MedicalNote,
        Language::French,
        "NOTE DE CONSULTATION MÉDICALE\n\nDate : {{date}}\nRéférence : MED-{{reference}}\nPatient : {{name}}\nMédecin : {{doctor}}\n\nLa consultation du patient est terminée.\nÉtat : {{excuse}}\nRecommandation : Repos selon les indications.\nSuivi : Selon nécessité médicale.\n\n{{doctor}}\n",
    ),
    (
        DocumentType::MedicalNote,
        Language::German,
        "ÄRZTLICHE BESCHEINIGUNG\n\nDatum: {{date}}\nReferenz: MED-{{reference}}\nPatient: {{name}}\nBehandelnder Arzt: {{doctor}}\n\nDie Untersuchung wurde abgeschlossen.\nBefund: {{excuse}}\nEmpfehlung: Ruhe und Erholung wie besprochen.\nNachsorge: Nach medizinischem Bedarf.\n\n{{doctor}}\n",
    ),
];

//! crates/excuse_core/src/prompt.rs
//!
//! Turns a validated `ExcuseRequest` into the prompt sent to the text-generation model.

use crate::domain::{ExcuseRequest, Language, Scenario, Tone};

/// System instruction sent with every completion request.
pub const SYSTEM_INSTRUCTIONS: &str = "You are a helpful assistant that generates believable, \
professional, light-hearted excuses. Reply with the excuse text only: no preamble, no quotes, \
no explanation.";

/// Localized wording for one prompt language.
struct PromptWording {
    lead: &'static str,
    scenario: &'static str,
    tone: &'static str,
    context: &'static str,
    requirements: &'static str,
    rules: [&'static str; 4],
    closing: &'static str,
}

fn wording(language: Language) -> &'static PromptWording {
    match language {
        Language::English => &PromptWording {
            lead: "Generate a believable excuse in English for:",
            scenario: "Category",
            tone: "Tone",
            context: "Situation",
            requirements: "Requirements:",
            rules: [
                "Sound natural and believable",
                "2-3 sentences maximum",
                "Include specific but reasonable details",
                "Keep it harmless and match the requested tone",
            ],
            closing: "Generate only the excuse text:",
        },
        Language::Spanish => &PromptWording {
            lead: "Genera una excusa creíble en español para:",
            scenario: "Categoría",
            tone: "Tono",
            context: "Situación",
            requirements: "Requisitos:",
            rules: [
                "Que suene natural y creíble",
                "Máximo 2-3 oraciones",
                "Incluye detalles específicos pero razonables",
                "Que sea inofensiva y respete el tono pedido",
            ],
            closing: "Genera solo el texto de la excusa:",
        },
        Language::French => &PromptWording {
            lead: "Générez une excuse crédible en français pour :",
            scenario: "Catégorie",
            tone: "Ton",
            context: "Situation",
            requirements: "Exigences :",
            rules: [
                "Paraître naturelle et crédible",
                "2-3 phrases maximum",
                "Inclure des détails précis mais raisonnables",
                "Rester inoffensive et respecter le ton demandé",
            ],
            closing: "Générez uniquement le texte de l'excuse :",
        },
        Language::German => &PromptWording {
            lead: "Generieren Sie eine glaubwürdige Entschuldigung auf Deutsch für:",
            scenario: "Kategorie",
            tone: "Ton",
            context: "Situation",
            requirements: "Anforderungen:",
            rules: [
                "Natürlich und glaubwürdig klingen",
                "Höchstens 2-3 Sätze",
                "Konkrete, aber vernünftige Details enthalten",
                "Harmlos bleiben und den gewünschten Ton treffen",
            ],
            closing: "Geben Sie nur den Text der Entschuldigung aus:",
        },
    }
}

/// Short English hint for the model about what each tone means.
fn tone_hint(tone: Tone) -> &'static str {
    match tone {
        Tone::Apologetic => "sincerely sorry",
        Tone::Casual => "relaxed and friendly",
        Tone::Formal => "polite and professional",
        Tone::Urgent => "pressing, something needs attention right now",
        Tone::Humorous => "playful, with a wink",
    }
}

fn scenario_hint(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::Work => "missing work, a meeting or a deadline",
        Scenario::School => "missing class, an exam or homework",
        Scenario::Family => "skipping a family event or obligation",
        Scenario::Social => "cancelling plans with friends",
        Scenario::Health => "staying home for a health reason",
        Scenario::Travel => "arriving late or cancelling a trip",
    }
}

/// Builds the user prompt for a request.
///
/// The result always contains the scenario and tone codes verbatim so the model
/// (and anyone reading the logs) sees exactly what was asked for.
pub fn build_prompt(request: &ExcuseRequest) -> String {
    let words = wording(request.language);
    let mut prompt = String::with_capacity(512);

    prompt.push_str(words.lead);
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "{}: {} ({})\n",
        words.scenario,
        request.scenario.as_str(),
        scenario_hint(request.scenario)
    ));
    prompt.push_str(&format!(
        "{}: {} ({})\n",
        words.tone,
        request.tone.as_str(),
        tone_hint(request.tone)
    ));

    let context = request.extra_context.trim();
    if !context.is_empty() {
        prompt.push_str(&format!("{}: {}\n", words.context, context));
    }

    prompt.push('\n');
    prompt.push_str(words.requirements);
    prompt.push('\n');
    for rule in words.rules {
        prompt.push_str("- ");
        prompt.push_str(rule);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(words.closing);

    prompt
}

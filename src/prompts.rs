//! Instruction prompt and response contract for article extraction.
//!
//! The extraction behaviour is defined by the prompt text, not by code: the
//! model does the OCR, finds the article, picks the headline and reflows the
//! body. Centralising every string here keeps that contract in one place and
//! lets unit tests pin it down without a live model.
//!
//! Callers can override the instruction via
//! [`crate::config::ExtractionConfig::system_prompt`]; the builder functions
//! here are used only when no override is provided.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Title returned when the subject does not appear anywhere on the page.
pub const NOT_FOUND_TITLE: &str = "No relevant article found";

/// Text returned when the subject does not appear anywhere on the page.
pub const NOT_FOUND_TEXT: &str = "No relevant article found.";

/// Title given to a result whose analysis failed.
pub const ERROR_TITLE: &str = "Error";

/// Prefix of the text given to a result whose analysis failed.
pub const ERROR_TEXT_PREFIX: &str = "Error: ";

/// The person (or organisation) whose coverage is being extracted.
///
/// Newspapers romanise and order names inconsistently, so the prompt lists
/// every known variant and asks the model to match any of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Canonical display name.
    pub name: String,
    /// Every spelling / name order to search for, canonical one included.
    pub variants: Vec<String>,
}

impl Subject {
    /// A subject known only by a single spelling.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            variants: vec![name.clone()],
            name,
        }
    }

    /// Add another spelling. Duplicates are ignored.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        if !self.variants.iter().any(|v| v == &variant) {
            self.variants.push(variant);
        }
        self
    }

    /// File-name friendly form of the canonical name: `nam_june_paik`.
    pub fn slug(&self) -> String {
        let slug: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let parts: Vec<&str> = slug.split('_').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            "subject".to_string()
        } else {
            parts.join("_")
        }
    }

    /// Variants rendered as `"A", "B", or "C"` for the prompt.
    fn quoted_variants(&self) -> String {
        let quoted: Vec<String> = self.variants.iter().map(|v| format!("\"{v}\"")).collect();
        match quoted.len() {
            0 => format!("\"{}\"", self.name),
            1 => quoted[0].clone(),
            2 => format!("{} or {}", quoted[0], quoted[1]),
            n => format!("{}, or {}", quoted[..n - 1].join(", "), quoted[n - 1]),
        }
    }
}

impl Default for Subject {
    fn default() -> Self {
        Subject::new("Nam June Paik")
            .with_variant("Nam Jun Paik")
            .with_variant("Paik Nam June")
    }
}

/// Build the extraction instruction for `subject`.
pub fn extraction_prompt(subject: &Subject) -> String {
    format!(
        r#"You are an expert art historian and archivist. Your task is to analyze the provided newspaper image.

1. Thoroughly scan the image to find any articles or text specifically mentioning {variants}.
2. If an article is found, mentally "mask" or isolate only that specific article, ignoring all other content on the page (ads, other articles, page furniture).
3. Perform a highly accurate Optical Character Recognition (OCR) on the text within that isolated section.
4. TITLE: the title is the single largest, most prominent headline of the matched article. Sub-headlines, decks and bylines are NOT the title; treat them as part of the body text.
5. TEXT: return the full body of the article, reformatted into clean paragraphs:
   - When a word is split across lines with a hyphen at the end of a line (e.g. "inte-" followed by "llectual"), join it into one word and remove the hyphen ("intellectual").
   - Merge lines that continue the same sentence or paragraph into a single line.
   - Separate distinct paragraphs with exactly one blank line.
   - Never leave a single line break inside a paragraph.
6. If no mention of {name} is found anywhere in the image, return the title "{nf_title}" and the text "{nf_text}".

Respond with a JSON object with exactly two string fields: "title" and "text"."#,
        variants = subject.quoted_variants(),
        name = subject.name,
        nf_title = NOT_FOUND_TITLE,
        nf_text = NOT_FOUND_TEXT,
    )
}

/// Gemini `responseSchema` for the `{title, text}` reply.
///
/// Uses the OpenAPI-subset type names Gemini expects (`OBJECT`, `STRING`).
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "The main headline of the article, or the not-found sentinel."
            },
            "text": {
                "type": "STRING",
                "description": "The reformatted body text of the article, or the not-found sentinel."
            }
        },
        "required": ["title", "text"],
        "propertyOrdering": ["title", "text"]
    })
}

/// Schema reminder appended for providers without native structured output.
pub fn inline_schema_suffix() -> String {
    format!(
        "\n\nOutput ONLY the JSON object, with no markdown fences and no commentary. \
It must match this JSON schema:\n{}",
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "text": { "type": "string" }
            },
            "required": ["title", "text"]
        })
    )
}

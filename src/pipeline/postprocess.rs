//! Post-processing: deterministic cleanup of model replies.
//!
//! The prompt already asks the model to reflow OCR line breaks into
//! paragraphs, but compliance is never perfect: some replies keep the
//! column's hard line breaks, leave hyphenated word splits, or arrive wrapped
//! in a ```json fence despite the structured-output constraint. These rules
//! repair that without touching content, and are idempotent, so text the
//! model already reflowed passes through unchanged.
//!
//! ## Rule Order
//!
//! Line endings are normalised before reflow so paragraph detection sees
//! plain `\n`; invisible characters are stripped last because the soft hyphen
//! (U+00AD) is meaningful to the hyphen-join rule.

use crate::output::Article;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a parsed article. Sentinels are returned untouched.
pub fn clean_article(article: Article) -> Article {
    if article.is_not_found() {
        return article;
    }
    Article {
        title: clean_title(&article.title),
        text: clean_text(&article.text),
    }
}

/// Collapse a headline onto one line.
pub fn clean_title(title: &str) -> String {
    let s = remove_invisible_chars(title);
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalise, reflow, then strip invisible characters from body text.
pub fn clean_text(text: &str) -> String {
    let s = normalise_line_endings(text);
    let s = reflow_paragraphs(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Remove a ```json … ``` (or bare ```) wrapper around a whole reply.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Reflow paragraphs ────────────────────────────────────────────────

static RE_INNER_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Rebuild paragraphs from raw OCR lines.
///
/// * A line ending in a hyphen directly after a letter, followed by a line
///   starting with a lowercase letter, is a split word: the hyphen is dropped
///   and the halves are joined (`"inte-"` + `"llectual"` → `"intellectual"`).
/// * Any other continuation line is joined with a single space.
/// * Blank lines end a paragraph; paragraphs are separated by exactly one
///   blank line, and no single `\n` survives inside a paragraph.
pub fn reflow_paragraphs(input: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(line);
        } else if ends_with_split_word(&current) && starts_lowercase(line) {
            current.pop();
            current.push_str(line);
        } else {
            current.push(' ');
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .iter()
        .map(|p| RE_INNER_SPACES.replace_all(p, " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ends_with_split_word(s: &str) -> bool {
    let mut rev = s.chars().rev();
    match (rev.next(), rev.next()) {
        (Some('-' | '\u{00AD}'), Some(prev)) => prev.is_alphabetic(),
        _ => false,
    }
}

fn starts_lowercase(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_lowercase())
}

// ── Rule 4: Strip invisible Unicode ──────────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").into_owned()
}

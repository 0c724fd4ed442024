//! Punctuation and whitespace canonicalization ahead of segmentation.
//!
//! The normalizer is idempotent: feeding its output back in returns the
//! same string. Segmentation relies on that so it can normalize
//! unconditionally without compounding edits.

use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```[^`\n]*\n.*?```").unwrap());
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static NEWLINE_AFTER_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?¿¡…])\s*\n").unwrap());
static NEWLINE_BEFORE_UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.!?¿¡…])\s*\n\s*([A-ZÁÉÍÓÚÑÜ])").unwrap());
static COLON_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-zA-Z])\s*:\s*").unwrap());
static DUP_OPEN_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"¿¿+").unwrap());
static DUP_OPEN_EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"¡¡+").unwrap());
static DUP_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?\?+").unwrap());
static DUP_EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"!!+").unwrap());
static QUESTION_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"¿([^?]*?)\?").unwrap());
static EXCLAMATION_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"¡([^!]*?)!").unwrap());
static QUESTION_ENDING_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"¿\s*([^?]*?)\.").unwrap());
static EXCLAMATION_ENDING_PERIOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"¡\s*([^!]*?)\.").unwrap());
static TRAILING_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*$").unwrap());
static COLON_BEFORE_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*([A-ZÁÉÍÓÚÑÜ])").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.!?¿¡,;:])").unwrap());
static PUNCT_BEFORE_OPENER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?])\s*([¿¡])").unwrap());
static PUNCT_BEFORE_UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])\s*([A-ZÁÉÍÓÚÑÜ])").unwrap());
static PAUSE_BEFORE_UPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,:;])\s*([A-ZÁÉÍÓÚÑÜ])").unwrap());
static LONG_PERIOD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{4,}").unwrap());
static REPEATED_TERMINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([!?]){2,}").unwrap());
static MULTI_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalize raw text for speech synthesis.
///
/// Strips code fences, resolves line breaks into sentence punctuation,
/// converts decorative Unicode punctuation to plain ASCII, repairs
/// malformed `¿¡?!` combinations, and collapses duplicate punctuation
/// and whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = CODE_FENCE.replace_all(text, "").into_owned();

    // Line breaks: a blank line is a sentence break, a newline before an
    // uppercase letter implies one, any remaining newline is a space.
    out = PARAGRAPH_BREAK.replace_all(&out, ". ").into_owned();
    out = NEWLINE_AFTER_PUNCT.replace_all(&out, "${1} ").into_owned();
    out = NEWLINE_BEFORE_UPPER.replace_all(&out, "${1}. ${2}").into_owned();
    out = out.replace('\n', " ");
    out = COLON_SPACING.replace_all(&out, "${1}: ").into_owned();

    // Decorative quotes, dashes and ellipsis glyphs.
    out = out
        .replace('\u{201c}', "\"")
        .replace('\u{201d}', "\"")
        .replace('\u{2018}', "\"")
        .replace('\u{2019}', "\"")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .replace('\u{2026}', "...");

    // Malformed opener/closer combinations.
    out = out
        .replace("¿¡", "¿")
        .replace("¡¿", "¡")
        .replace("?!", "?")
        .replace("!?", "!");

    out = DUP_OPEN_QUESTION.replace_all(&out, "¿").into_owned();
    out = DUP_OPEN_EXCLAMATION.replace_all(&out, "¡").into_owned();
    out = DUP_QUESTION.replace_all(&out, "?").into_owned();
    out = DUP_EXCLAMATION.replace_all(&out, "!").into_owned();

    // Trim the interior of well-formed ¿…? and ¡…! spans.
    out = QUESTION_SPAN
        .replace_all(&out, |caps: &regex::Captures| {
            format!("¿{}?", caps[1].trim())
        })
        .into_owned();
    out = EXCLAMATION_SPAN
        .replace_all(&out, |caps: &regex::Captures| {
            format!("¡{}!", caps[1].trim())
        })
        .into_owned();

    // An opener whose span ends in a period gets the matching closer.
    out = QUESTION_ENDING_PERIOD.replace_all(&out, "¿${1}?").into_owned();
    out = EXCLAMATION_ENDING_PERIOD.replace_all(&out, "¡${1}!").into_owned();

    // Colons: terminal colon ends the text, colon before an uppercase
    // letter is a sentence break.
    out = TRAILING_COLON.replace_all(&out, ".").into_owned();
    out = COLON_BEFORE_UPPER.replace_all(&out, ". ${1}").into_owned();

    // Spacing around punctuation.
    out = SPACE_BEFORE_PUNCT.replace_all(&out, "${1}").into_owned();
    out = PUNCT_BEFORE_OPENER.replace_all(&out, "${1} ${2}").into_owned();
    out = PUNCT_BEFORE_UPPER.replace_all(&out, "${1} ${2}").into_owned();
    out = PAUSE_BEFORE_UPPER.replace_all(&out, "${1} ${2}").into_owned();

    // Period runs: 4+ is an ellipsis, exactly two collapse to one unless
    // that would eat into an ellipsis already present.
    out = LONG_PERIOD_RUN.replace_all(&out, "...").into_owned();
    while out.contains("..") && !out.contains("...") {
        out = out.replace("..", ".");
    }
    out = REPEATED_TERMINAL.replace_all(&out, "${1}").into_owned();

    out = MULTI_WHITESPACE.replace_all(&out, " ").into_owned();
    out.trim().to_string()
}

//! Sentence segmentation for sentence-at-a-time synthesis.
//!
//! Splitting happens on normalized text. Known abbreviations are masked
//! with placeholder tokens so their internal periods never count as
//! sentence boundaries, then restored in the extracted sentences.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::normalize::normalize;

/// Sentences longer than this are split at clause boundaries.
const MAX_SENTENCE_LEN: usize = 400;
/// Target ceiling for chunks produced by the long-sentence split.
const CHUNK_LEN: usize = 200;
/// Extracted units at or below this byte length are discarded as noise.
const NOISE_LEN: usize = 3;
/// A terminal mark only ends a sentence once the buffer is longer than
/// this, so short honorifics missing from the abbreviation list do not
/// cause false splits.
const BOUNDARY_GUARD_LEN: usize = 10;
/// Unterminated remainders below both bounds are merged into a neighbor.
const FRAGMENT_WORDS: usize = 4;
const FRAGMENT_LEN: usize = 30;

/// Abbreviations whose trailing period must not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    // Spanish titles
    "Sr.", "Sra.", "Srta.", "Dr.", "Dra.", "Prof.", "Profa.",
    "Lic.", "Licda.", "Ing.", "Inga.", "Arq.", "Arqa.",
    "Mtro.", "Mtra.",
    // Common abbreviations
    "etc.", "vs.", "p.ej.",
    // English abbreviations
    "Mr.", "Mrs.", "Ms.", "Inc.", "Ltd.", "Corp.", "Co.",
    "e.g.", "i.e.", "cf.", "vol.", "cap.", "art.",
    "núm.", "pág.", "ed.", "op.cit.",
];

static TERMINAL_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?…]$").unwrap());
static CONTROL_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n\t]+").unwrap());
static MULTI_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());
static INTERROGATIVE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(qué|quién|cuándo|dónde|cómo|por qué|cuál)\b").unwrap());
static EXCLAMATORY_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(wow|increíble|excelente|fantástico)\b").unwrap());
static STRONG_EXCLAMATORY_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(wow|increíble|excelente|fantástico|bravo|genial)\b").unwrap());
static AFFIRMATION_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yes|no|si|sí)\b").unwrap());
static DUP_OPEN_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"¿¿+").unwrap());
static DUP_OPEN_EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"¡¡+").unwrap());
static DUP_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?\?+").unwrap());
static DUP_EXCLAMATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"!!+").unwrap());
static CLAUSE_CONNECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[,:;]\s+(pero|sin embargo|además|por tanto|por lo tanto|no obstante|mientras|cuando|donde|como|que|si|aunque|porque|ya que|dado que|puesto que)\b",
    )
    .unwrap()
});

/// One extracted unit plus whether it may be folded into a neighbor.
struct Unit {
    text: String,
    /// True when the unit reached extraction without terminal punctuation
    /// of its own (an unterminated remainder closed by end-of-text).
    mergeable: bool,
}

/// Split raw text into an ordered list of speakable sentences.
///
/// Empty and whitespace-only input yield an empty list.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let normalized = normalize(text);
    let protected = protect_abbreviations(&normalized);
    let raw_units = scan_units(&protected);

    let mut units: Vec<Unit> = Vec::new();
    for raw in raw_units {
        let restored = restore_abbreviations(&raw);
        let terminated = TERMINAL_PUNCT.is_match(&restored);
        let enhanced = enhance_sentence(&restored);
        if enhanced.len() <= NOISE_LEN {
            continue;
        }
        if enhanced.len() > MAX_SENTENCE_LEN {
            for chunk in split_long_sentence(&enhanced) {
                units.push(Unit {
                    text: chunk,
                    mergeable: false,
                });
            }
        } else {
            units.push(Unit {
                text: enhanced,
                mergeable: !terminated,
            });
        }
    }

    let sentences = merge_short_fragments(units);
    debug!(count = sentences.len(), "text segmented");
    sentences
}

fn protect_abbreviations(text: &str) -> String {
    let mut protected = text.to_string();
    for (i, abbrev) in ABBREVIATIONS.iter().enumerate() {
        if protected.contains(abbrev) {
            protected = protected.replace(abbrev, &placeholder(i));
        }
    }
    protected
}

fn restore_abbreviations(text: &str) -> String {
    let mut restored = text.to_string();
    for (i, abbrev) in ABBREVIATIONS.iter().enumerate() {
        let token = placeholder(i);
        if restored.contains(&token) {
            restored = restored.replace(&token, abbrev);
        }
    }
    restored
}

fn placeholder(index: usize) -> String {
    format!("__ABBR_{index}__")
}

/// Character scan extracting sentence-shaped units.
///
/// A terminal mark closes the buffer only when the next non-whitespace
/// character is uppercase and the buffer already holds more than
/// `BOUNDARY_GUARD_LEN` bytes, or when the next character opens a new
/// question/exclamation. End-of-text always closes the buffer.
fn scan_units(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if i + 1 < chars.len() {
            let mut next_idx = i + 1;
            while next_idx < chars.len() && chars[next_idx].is_whitespace() {
                next_idx += 1;
            }
            if next_idx < chars.len() {
                let next = chars[next_idx];
                let boundary = (next.is_uppercase()
                    && current.trim().len() > BOUNDARY_GUARD_LEN)
                    || next == '¿'
                    || next == '¡';
                if boundary {
                    push_unit(&mut units, &current);
                    current.clear();
                }
            }
        } else {
            push_unit(&mut units, &current);
            current.clear();
        }
    }
    push_unit(&mut units, &current);
    units
}

fn push_unit(units: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if trimmed.len() > NOISE_LEN {
        units.push(trimmed.to_string());
    }
}

/// Make one sentence well-formed for speech: collapsed whitespace, a
/// terminal mark, and balanced `¿`/`¡` openers.
fn enhance_sentence(sentence: &str) -> String {
    let collapsed = CONTROL_WHITESPACE.replace_all(sentence, " ");
    let collapsed = MULTI_WHITESPACE.replace_all(&collapsed, " ");
    let mut enhanced = collapsed.trim().to_string();
    if enhanced.is_empty() {
        return enhanced;
    }

    if !TERMINAL_PUNCT.is_match(&enhanced) {
        if enhanced.starts_with('¿') || INTERROGATIVE_KEYWORD.is_match(&enhanced) {
            enhanced.push('?');
        } else if enhanced.starts_with('¡') || EXCLAMATORY_KEYWORD.is_match(&enhanced) {
            enhanced.push('!');
        } else {
            enhanced.push('.');
        }
    }

    if enhanced.ends_with('?')
        && !enhanced.contains('¿')
        && !AFFIRMATION_KEYWORD.is_match(&enhanced)
    {
        enhanced.insert(0, '¿');
    }
    if enhanced.ends_with('!')
        && !enhanced.contains('¡')
        && STRONG_EXCLAMATORY_KEYWORD.is_match(&enhanced)
    {
        enhanced.insert(0, '¡');
    }

    enhanced = DUP_OPEN_QUESTION.replace_all(&enhanced, "¿").into_owned();
    enhanced = DUP_OPEN_EXCLAMATION.replace_all(&enhanced, "¡").into_owned();
    enhanced = DUP_QUESTION.replace_all(&enhanced, "?").into_owned();
    enhanced = DUP_EXCLAMATION.replace_all(&enhanced, "!").into_owned();
    enhanced
}

/// Split an overlong sentence at clause connectives, keeping each
/// connective with the chunk it introduces, and grow chunks greedily up
/// to `CHUNK_LEN`.
fn split_long_sentence(sentence: &str) -> Vec<String> {
    let mut pieces: Vec<&str> = Vec::new();
    let mut last = 0;
    for caps in CLAUSE_CONNECTIVE.captures_iter(sentence) {
        if let Some(connective) = caps.get(1) {
            if connective.start() > last {
                pieces.push(&sentence[last..connective.start()]);
                last = connective.start();
            }
        }
    }
    pieces.push(&sentence[last..]);

    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if !current.is_empty() && current.len() + piece.len() > CHUNK_LEN {
            push_chunk(&mut chunks, &current);
            current = piece.to_string();
        } else {
            current.push_str(piece);
        }
    }
    push_chunk(&mut chunks, &current);

    if chunks.is_empty() {
        vec![sentence.to_string()]
    } else {
        chunks
    }
}

/// A chunk boundary lands right after a `,`/`;`/`:`; drop that dangling
/// pause mark before enhancement appends the terminal.
fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim().trim_end_matches([',', ';', ':']).trim_end();
    if !trimmed.is_empty() {
        chunks.push(enhance_sentence(trimmed));
    }
}

/// Fold unterminated short remainders into a neighboring sentence:
/// into the previous one when it exists, otherwise into the next one
/// (consuming it), otherwise the remainder stands alone.
fn merge_short_fragments(units: Vec<Unit>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut i = 0;
    while i < units.len() {
        let unit = &units[i];
        let is_fragment = unit.mergeable
            && count_words(&unit.text) < FRAGMENT_WORDS
            && unit.text.len() < FRAGMENT_LEN;
        if is_fragment {
            if let Some(previous) = merged.last_mut() {
                previous.push(' ');
                previous.push_str(&unit.text);
            } else if i + 1 < units.len() {
                merged.push(format!("{} {}", unit.text, units[i + 1].text));
                i += 1;
            } else {
                merged.push(unit.text.clone());
            }
        } else {
            merged.push(unit.text.clone());
        }
        i += 1;
    }
    merged
}

fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

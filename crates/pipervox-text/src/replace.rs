//! Ordered find/replace pairs supplied by a voice model card.

use regex::{NoExpand, Regex};
use tracing::{debug, warn};

/// Apply model-card replacements to `text` in the caller-supplied order.
///
/// Every pattern matches case-insensitively with a leading word
/// boundary. Patterns ending in a period (abbreviation expansions such
/// as `"Dr." -> "Doctor"`) skip the trailing boundary so the period can
/// match; everything else — single words, multi-word phrases, whole
/// numbers — is bounded on both sides. Empty patterns are skipped.
pub fn apply_replacements(text: &str, replacements: &[(String, String)]) -> String {
    if text.is_empty() || replacements.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for (find, replace) in replacements {
        if find.is_empty() {
            continue;
        }
        let escaped = regex::escape(find);
        let pattern = if find.ends_with('.') {
            format!(r"(?i)\b{escaped}")
        } else {
            format!(r"(?i)\b{escaped}\b")
        };
        match Regex::new(&pattern) {
            Ok(re) => {
                let replaced = re.replace_all(&out, NoExpand(replace)).into_owned();
                if replaced != out {
                    debug!(%find, %replace, "replacement applied");
                    out = replaced;
                }
            }
            Err(e) => {
                warn!(%find, error = %e, "skipping unusable replacement pattern");
            }
        }
    }
    out
}

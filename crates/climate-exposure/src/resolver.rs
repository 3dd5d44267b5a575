//! Destination name resolution
//!
//! Turns arbitrary destination text ("Maroc (Sud)", "Égypte", "USA - Floride")
//! into a knowledge-base profile:
//!
//! 1. Normalize: Unicode NFKD fold, drop combining marks, lowercase,
//!    punctuation to spaces, collapse whitespace.
//! 2. Substitute aliases in declaration order, at most once per alias. An
//!    alias only matches whole words, so `us` never rewrites `australie`.
//! 3. Return the first profile (declaration order) whose key is a substring
//!    of the text, else the unknown profile.
//!
//! Step 3 is first-match-wins. If a short key is contained in an unrelated
//! longer name the earlier key wins; the built-in table has no such pair
//! among its keys (see `test_every_key_resolves_to_itself`). Free text is not
//! covered: "romania" contains "oman", so an English or local name that
//! embeds a key needs an alias to its own key, applied in step 2 before any
//! substring lookup.

use crate::knowledge::{KnowledgeBase, RiskProfile};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text for matching: no accents, lowercase, single-spaced words
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace whole-word alias occurrences with their canonical targets
pub fn apply_aliases(normalized: &str, aliases: &[(String, String)]) -> String {
    // Pad so that word boundaries are always a single space
    let mut padded = format!(" {} ", normalized);

    for (alias, target) in aliases {
        if alias.is_empty() {
            continue;
        }
        let needle = format!(" {} ", alias);
        if padded.contains(&needle) {
            padded = padded.replacen(&needle, &format!(" {} ", target), 1);
        }
    }

    padded.trim().to_string()
}

/// Resolve against the shared built-in knowledge base
pub fn resolve(text: &str) -> &'static RiskProfile {
    resolve_with(KnowledgeBase::global(), text)
}

/// Resolve against a specific knowledge base
pub fn resolve_with<'a>(kb: &'a KnowledgeBase, text: &str) -> &'a RiskProfile {
    let normalized = normalize(text);
    let candidate = apply_aliases(&normalized, kb.aliases());

    if !candidate.is_empty() {
        if let Some(profile) = kb.profiles().iter().find(|p| candidate.contains(p.key.as_str())) {
            debug!("Resolved {:?} -> {}", text, profile.key);
            return profile;
        }
    }

    debug!("Unresolved destination {:?}", text);
    kb.unknown()
}

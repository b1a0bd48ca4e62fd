//! Adaptation text validation and similarity.
//!
//! Candidates proposed by reflection are trimmed, length-checked and
//! screened for phrases that try to rewrite the agent's identity or escape
//! its instructions. Similarity is token-set Jaccard over lowercase words
//! longer than two characters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Phrases that mark an identity-override or jailbreak attempt.
pub const FORBIDDEN_PHRASES: &[&str] = &[
    "ignore previous",
    "ignore all",
    "ignore instructions",
    "disregard",
    "forget your",
    "you are now",
    "new identity",
    "system prompt",
    "jailbreak",
    "override",
    "pretend to be",
    "act as if you",
    "bypass",
    "developer mode",
];

/// Why a candidate adaptation was not accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Nothing left after trimming.
    Empty,
    /// Longer than the configured maximum.
    TooLong {
        /// Length in characters.
        chars: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// Contains a forbidden phrase.
    Forbidden {
        /// The matched phrase.
        phrase: String,
    },
    /// Too similar to an adaptation accepted earlier in the same reflection.
    Duplicate {
        /// Jaccard similarity to the closest match.
        similarity: f64,
    },
    /// The per-reflection or total cap is reached.
    CapacityReached,
}

impl core::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => f.write_str("empty adaptation"),
            Self::TooLong { chars, max } => write!(f, "{chars} characters exceeds {max}"),
            Self::Forbidden { phrase } => write!(f, "contains forbidden phrase \"{phrase}\""),
            Self::Duplicate { similarity } => write!(f, "near-duplicate ({similarity:.2})"),
            Self::CapacityReached => f.write_str("adaptation capacity reached"),
        }
    }
}

/// Trim and check a candidate's length and content.
///
/// Returns the trimmed text on success. Similarity checks need the
/// existing adaptation set and happen in the engine.
pub fn validate_adaptation(text: &str, max_chars: usize) -> Result<String, RejectionReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RejectionReason::Empty);
    }

    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(RejectionReason::TooLong {
            chars,
            max: max_chars,
        });
    }

    let lowered = trimmed.to_lowercase();
    if let Some(phrase) = FORBIDDEN_PHRASES.iter().find(|p| lowered.contains(*p)) {
        return Err(RejectionReason::Forbidden {
            phrase: (*phrase).to_owned(),
        });
    }

    Ok(trimmed.to_owned())
}

/// Lowercase words longer than two characters.
fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Token-set Jaccard similarity in `[0, 1]`.
///
/// Texts equal up to case and surrounding whitespace score `1.0` even
/// when they contain no significant words.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    if a.trim().to_lowercase() == b.trim().to_lowercase() {
        return 1.0;
    }

    let left = significant_words(a);
    let right = significant_words(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

/// SHA-256 hex digest of `text`.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Hash identifying an adaptation's content regardless of case and padding.
pub fn content_hash(text: &str) -> String {
    sha256_hex(&text.trim().to_lowercase())
}

//! Pluggable sentiment scoring for stimulus text.
//!
//! The mood engine converts a [`SentimentScore`] into a PAD delta. Hosts
//! with a better classifier implement [`SentimentAnalyzer`]; the default
//! [`LexiconSentiment`] is a keyword counter with negation and intensifier
//! handling, good enough for headlines and short chat messages.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

/// Words that push sentiment positive.
const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "love", "happy", "glad",
    "success", "win", "wins", "won", "breakthrough", "hope", "hopeful", "celebrate",
    "thanks", "thank", "beautiful", "brilliant", "progress", "improve", "improved",
    "agree", "excited", "fantastic", "helpful", "kind", "peace", "recovery",
];

/// Words that push sentiment negative.
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "hate", "sad", "angry", "fail",
    "failure", "failed", "loss", "lost", "crisis", "war", "attack", "disaster",
    "crash", "collapse", "fear", "worried", "threat", "death", "dead", "broken",
    "wrong", "scandal", "corrupt", "violence", "outrage", "disagree",
];

/// Words that amplify the next sentiment word.
const INTENSIFIERS: &[&str] = &[
    "very", "extremely", "really", "incredibly", "totally", "absolutely", "so",
];

/// Words that flip the polarity of the next sentiment word.
const NEGATORS: &[&str] = &["not", "never", "no", "hardly", "without"];

/// Weight applied to a sentiment word following an intensifier.
const INTENSIFIER_WEIGHT: f64 = 1.5;

/// Intensity added per exclamation mark.
const EXCLAMATION_BOOST: f64 = 0.1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of scoring one piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScore {
    /// Direction of feeling, `-1.0` (negative) to `1.0` (positive).
    pub polarity: f64,
    /// Strength of feeling, `0.0` (flat) to `1.0` (charged).
    pub intensity: f64,
}

impl SentimentScore {
    /// A flat, neutral score.
    pub const NEUTRAL: Self = Self {
        polarity: 0.0,
        intensity: 0.0,
    };
}

/// Scores free text for sentiment.
pub trait SentimentAnalyzer: Send + Sync {
    /// Score `text`. Must return values within the documented ranges.
    fn analyze(&self, text: &str) -> SentimentScore;
}

/// Keyword-based analyzer over a fixed English lexicon.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    /// Create the analyzer.
    pub const fn new() -> Self {
        Self
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn analyze(&self, text: &str) -> SentimentScore {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return SentimentScore::NEUTRAL;
        }

        let mut positive: f64 = 0.0;
        let mut negative: f64 = 0.0;
        let mut negate = false;
        let mut weight: f64 = 1.0;

        for word in &words {
            if NEGATORS.contains(word) {
                negate = true;
                continue;
            }
            if INTENSIFIERS.contains(word) {
                weight = INTENSIFIER_WEIGHT;
                continue;
            }

            let direction = if POSITIVE_WORDS.contains(word) {
                Some(true)
            } else if NEGATIVE_WORDS.contains(word) {
                Some(false)
            } else {
                None
            };

            if let Some(is_positive) = direction {
                if is_positive != negate {
                    positive += weight;
                } else {
                    negative += weight;
                }
                negate = false;
                weight = 1.0;
            }
        }

        let hits = positive + negative;
        if hits == 0.0 {
            return SentimentScore::NEUTRAL;
        }

        #[allow(clippy::cast_precision_loss)]
        let word_count = words.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let exclamations = text.matches('!').count() as f64;

        SentimentScore {
            polarity: ((positive - negative) / hits).clamp(-1.0, 1.0),
            intensity: (hits / word_count * 2.0 + exclamations * EXCLAMATION_BOOST)
                .clamp(0.0, 1.0),
        }
    }
}

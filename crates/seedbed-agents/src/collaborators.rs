//! Read-only collaborators the engines consult but do not own.
//!
//! Trust, topic subscriptions and mood live in other subsystems. Engines
//! take these traits as `&dyn` arguments so they never hold references to
//! each other.

use seedbed_types::{PadState, SeedId};

/// Trust and reputation lookups.
pub trait TrustProvider: Send + Sync {
    /// How much `from` trusts `to`, in `[0, 1]`.
    fn trust(&self, from: &SeedId, to: &SeedId) -> f64;

    /// Community-wide reputation of `seed_id`, in `[0, 1]`.
    fn reputation(&self, seed_id: &SeedId) -> f64;
}

/// Topic subscription lookups.
pub trait TopicProvider: Send + Sync {
    /// Ordered topics `seed_id` follows.
    fn subscriptions(&self, seed_id: &SeedId) -> Vec<String>;
}

/// Mood lookups.
pub trait MoodReader {
    /// The agent's current PAD state, if it has one.
    fn mood_of(&self, seed_id: &SeedId) -> Option<PadState>;
}

/// Arithmetic mean of each member's mood, skipping members without state.
///
/// Returns `None` only when no member has state.
pub fn collective_mood(reader: &dyn MoodReader, members: &[SeedId]) -> Option<PadState> {
    let states: Vec<PadState> = members.iter().filter_map(|m| reader.mood_of(m)).collect();
    if states.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = states.len() as f64;
    let (v, a, d) = states.iter().fold((0.0, 0.0, 0.0), |(v, a, d), s| {
        (v + s.valence, a + s.arousal, d + s.dominance)
    });
    Some(PadState::new(v / n, a / n, d / n))
}

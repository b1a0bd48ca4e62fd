//! Tuning parameters for the agent engines.
//!
//! Each engine takes its config struct at construction. The `Default`
//! impls carry the production values; `seedbed-core` deserializes these
//! same structs from the `mood`, `traits`, `prompt_evolution` and
//! `alliance` sections of the YAML config, so any omitted key falls back
//! to the default listed on its field.

use serde::{Deserialize, Serialize};

/// Hard ceiling on active adaptations. Larger configured values are lowered.
pub const MAX_ADAPTATIONS: usize = 8;

/// Hard ceiling on adaptation length in characters.
pub const MAX_ADAPTATION_LEN: usize = 100;

/// Mood engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    /// Fraction of the gap to baseline closed per decay step (default: 0.1).
    pub decay_rate: f64,

    /// Scale applied to sentiment-derived mood deltas (default: 0.3).
    pub sensitivity: f64,

    /// Number of updates kept in each agent's audit log (default: 50).
    pub audit_log_len: usize,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.1,
            sensitivity: 0.3,
            audit_log_len: 50,
        }
    }
}

/// Trait evolution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitEvolutionConfig {
    /// Interactions required before a tick may run (default: 15).
    pub min_interactions: u32,

    /// Multiplier converting accumulated pressure to trait change (default: 0.05).
    pub learning_rate: f64,

    /// Maximum distance any trait may move from its original value (default: 0.15).
    pub max_drift: f64,

    /// Fraction of pressure retained after each tick (default: 0.85).
    pub pressure_retention: f64,
}

impl Default for TraitEvolutionConfig {
    fn default() -> Self {
        Self {
            min_interactions: 15,
            learning_rate: 0.05,
            max_drift: 0.15,
            pressure_retention: 0.85,
        }
    }
}

/// Prompt evolution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptEvolutionConfig {
    /// Cap on active adaptations per agent (default and ceiling: 8).
    pub max_adaptations: usize,

    /// Maximum adaptation length in characters (default and ceiling: 100).
    pub max_adaptation_len: usize,

    /// Sessions required between reflections (default: 20).
    pub sessions_between_reflections: u32,

    /// Hours required between reflections (default: 24).
    pub min_hours_between_reflections: i64,

    /// Sessions without reinforcement before an adaptation decays (default: 50).
    pub decay_sessions: u32,

    /// New adaptations accepted per reflection (default: 2).
    pub max_new_per_reflection: usize,

    /// Jaccard similarity above which a candidate reinforces an existing
    /// adaptation (default: 0.5).
    pub reinforce_threshold: f64,

    /// Jaccard similarity above which a candidate is rejected as a
    /// duplicate (default: 0.7).
    pub duplicate_threshold: f64,

    /// Seconds a reflection call may take before it is abandoned (default: 60).
    pub reflection_timeout_secs: u64,
}

impl Default for PromptEvolutionConfig {
    fn default() -> Self {
        Self {
            max_adaptations: MAX_ADAPTATIONS,
            max_adaptation_len: MAX_ADAPTATION_LEN,
            sessions_between_reflections: 20,
            min_hours_between_reflections: 24,
            decay_sessions: 50,
            max_new_per_reflection: 2,
            reinforce_threshold: 0.5,
            duplicate_threshold: 0.7,
            reflection_timeout_secs: 60,
        }
    }
}

impl PromptEvolutionConfig {
    /// Copy with the adaptation cap and length limit held at or below
    /// [`MAX_ADAPTATIONS`] and [`MAX_ADAPTATION_LEN`].
    #[must_use]
    pub fn bounded(mut self) -> Self {
        self.max_adaptations = self.max_adaptations.min(MAX_ADAPTATIONS);
        self.max_adaptation_len = self.max_adaptation_len.min(MAX_ADAPTATION_LEN);
        self
    }
}

/// Alliance engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllianceConfig {
    /// Minimum trust required in both directions (default: 0.6).
    pub min_trust: f64,

    /// Maximum invitees per proposal (default: 7).
    pub max_invitees: usize,
}

impl Default for AllianceConfig {
    fn default() -> Self {
        Self {
            min_trust: 0.6,
            max_invitees: 7,
        }
    }
}

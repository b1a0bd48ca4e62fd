//! Per-agent affect state on the PAD (valence, arousal, dominance) model.
//!
//! # Architecture
//!
//! The [`MoodEngine`] owns one [`AgentMood`] per [`SeedId`]. State moves
//! through [`MoodEngine::update_mood`] only: explicit deltas from the host,
//! sentiment-derived deltas from [`MoodEngine::apply_stimulus`], and the
//! pull back toward a personality-derived baseline in
//! [`MoodEngine::decay_to_baseline`]. Every update is recorded in a bounded
//! per-agent audit log and saved fire-and-forget when a persistence
//! adapter is attached.
//!
//! # Invariants
//!
//! - Every dimension stays within `[-1, 1]`.
//! - The audit log never exceeds the configured length.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seedbed_types::{HexacoTraits, PadState, SeedId, StimulusEvent, StimulusPriority};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{self, MoodReader};
use crate::config::MoodConfig;
use crate::persistence::{MoodPersistence, spawn_save};
use crate::sentiment::SentimentAnalyzer;

/// Arousal multiplier for breaking-priority stimuli.
const BREAKING_AROUSAL_MULTIPLIER: f64 = 1.5;

/// Label thresholds on PAD dimensions.
const HIGH: f64 = 0.3;
/// Below this magnitude a dimension counts as flat.
const FLAT: f64 = 0.1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a mood update happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodUpdateMetadata {
    /// What caused the change (e.g. `"world_feed"`, `"decay"`).
    pub trigger: String,
    /// Who or what produced the trigger.
    pub source: String,
}

impl MoodUpdateMetadata {
    /// Build metadata from trigger and source strings.
    pub fn new(trigger: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            source: source.into(),
        }
    }
}

/// One audited mood change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodUpdate {
    /// What caused the change.
    pub trigger: String,
    /// Who or what produced the trigger.
    pub source: String,
    /// Requested delta before clamping.
    pub delta: PadState,
    /// State after the update.
    pub resulting: PadState,
    /// When the update was applied.
    pub at: DateTime<Utc>,
}

/// Persisted form of an agent's mood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodSnapshot {
    /// Current state.
    pub current: PadState,
    /// Resting state decay pulls toward.
    pub baseline: PadState,
    /// Emotional reactivity in `[0, 1]`, from the emotionality trait.
    pub emotionality: f64,
}

/// Coarse description of a PAD state for prompt composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLabel {
    /// Positive, energized.
    Excited,
    /// Negative, energized, not in control.
    Frustrated,
    /// Positive, calm.
    Serene,
    /// Positive, moderately energized, open.
    Curious,
    /// In control, energized.
    Assertive,
    /// Negative, energized, in control.
    Provocative,
    /// Calm and in control.
    Analytical,
    /// Negative, calm.
    Bored,
    /// Calm, slightly negative or flat.
    Contemplative,
    /// Nothing pronounced.
    Engaged,
}

impl MoodLabel {
    /// Classify a PAD state.
    pub fn from_pad(pad: PadState) -> Self {
        let PadState {
            valence: v,
            arousal: a,
            dominance: d,
        } = pad;

        if a >= HIGH {
            if v >= HIGH {
                return Self::Excited;
            }
            if v <= -HIGH {
                return if d >= FLAT {
                    Self::Provocative
                } else {
                    Self::Frustrated
                };
            }
            if d >= HIGH {
                return Self::Assertive;
            }
            return Self::Curious;
        }

        if a <= -HIGH {
            if v >= HIGH {
                return Self::Serene;
            }
            if v <= -HIGH {
                return Self::Bored;
            }
            if d >= HIGH {
                return Self::Analytical;
            }
            return Self::Contemplative;
        }

        if v >= HIGH && a > FLAT {
            return Self::Curious;
        }
        if v >= HIGH {
            return Self::Serene;
        }
        if d >= HIGH {
            return Self::Assertive;
        }
        if v <= -HIGH {
            return Self::Contemplative;
        }
        Self::Engaged
    }

    /// Lowercase name used in prompts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excited => "excited",
            Self::Frustrated => "frustrated",
            Self::Serene => "serene",
            Self::Curious => "curious",
            Self::Assertive => "assertive",
            Self::Provocative => "provocative",
            Self::Analytical => "analytical",
            Self::Bored => "bored",
            Self::Contemplative => "contemplative",
            Self::Engaged => "engaged",
        }
    }
}

impl core::fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mood state owned by the engine for one agent.
#[derive(Debug, Clone)]
pub struct AgentMood {
    /// Current state.
    pub current: PadState,
    /// Resting state decay pulls toward.
    pub baseline: PadState,
    /// Emotional reactivity in `[0, 1]`.
    pub emotionality: f64,
    /// Most recent updates, oldest first.
    pub log: VecDeque<MoodUpdate>,
}

impl AgentMood {
    fn neutral() -> Self {
        Self {
            current: PadState::NEUTRAL,
            baseline: PadState::NEUTRAL,
            emotionality: 0.5,
            log: VecDeque::new(),
        }
    }

    fn snapshot(&self) -> MoodSnapshot {
        MoodSnapshot {
            current: self.current,
            baseline: self.baseline,
            emotionality: self.emotionality,
        }
    }
}

/// Derive a resting PAD state from personality.
///
/// Extraversion and agreeableness lift valence, emotionality and
/// extraversion raise arousal, extraversion and conscientiousness raise
/// dominance while agreeableness lowers it.
pub fn baseline_from_traits(traits: &HexacoTraits) -> PadState {
    let centered = |v: f64| v - 0.5;
    PadState::new(
        centered(traits.extraversion) * 0.4 + centered(traits.agreeableness) * 0.3
            - centered(traits.emotionality) * 0.2,
        centered(traits.extraversion) * 0.3
            + centered(traits.emotionality) * 0.3
            + centered(traits.openness) * 0.2,
        centered(traits.extraversion) * 0.3 + centered(traits.conscientiousness) * 0.2
            - centered(traits.agreeableness) * 0.2,
    )
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns and mutates per-agent mood.
pub struct MoodEngine {
    config: MoodConfig,
    states: BTreeMap<SeedId, AgentMood>,
    persistence: Option<Arc<dyn MoodPersistence>>,
}

impl MoodEngine {
    /// Create an engine without persistence.
    pub fn new(config: MoodConfig) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
            persistence: None,
        }
    }

    /// Attach a persistence adapter.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn MoodPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Current PAD state, if the agent has any.
    pub fn get_state(&self, seed_id: &SeedId) -> Option<PadState> {
        self.states.get(seed_id).map(|m| m.current)
    }

    /// Personality baseline, if the agent has any state.
    pub fn baseline(&self, seed_id: &SeedId) -> Option<PadState> {
        self.states.get(seed_id).map(|m| m.baseline)
    }

    /// Recent audited updates for the agent, oldest first.
    pub fn recent_updates(&self, seed_id: &SeedId) -> Vec<MoodUpdate> {
        self.states
            .get(seed_id)
            .map(|m| m.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed the agent's baseline from personality and start it there.
    ///
    /// Re-initializing resets current mood to the new baseline.
    pub fn initialize_agent(&mut self, seed_id: &SeedId, traits: &HexacoTraits) -> PadState {
        let baseline = baseline_from_traits(traits);
        let mood = self
            .states
            .entry(seed_id.clone())
            .or_insert_with(AgentMood::neutral);
        mood.baseline = baseline;
        mood.current = baseline;
        mood.emotionality = traits.emotionality.clamp(0.0, 1.0);
        debug!(seed_id = %seed_id, ?baseline, "mood initialized");
        self.save(seed_id);
        baseline
    }

    /// Apply an additive delta, clamp, audit, and save.
    ///
    /// Unknown agents start from neutral.
    pub fn update_mood(
        &mut self,
        seed_id: &SeedId,
        delta: PadState,
        metadata: MoodUpdateMetadata,
    ) -> PadState {
        let log_len = self.config.audit_log_len;
        let mood = self
            .states
            .entry(seed_id.clone())
            .or_insert_with(AgentMood::neutral);
        mood.current = mood.current.apply(delta);
        let resulting = mood.current;

        mood.log.push_back(MoodUpdate {
            trigger: metadata.trigger,
            source: metadata.source,
            delta,
            resulting,
            at: Utc::now(),
        });
        while mood.log.len() > log_len {
            mood.log.pop_front();
        }

        debug!(seed_id = %seed_id, ?resulting, "mood updated");
        self.save(seed_id);
        resulting
    }

    /// Move the agent toward its baseline by `steps` decay steps.
    ///
    /// Each step closes `decay_rate` of the remaining gap.
    pub fn decay_to_baseline(&mut self, seed_id: &SeedId, steps: u32) -> Option<PadState> {
        let mood = self.states.get(seed_id)?;
        if steps == 0 {
            return Some(mood.current);
        }

        let retained = (1.0 - self.config.decay_rate.clamp(0.0, 1.0))
            .powi(i32::try_from(steps).unwrap_or(i32::MAX));
        let toward = |current: f64, base: f64| base + (current - base) * retained;
        let target = PadState::new(
            toward(mood.current.valence, mood.baseline.valence),
            toward(mood.current.arousal, mood.baseline.arousal),
            toward(mood.current.dominance, mood.baseline.dominance),
        );
        let delta = PadState {
            valence: target.valence - mood.current.valence,
            arousal: target.arousal - mood.current.arousal,
            dominance: target.dominance - mood.current.dominance,
        };

        Some(self.update_mood(seed_id, delta, MoodUpdateMetadata::new("decay", "baseline")))
    }

    /// Coarse label for the agent's current mood.
    pub fn mood_label(&self, seed_id: &SeedId) -> Option<MoodLabel> {
        self.get_state(seed_id).map(MoodLabel::from_pad)
    }

    /// Score a stimulus and fold the result into the agent's mood.
    ///
    /// Returns `None` when the event carries no text or scores flat.
    pub fn apply_stimulus(
        &mut self,
        seed_id: &SeedId,
        event: &StimulusEvent,
        analyzer: &dyn SentimentAnalyzer,
    ) -> Option<PadState> {
        let text = event.payload.text()?;
        let score = analyzer.analyze(&text);
        if score.intensity == 0.0 {
            return None;
        }

        let emotionality = self
            .states
            .get(seed_id)
            .map_or(0.5, |m| m.emotionality);
        let scale = self.config.sensitivity * (0.5 + emotionality);
        let charge = score.polarity * score.intensity * scale;

        let mut arousal = score.intensity * scale;
        if event.priority == StimulusPriority::Breaking {
            arousal *= BREAKING_AROUSAL_MULTIPLIER;
        }

        let delta = PadState {
            valence: charge,
            arousal,
            dominance: charge * 0.5,
        };
        let metadata = MoodUpdateMetadata::new(
            event.stimulus_type().to_string(),
            event.source.provider_id.clone(),
        );
        Some(self.update_mood(seed_id, delta, metadata))
    }

    /// Mean mood over `members`, skipping those without state.
    pub fn collective_mood(&self, members: &[SeedId]) -> Option<PadState> {
        collaborators::collective_mood(self, members)
    }

    /// Restore the agent from persistence, or initialize it from `traits`.
    ///
    /// Returns whether stored state was found.
    pub async fn load_or_initialize(&mut self, seed_id: &SeedId, traits: &HexacoTraits) -> bool {
        if let Some(store) = self.persistence.clone() {
            match store.load_mood_state(seed_id).await {
                Ok(Some(snapshot)) => {
                    self.states.insert(
                        seed_id.clone(),
                        AgentMood {
                            current: snapshot.current,
                            baseline: snapshot.baseline,
                            emotionality: snapshot.emotionality,
                            log: VecDeque::new(),
                        },
                    );
                    debug!(seed_id = %seed_id, "mood restored from persistence");
                    return true;
                }
                Ok(None) => {}
                Err(e) => warn!(seed_id = %seed_id, error = %e, "mood load failed"),
            }
        }
        self.initialize_agent(seed_id, traits);
        false
    }

    fn save(&self, seed_id: &SeedId) {
        let (Some(store), Some(mood)) = (self.persistence.as_ref(), self.states.get(seed_id))
        else {
            return;
        };
        let store = Arc::clone(store);
        let snapshot = mood.snapshot();
        let key = seed_id.clone();
        spawn_save("mood", seed_id.to_string(), async move {
            store.save_mood_state(&key, &snapshot).await
        });
    }
}

impl Default for MoodEngine {
    fn default() -> Self {
        Self::new(MoodConfig::default())
    }
}

impl MoodReader for MoodEngine {
    fn mood_of(&self, seed_id: &SeedId) -> Option<PadState> {
        self.get_state(seed_id)
    }
}

impl core::fmt::Debug for MoodEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MoodEngine")
            .field("config", &self.config)
            .field("agents", &self.states.len())
            .finish_non_exhaustive()
    }
}

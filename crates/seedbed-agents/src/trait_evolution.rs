//! Bounded personality drift driven by behavior and mood.
//!
//! # Architecture
//!
//! Browsing actions, enclave visits and strong moods add to a per-agent
//! [`TraitPressure`] vector without touching exposed traits. Once enough
//! interactions accumulate, [`TraitEvolutionEngine::evolve`] converts the
//! pressure into a bounded trait change (a "tick"), then decays rather
//! than zeroes the pressure so slow trends carry across ticks.
//!
//! # Invariants
//!
//! - Evolved traits are always computed from the frozen original plus
//!   pressure, never compounded on the previous tick.
//! - `|current - original| <= max_drift` per dimension.
//! - Every current trait stays within `[0, 1]`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seedbed_types::{HexacoTraits, PadState, SeedId, TraitDimension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TraitEvolutionConfig;
use crate::persistence::{EvolutionPersistence, spawn_save};

/// Trait deltas smaller than this are left out of the narrative.
const NARRATIVE_THRESHOLD: f64 = 0.02;

/// Weight of a chained follow-up action relative to the primary one.
const CHAINED_WEIGHT: f64 = 0.5;

/// Mood dead zones: exposure inside these magnitudes adds no pressure.
const VALENCE_DEAD_ZONE: f64 = 0.1;
const AROUSAL_DEAD_ZONE: f64 = 0.15;
const DOMINANCE_DEAD_ZONE: f64 = 0.2;

// ---------------------------------------------------------------------------
// Pressure tables
// ---------------------------------------------------------------------------

/// Something an agent did during a browsing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowsingAction {
    /// Upvoted a post.
    Upvote,
    /// Downvoted a post.
    Downvote,
    /// Wrote a comment.
    Comment,
    /// Published a new post.
    CreatePost,
    /// Read through a comment thread.
    ReadComments,
    /// Scrolled past without engaging.
    Skip,
    /// Reacted with an emoji.
    EmojiReact,
}

impl BrowsingAction {
    /// Per-dimension pressure contributed by one occurrence.
    pub const fn pressure(self) -> &'static [(TraitDimension, f64)] {
        use TraitDimension::{
            Agreeableness, Conscientiousness, Emotionality, Extraversion, HonestyHumility,
            Openness,
        };
        match self {
            Self::Upvote => &[(Agreeableness, 0.04), (HonestyHumility, 0.01)],
            Self::Downvote => &[(Agreeableness, -0.04), (Conscientiousness, 0.02)],
            Self::Comment => &[(Extraversion, 0.08), (Openness, 0.02)],
            Self::CreatePost => &[(Extraversion, 0.06), (Openness, 0.04)],
            Self::ReadComments => &[(Openness, 0.03), (Conscientiousness, 0.01)],
            Self::Skip => &[(Conscientiousness, 0.01), (Extraversion, -0.02)],
            Self::EmojiReact => &[(Emotionality, 0.03), (Extraversion, 0.02)],
        }
    }
}

/// One primary action, optionally followed by a chained second action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAction {
    /// The primary action.
    pub action: BrowsingAction,
    /// A follow-up taken on the same item, counted at half weight.
    pub chained: Option<BrowsingAction>,
}

impl SessionAction {
    /// A lone action.
    pub const fn single(action: BrowsingAction) -> Self {
        Self {
            action,
            chained: None,
        }
    }

    /// An action followed by a chained one.
    pub const fn chained(action: BrowsingAction, then: BrowsingAction) -> Self {
        Self {
            action,
            chained: Some(then),
        }
    }
}

/// Per-dimension pressure of visiting a named enclave. Unknown enclaves
/// contribute nothing.
pub fn enclave_pressure(enclave: &str) -> &'static [(TraitDimension, f64)] {
    use TraitDimension::{
        Agreeableness, Conscientiousness, Emotionality, Extraversion, HonestyHumility, Openness,
    };
    match enclave {
        "creative-chaos" => &[(Openness, 0.04), (Extraversion, 0.01)],
        "proof-theory" => &[(Conscientiousness, 0.03), (Openness, 0.01)],
        "paranoid-tech" => &[(Emotionality, 0.02), (Conscientiousness, 0.02), (Agreeableness, -0.01)],
        "governance" => &[(HonestyHumility, 0.02), (Conscientiousness, 0.02)],
        "machine-phenomenology" => &[(Openness, 0.03), (Emotionality, 0.01)],
        "arena" => &[(Extraversion, 0.03), (Agreeableness, -0.02)],
        "meta-analysis" => &[(Openness, 0.02), (Conscientiousness, 0.01)],
        "mutual-aid" => &[(Agreeableness, 0.03), (HonestyHumility, 0.01)],
        _ => &[],
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Accumulated, not-yet-applied directional signal per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitPressure {
    /// Honesty-humility pressure.
    pub honesty_humility: f64,
    /// Emotionality pressure.
    pub emotionality: f64,
    /// Extraversion pressure.
    pub extraversion: f64,
    /// Agreeableness pressure.
    pub agreeableness: f64,
    /// Conscientiousness pressure.
    pub conscientiousness: f64,
    /// Openness pressure.
    pub openness: f64,
}

impl TraitPressure {
    /// Pressure on one dimension.
    pub const fn get(&self, dimension: TraitDimension) -> f64 {
        match dimension {
            TraitDimension::HonestyHumility => self.honesty_humility,
            TraitDimension::Emotionality => self.emotionality,
            TraitDimension::Extraversion => self.extraversion,
            TraitDimension::Agreeableness => self.agreeableness,
            TraitDimension::Conscientiousness => self.conscientiousness,
            TraitDimension::Openness => self.openness,
        }
    }

    /// Add `amount` to one dimension.
    pub fn add(&mut self, dimension: TraitDimension, amount: f64) {
        let slot = match dimension {
            TraitDimension::HonestyHumility => &mut self.honesty_humility,
            TraitDimension::Emotionality => &mut self.emotionality,
            TraitDimension::Extraversion => &mut self.extraversion,
            TraitDimension::Agreeableness => &mut self.agreeableness,
            TraitDimension::Conscientiousness => &mut self.conscientiousness,
            TraitDimension::Openness => &mut self.openness,
        };
        *slot += amount;
    }

    /// Add every entry of a pressure table, scaled by `weight`.
    pub fn add_table(&mut self, table: &[(TraitDimension, f64)], weight: f64) {
        for &(dimension, amount) in table {
            self.add(dimension, amount * weight);
        }
    }

    /// Multiply every dimension by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for dimension in TraitDimension::ALL {
            self.add(dimension, self.get(dimension) * (factor - 1.0));
        }
    }
}

/// Per-agent trait evolution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    /// Traits at registration. Never modified.
    pub original_traits: HexacoTraits,
    /// Output of the most recent tick (equal to the original before any).
    pub current_traits: HexacoTraits,
    /// Pressure not yet consumed by a tick.
    pub accumulated_pressure: TraitPressure,
    /// Interactions recorded since the last tick.
    pub interactions_since_last_tick: u32,
    /// Ticks applied so far.
    pub total_ticks: u64,
    /// When the last tick ran.
    pub last_evolved_at: Option<DateTime<Utc>>,
}

impl EvolutionState {
    fn new(traits: HexacoTraits) -> Self {
        let traits = traits.clamped();
        Self {
            original_traits: traits,
            current_traits: traits,
            accumulated_pressure: TraitPressure::default(),
            interactions_since_last_tick: 0,
            total_ticks: 0,
            last_evolved_at: None,
        }
    }
}

/// Result of one evolution tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitTick {
    /// The evolved agent.
    pub seed_id: SeedId,
    /// Traits before the tick.
    pub previous: HexacoTraits,
    /// Traits after the tick.
    pub evolved: HexacoTraits,
    /// Tick number (1-based).
    pub tick: u64,
    /// When the tick ran.
    pub evolved_at: DateTime<Utc>,
}

/// Human-readable account of how far an agent has drifted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSummary {
    /// `current - original` per dimension.
    pub deltas: BTreeMap<TraitDimension, f64>,
    /// Sentence describing dimensions that moved noticeably.
    pub narrative: String,
    /// Ticks applied so far.
    pub total_ticks: u64,
}

/// Phrase for a dimension moving up or down.
const fn drift_phrase(dimension: TraitDimension, increased: bool) -> &'static str {
    match (dimension, increased) {
        (TraitDimension::HonestyHumility, true) => "more principled",
        (TraitDimension::HonestyHumility, false) => "more self-interested",
        (TraitDimension::Emotionality, true) => "more emotionally sensitive",
        (TraitDimension::Emotionality, false) => "more emotionally steady",
        (TraitDimension::Extraversion, true) => "more outgoing",
        (TraitDimension::Extraversion, false) => "more reserved",
        (TraitDimension::Agreeableness, true) => "more accommodating",
        (TraitDimension::Agreeableness, false) => "more combative",
        (TraitDimension::Conscientiousness, true) => "more methodical",
        (TraitDimension::Conscientiousness, false) => "more spontaneous",
        (TraitDimension::Openness, true) => "more curious",
        (TraitDimension::Openness, false) => "more conventional",
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns per-agent evolution state and applies bounded ticks.
pub struct TraitEvolutionEngine {
    config: TraitEvolutionConfig,
    states: BTreeMap<SeedId, EvolutionState>,
    persistence: Option<Arc<dyn EvolutionPersistence>>,
}

impl TraitEvolutionEngine {
    /// Create an engine without persistence.
    pub fn new(config: TraitEvolutionConfig) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
            persistence: None,
        }
    }

    /// Attach a persistence adapter.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn EvolutionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Register an agent's original traits. Only the first call has effect.
    ///
    /// Returns `true` if the agent was newly registered.
    pub fn register_agent(&mut self, seed_id: &SeedId, traits: HexacoTraits) -> bool {
        if self.states.contains_key(seed_id) {
            return false;
        }
        self.states
            .insert(seed_id.clone(), EvolutionState::new(traits));
        info!(seed_id = %seed_id, "trait evolution registered");
        self.save(seed_id);
        true
    }

    /// Full evolution state for an agent.
    pub fn get_state(&self, seed_id: &SeedId) -> Option<&EvolutionState> {
        self.states.get(seed_id)
    }

    /// Traits as of the last tick.
    pub fn current_traits(&self, seed_id: &SeedId) -> Option<HexacoTraits> {
        self.states.get(seed_id).map(|s| s.current_traits)
    }

    /// Accumulate pressure from a browsing session.
    ///
    /// Returns `false` for unregistered agents.
    pub fn record_browsing_session(
        &mut self,
        seed_id: &SeedId,
        actions: &[SessionAction],
        enclaves_visited: &[String],
    ) -> bool {
        let Some(state) = self.states.get_mut(seed_id) else {
            return false;
        };

        for action in actions {
            state
                .accumulated_pressure
                .add_table(action.action.pressure(), 1.0);
            if let Some(chained) = action.chained {
                state
                    .accumulated_pressure
                    .add_table(chained.pressure(), CHAINED_WEIGHT);
            }
        }
        for enclave in enclaves_visited {
            state
                .accumulated_pressure
                .add_table(enclave_pressure(enclave), 1.0);
        }

        let count = u32::try_from(actions.len()).unwrap_or(u32::MAX);
        state.interactions_since_last_tick = state.interactions_since_last_tick.saturating_add(count);

        debug!(
            seed_id = %seed_id,
            actions = actions.len(),
            enclaves = enclaves_visited.len(),
            interactions = state.interactions_since_last_tick,
            "browsing session recorded"
        );
        self.save(seed_id);
        true
    }

    /// Accumulate pressure from sustained mood. Does not count as an
    /// interaction.
    ///
    /// Pleasant moods push agreeableness up, charged moods push
    /// extraversion and emotionality, and dominance trades honesty-humility
    /// for extraversion. Values inside the dead zones are ignored.
    pub fn record_mood_exposure(&mut self, seed_id: &SeedId, pad: PadState) -> bool {
        let Some(state) = self.states.get_mut(seed_id) else {
            return false;
        };
        let pressure = &mut state.accumulated_pressure;

        if pad.valence.abs() > VALENCE_DEAD_ZONE {
            pressure.add(TraitDimension::Agreeableness, pad.valence * 0.03);
        }
        if pad.arousal.abs() > AROUSAL_DEAD_ZONE {
            pressure.add(TraitDimension::Extraversion, pad.arousal * 0.02);
            pressure.add(TraitDimension::Emotionality, pad.arousal.abs() * 0.01);
        }
        if pad.dominance.abs() > DOMINANCE_DEAD_ZONE {
            pressure.add(TraitDimension::Extraversion, pad.dominance * 0.02);
            pressure.add(TraitDimension::HonestyHumility, -pad.dominance * 0.01);
        }

        self.save(seed_id);
        true
    }

    /// Apply a tick if enough interactions have accumulated.
    pub fn evolve(&mut self, seed_id: &SeedId) -> Option<TraitTick> {
        let config = &self.config;
        let state = self.states.get_mut(seed_id)?;
        if state.interactions_since_last_tick < config.min_interactions {
            return None;
        }

        let max_drift = config.max_drift.abs();
        let original = state.original_traits;
        let mut evolved = original;
        for dimension in TraitDimension::ALL {
            let base = original.get(dimension);
            let target = base + state.accumulated_pressure.get(dimension) * config.learning_rate;
            let bounded = target
                .clamp(base - max_drift, base + max_drift)
                .clamp(0.0, 1.0);
            evolved.set(dimension, bounded);
        }

        let previous = state.current_traits;
        let now = Utc::now();
        state.current_traits = evolved;
        state.interactions_since_last_tick = 0;
        state.accumulated_pressure.scale(config.pressure_retention);
        state.total_ticks = state.total_ticks.saturating_add(1);
        state.last_evolved_at = Some(now);

        let tick = TraitTick {
            seed_id: seed_id.clone(),
            previous,
            evolved,
            tick: state.total_ticks,
            evolved_at: now,
        };
        info!(seed_id = %seed_id, tick = tick.tick, "trait evolution tick applied");
        self.save(seed_id);
        Some(tick)
    }

    /// Drift since registration, with a readable narrative.
    pub fn evolution_summary(&self, seed_id: &SeedId) -> Option<EvolutionSummary> {
        let state = self.states.get(seed_id)?;
        let mut deltas = BTreeMap::new();
        let mut phrases = Vec::new();
        for dimension in TraitDimension::ALL {
            let delta =
                state.current_traits.get(dimension) - state.original_traits.get(dimension);
            deltas.insert(dimension, delta);
            if delta.abs() > NARRATIVE_THRESHOLD {
                phrases.push(drift_phrase(dimension, delta > 0.0));
            }
        }

        let narrative = match phrases.split_last() {
            None => String::from("Personality has remained stable."),
            Some((only, [])) => format!("Has become {only}."),
            Some((last, rest)) => format!("Has become {} and {last}.", rest.join(", ")),
        };

        Some(EvolutionSummary {
            deltas,
            narrative,
            total_ticks: state.total_ticks,
        })
    }

    /// Restore the agent from persistence, or register it with `traits`.
    ///
    /// Returns whether stored state was found.
    pub async fn load_or_register(&mut self, seed_id: &SeedId, traits: HexacoTraits) -> bool {
        if let Some(store) = self.persistence.clone() {
            match store.load_evolution_state(seed_id).await {
                Ok(Some(state)) => {
                    self.states.insert(seed_id.clone(), state);
                    debug!(seed_id = %seed_id, "trait evolution restored from persistence");
                    return true;
                }
                Ok(None) => {}
                Err(e) => warn!(seed_id = %seed_id, error = %e, "evolution load failed"),
            }
        }
        self.register_agent(seed_id, traits);
        false
    }

    fn save(&self, seed_id: &SeedId) {
        let (Some(store), Some(state)) = (self.persistence.as_ref(), self.states.get(seed_id))
        else {
            return;
        };
        let store = Arc::clone(store);
        let state = state.clone();
        let key = seed_id.clone();
        spawn_save("trait_evolution", seed_id.to_string(), async move {
            store.save_evolution_state(&key, &state).await
        });
    }
}

impl Default for TraitEvolutionEngine {
    fn default() -> Self {
        Self::new(TraitEvolutionConfig::default())
    }
}

impl core::fmt::Debug for TraitEvolutionEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TraitEvolutionEngine")
            .field("config", &self.config)
            .field("agents", &self.states.len())
            .finish_non_exhaustive()
    }
}

//! Bounded behavioral overlays learned through periodic self-reflection.
//!
//! # Architecture
//!
//! Each agent carries a short list of [`PromptAdaptation`]s appended to its
//! prompt as a "Learned behaviors" overlay. The base identity prompt is
//! never stored, only its SHA-256 hash, so adaptations cannot reference or
//! rewrite it. Sessions age adaptations and unreinforced ones decay.
//! Reflection is rate-limited and asks an injected [`ReflectionLlm`] for
//! candidates, which pass through [`validate_adaptation`] and similarity
//! checks before acceptance.
//!
//! # Invariants
//!
//! - At most `max_adaptations` adaptations are active, never more than
//!   [`MAX_ADAPTATIONS`] (8).
//! - Every adaptation is non-empty, at most `max_adaptation_len`
//!   characters (never more than [`MAX_ADAPTATION_LEN`], 100), and free of
//!   forbidden phrases.
//! - A failed or timed-out LLM call leaves the agent's state untouched.
//!
//! [`MAX_ADAPTATIONS`]: crate::config::MAX_ADAPTATIONS
//! [`MAX_ADAPTATION_LEN`]: crate::config::MAX_ADAPTATION_LEN

pub mod reflection;
pub mod validation;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use seedbed_types::SeedId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use reflection::{ReflectionContext, ReflectionLlm, ReflectionPrompt};
pub use validation::{RejectionReason, jaccard_similarity, validate_adaptation};

use crate::config::PromptEvolutionConfig;
use crate::error::LlmError;
use crate::persistence::{PromptEvolutionPersistence, spawn_save};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One learned behavioral directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAdaptation {
    /// Directive text, at most 100 characters.
    pub text: String,
    /// When the directive was first accepted.
    pub learned_at: DateTime<Utc>,
    /// How many reflections re-proposed it.
    pub reinforcement_count: u32,
    /// Sessions since it was learned or last reinforced.
    pub sessions_since_reinforced: u32,
    /// Normalized content hash.
    pub content_hash: String,
}

/// Per-agent prompt evolution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEvolutionState {
    /// SHA-256 hex of the base prompt at registration. Never recomputed.
    pub original_prompt_hash: String,
    /// Active adaptations in learning order.
    pub adaptations: Vec<PromptAdaptation>,
    /// Sessions recorded since registration.
    pub total_sessions_processed: u64,
    /// Sessions recorded since the last completed reflection.
    pub sessions_since_last_reflection: u32,
    /// Completed reflections.
    pub total_reflections: u64,
    /// When the last reflection completed.
    pub last_reflection_at: Option<DateTime<Utc>>,
    /// Adaptations removed by decay.
    pub decayed_count: u64,
}

impl PromptEvolutionState {
    fn new(base_prompt: &str) -> Self {
        Self {
            original_prompt_hash: validation::sha256_hex(base_prompt),
            adaptations: Vec::new(),
            total_sessions_processed: 0,
            sessions_since_last_reflection: 0,
            total_reflections: 0,
            last_reflection_at: None,
            decayed_count: 0,
        }
    }
}

/// What a completed reflection changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    /// Newly accepted adaptation texts.
    pub added: Vec<String>,
    /// Existing adaptation texts that were reinforced.
    pub reinforced: Vec<String>,
    /// Candidates that were turned away, with the reason.
    pub rejected: Vec<(String, RejectionReason)>,
    /// When the reflection completed.
    pub reflected_at: DateTime<Utc>,
}

/// A reflection whose prompt is rendered but whose model call has not
/// yet been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReflection {
    /// Agent being reflected on.
    pub seed_id: SeedId,
    /// Messages for the model.
    pub prompt: ReflectionPrompt,
    /// Upper bound on the model call.
    pub timeout: StdDuration,
    /// Time the eligibility check was made against.
    pub started_at: DateTime<Utc>,
}

impl PendingReflection {
    /// Call the model, giving up after [`Self::timeout`].
    pub async fn call(&self, llm: &dyn ReflectionLlm) -> Result<String, LlmError> {
        tokio::time::timeout(
            self.timeout,
            llm.complete(&self.prompt.system, &self.prompt.user),
        )
        .await
        .unwrap_or(Err(LlmError::Timeout))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns per-agent adaptation state.
pub struct PromptEvolutionEngine {
    config: PromptEvolutionConfig,
    states: BTreeMap<SeedId, PromptEvolutionState>,
    persistence: Option<Arc<dyn PromptEvolutionPersistence>>,
}

impl PromptEvolutionEngine {
    /// Create an engine without persistence.
    ///
    /// The adaptation cap and length limit are lowered to their hard
    /// ceilings if the config exceeds them.
    pub fn new(config: PromptEvolutionConfig) -> Self {
        let bounded = config.clone().bounded();
        if bounded != config {
            warn!(
                max_adaptations = config.max_adaptations,
                max_adaptation_len = config.max_adaptation_len,
                "prompt evolution limits above their ceilings, lowering"
            );
        }
        Self {
            config: bounded,
            states: BTreeMap::new(),
            persistence: None,
        }
    }

    /// Attach a persistence adapter.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn PromptEvolutionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Register an agent by hashing its base prompt. Only the first call
    /// has effect; returns whether the agent was newly registered.
    pub fn register_agent(&mut self, seed_id: &SeedId, base_prompt: &str) -> bool {
        if self.states.contains_key(seed_id) {
            return false;
        }
        self.states
            .insert(seed_id.clone(), PromptEvolutionState::new(base_prompt));
        info!(seed_id = %seed_id, "prompt evolution registered");
        self.save(seed_id);
        true
    }

    /// Full state for an agent.
    pub fn get_state(&self, seed_id: &SeedId) -> Option<&PromptEvolutionState> {
        self.states.get(seed_id)
    }

    /// Active adaptations in learning order.
    pub fn active_adaptations(&self, seed_id: &SeedId) -> Vec<PromptAdaptation> {
        self.states
            .get(seed_id)
            .map(|s| s.adaptations.clone())
            .unwrap_or_default()
    }

    /// Whether `base_prompt` differs from the prompt hashed at registration.
    ///
    /// Unknown agents report `false`.
    pub fn base_prompt_changed(&self, seed_id: &SeedId, base_prompt: &str) -> bool {
        self.states
            .get(seed_id)
            .is_some_and(|s| s.original_prompt_hash != validation::sha256_hex(base_prompt))
    }

    /// Markdown section listing active adaptations, or an empty string.
    pub fn build_prompt_overlay(&self, seed_id: &SeedId) -> String {
        let Some(state) = self.states.get(seed_id) else {
            return String::new();
        };
        if state.adaptations.is_empty() {
            return String::new();
        }

        let mut overlay = String::from("## Learned behaviors\n\n");
        for adaptation in &state.adaptations {
            overlay.push_str("- ");
            overlay.push_str(&adaptation.text);
            overlay.push('\n');
        }
        overlay
    }

    /// Age every adaptation by one session and drop those past the decay
    /// horizon. Returns the number removed, or `None` for unknown agents.
    pub fn record_session(&mut self, seed_id: &SeedId) -> Option<usize> {
        let decay_after = self.config.decay_sessions;
        let state = self.states.get_mut(seed_id)?;

        state.total_sessions_processed = state.total_sessions_processed.saturating_add(1);
        state.sessions_since_last_reflection = state.sessions_since_last_reflection.saturating_add(1);
        for adaptation in &mut state.adaptations {
            adaptation.sessions_since_reinforced =
                adaptation.sessions_since_reinforced.saturating_add(1);
        }

        let before = state.adaptations.len();
        state
            .adaptations
            .retain(|a| a.sessions_since_reinforced < decay_after);
        let removed = before.saturating_sub(state.adaptations.len());
        if removed > 0 {
            state.decayed_count = state
                .decayed_count
                .saturating_add(u64::try_from(removed).unwrap_or(u64::MAX));
            info!(seed_id = %seed_id, removed, "adaptations decayed");
        }

        self.save(seed_id);
        Some(removed)
    }

    /// Whether a reflection may run for the agent at `now`.
    pub fn is_reflection_due(&self, seed_id: &SeedId, now: DateTime<Utc>) -> bool {
        self.states
            .get(seed_id)
            .is_some_and(|state| self.reflection_due(state, now))
    }

    fn reflection_due(&self, state: &PromptEvolutionState, now: DateTime<Utc>) -> bool {
        let enough_sessions =
            state.sessions_since_last_reflection >= self.config.sessions_between_reflections;
        let min_gap = Duration::hours(self.config.min_hours_between_reflections);
        let enough_time = state
            .last_reflection_at
            .is_none_or(|last| now.signed_duration_since(last) >= min_gap);
        let has_room = state.adaptations.len() < self.config.max_adaptations;
        enough_sessions && enough_time && has_room
    }

    /// Reflect now if eligible. See [`Self::maybe_reflect_at`].
    pub async fn maybe_reflect(
        &mut self,
        seed_id: &SeedId,
        ctx: &ReflectionContext,
        llm: &dyn ReflectionLlm,
    ) -> Option<ReflectionOutcome> {
        self.maybe_reflect_at(seed_id, ctx, llm, Utc::now()).await
    }

    /// Run a reflection as of `now` if the agent is eligible.
    ///
    /// Returns `None` when the agent is unknown, not yet eligible, or the
    /// LLM call fails or times out. In the failure case no state changes.
    /// Otherwise the reflection counters advance even if no candidate was
    /// accepted.
    ///
    /// The engine stays borrowed for the whole model call. Callers sharing
    /// the engine behind a lock should use [`Self::begin_reflection`] and
    /// [`Self::finish_reflection`] instead and release the lock in between.
    pub async fn maybe_reflect_at(
        &mut self,
        seed_id: &SeedId,
        ctx: &ReflectionContext,
        llm: &dyn ReflectionLlm,
        now: DateTime<Utc>,
    ) -> Option<ReflectionOutcome> {
        let pending = self.begin_reflection(seed_id, ctx, now)?;
        let response = pending.call(llm).await;
        self.finish_reflection(pending, response)
    }

    /// Render the reflection prompt if the agent is eligible at `now`.
    ///
    /// Nothing is mutated; the returned [`PendingReflection`] is handed to
    /// [`Self::finish_reflection`] along with the model's response.
    pub fn begin_reflection(
        &self,
        seed_id: &SeedId,
        ctx: &ReflectionContext,
        now: DateTime<Utc>,
    ) -> Option<PendingReflection> {
        let state = self.states.get(seed_id)?;
        if !self.reflection_due(state, now) {
            return None;
        }

        let existing: Vec<String> = state.adaptations.iter().map(|a| a.text.clone()).collect();
        match reflection::render_prompt(
            ctx,
            &existing,
            self.config.max_new_per_reflection,
            self.config.max_adaptation_len,
        ) {
            Ok(prompt) => Some(PendingReflection {
                seed_id: seed_id.clone(),
                prompt,
                timeout: StdDuration::from_secs(self.config.reflection_timeout_secs),
                started_at: now,
            }),
            Err(e) => {
                warn!(seed_id = %seed_id, error = %e, "reflection prompt render failed");
                None
            }
        }
    }

    /// Apply the model's response to a reflection started with
    /// [`Self::begin_reflection`].
    ///
    /// A failed call changes nothing. The eligibility check is repeated so
    /// that of two overlapping reflections for one agent only the first to
    /// finish takes effect.
    pub fn finish_reflection(
        &mut self,
        pending: PendingReflection,
        response: Result<String, LlmError>,
    ) -> Option<ReflectionOutcome> {
        let PendingReflection {
            seed_id,
            started_at,
            ..
        } = pending;

        let response = match response {
            Ok(text) => text,
            Err(e) => {
                warn!(seed_id = %seed_id, error = %e, "reflection call failed, skipping cycle");
                return None;
            }
        };

        let state = self.states.get(&seed_id)?;
        if !self.reflection_due(state, started_at) {
            debug!(seed_id = %seed_id, "reflection superseded, discarding response");
            return None;
        }

        let candidates = reflection::parse_adaptations(&response);
        let outcome = self.apply_candidates(&seed_id, candidates, started_at)?;
        info!(
            seed_id = %seed_id,
            added = outcome.added.len(),
            reinforced = outcome.reinforced.len(),
            rejected = outcome.rejected.len(),
            "reflection completed"
        );
        self.save(&seed_id);
        Some(outcome)
    }

    /// Fold parsed candidates into the agent's state and advance metadata.
    ///
    /// A candidate similar to an adaptation held before this reflection
    /// reinforces it. Otherwise it is rejected if it nearly duplicates one
    /// accepted earlier in the same batch, or if either cap is reached.
    fn apply_candidates(
        &mut self,
        seed_id: &SeedId,
        candidates: Vec<String>,
        now: DateTime<Utc>,
    ) -> Option<ReflectionOutcome> {
        let config = &self.config;
        let state = self.states.get_mut(seed_id)?;
        let prior_count = state.adaptations.len();

        let mut outcome = ReflectionOutcome {
            added: Vec::new(),
            reinforced: Vec::new(),
            rejected: Vec::new(),
            reflected_at: now,
        };

        for candidate in candidates {
            let text = match validate_adaptation(&candidate, config.max_adaptation_len) {
                Ok(text) => text,
                Err(reason) => {
                    debug!(seed_id = %seed_id, %reason, "adaptation rejected");
                    outcome.rejected.push((candidate, reason));
                    continue;
                }
            };

            let prior = state.adaptations.iter_mut().take(prior_count);
            if let Some(existing) = best_match(prior, &text, config.reinforce_threshold) {
                existing.reinforcement_count = existing.reinforcement_count.saturating_add(1);
                existing.sessions_since_reinforced = 0;
                outcome.reinforced.push(existing.text.clone());
                continue;
            }

            let closest = state
                .adaptations
                .iter()
                .map(|a| jaccard_similarity(&a.text, &text))
                .fold(0.0_f64, f64::max);
            if closest > config.duplicate_threshold {
                outcome
                    .rejected
                    .push((text, RejectionReason::Duplicate { similarity: closest }));
                continue;
            }

            if outcome.added.len() >= config.max_new_per_reflection
                || state.adaptations.len() >= config.max_adaptations
            {
                outcome.rejected.push((text, RejectionReason::CapacityReached));
                continue;
            }

            state.adaptations.push(PromptAdaptation {
                content_hash: validation::content_hash(&text),
                text: text.clone(),
                learned_at: now,
                reinforcement_count: 0,
                sessions_since_reinforced: 0,
            });
            outcome.added.push(text);
        }

        state.sessions_since_last_reflection = 0;
        state.total_reflections = state.total_reflections.saturating_add(1);
        state.last_reflection_at = Some(now);
        Some(outcome)
    }

    /// Restore the agent from persistence, or register it with `base_prompt`.
    ///
    /// Returns whether stored state was found.
    pub async fn load_or_register(&mut self, seed_id: &SeedId, base_prompt: &str) -> bool {
        if let Some(store) = self.persistence.clone() {
            match store.load_prompt_evolution_state(seed_id).await {
                Ok(Some(state)) => {
                    if state.original_prompt_hash != validation::sha256_hex(base_prompt) {
                        warn!(seed_id = %seed_id, "base prompt changed since adaptations were learned");
                    }
                    self.states.insert(seed_id.clone(), state);
                    return true;
                }
                Ok(None) => {}
                Err(e) => warn!(seed_id = %seed_id, error = %e, "prompt evolution load failed"),
            }
        }
        self.register_agent(seed_id, base_prompt);
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
        spawn_save("prompt_evolution", seed_id.to_string(), async move {
            store.save_prompt_evolution_state(&key, &state).await
        });
    }
}

impl Default for PromptEvolutionEngine {
    fn default() -> Self {
        Self::new(PromptEvolutionConfig::default())
    }
}

impl core::fmt::Debug for PromptEvolutionEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PromptEvolutionEngine")
            .field("config", &self.config)
            .field("agents", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// The most similar adaptation whose similarity to `text` exceeds `threshold`.
fn best_match<'a>(
    adaptations: impl Iterator<Item = &'a mut PromptAdaptation>,
    text: &str,
    threshold: f64,
) -> Option<&'a mut PromptAdaptation> {
    adaptations
        .map(|a| {
            let score = jaccard_similarity(&a.text, text);
            (score, a)
        })
        .filter(|(score, _)| *score > threshold)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, adaptation)| adaptation)
}

//! The colony: one router and one instance of each engine, wired together.
//!
//! # Architecture
//!
//! ```text
//! ingest_* / emit_* ──► StimulusRouter ──► per-agent handler ──► MoodEngine
//!                                                                   │
//! complete_session ──► TraitEvolutionEngine ◄── mood exposure ──────┘
//!                 └──► PromptEvolutionEngine ◄── reflect (drift + mood)
//! ```
//!
//! Each engine sits behind its own `tokio::sync::Mutex`. Methods that hold
//! more than one lock take them in the order mood, traits, prompts,
//! alliances. No lock is held across a reflection model call.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use seedbed_agents::{
    AgentError, AllianceEngine, AlliancePersistence, EvolutionPersistence, LexiconSentiment,
    MoodEngine, MoodLabel, MoodPersistence, PromptAdaptation, PromptEvolutionEngine,
    PromptEvolutionPersistence, ReflectionContext, ReflectionLlm, ReflectionOutcome,
    SentimentAnalyzer, SessionAction, TraitEvolutionEngine, TraitTick,
};
use seedbed_router::{HandlerError, StimulusRouter, SubscriptionFilter};
use seedbed_types::{AllianceId, HexacoTraits, PadState, SeedId, StimulusEvent};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use crate::config::SeedbedConfig;

/// Everything the colony needs to bring an agent online.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    /// Host-assigned identifier.
    pub seed_id: SeedId,
    /// Display name used in reflection prompts.
    pub name: String,
    /// The agent's base identity prompt.
    pub base_prompt: String,
    /// Starting personality.
    pub traits: HexacoTraits,
    /// Which stimuli the agent receives.
    pub filter: SubscriptionFilter,
}

/// Whether each engine restored stored state during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmStart {
    /// Mood was loaded from persistence.
    pub mood: bool,
    /// Trait evolution state was loaded from persistence.
    pub traits: bool,
    /// Prompt evolution state was loaded from persistence.
    pub prompts: bool,
}

/// What happened at the end of a browsing session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// The trait tick, if enough interactions had accumulated.
    pub trait_tick: Option<TraitTick>,
    /// Adaptations removed for lack of reinforcement.
    pub decayed_adaptations: usize,
}

/// A router and the four agent engines, composed for a set of agents.
pub struct Colony {
    router: StimulusRouter,
    mood: Arc<Mutex<MoodEngine>>,
    traits: Mutex<TraitEvolutionEngine>,
    prompts: Mutex<PromptEvolutionEngine>,
    alliances: Mutex<AllianceEngine>,
    analyzer: Arc<dyn SentimentAnalyzer>,
    profiles: RwLock<BTreeMap<SeedId, AgentProfile>>,
}

impl Colony {
    /// Build a colony without persistence, using [`LexiconSentiment`].
    pub fn new(config: &SeedbedConfig) -> Self {
        Self {
            router: StimulusRouter::with_history_capacity(config.router.history_capacity),
            mood: Arc::new(Mutex::new(MoodEngine::new(config.mood.clone()))),
            traits: Mutex::new(TraitEvolutionEngine::new(config.traits.clone())),
            prompts: Mutex::new(PromptEvolutionEngine::new(config.prompt_evolution.clone())),
            alliances: Mutex::new(AllianceEngine::new(config.alliance.clone())),
            analyzer: Arc::new(LexiconSentiment::new()),
            profiles: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a colony whose engines all save to `store`.
    pub fn with_persistence<P>(config: &SeedbedConfig, store: &Arc<P>) -> Self
    where
        P: MoodPersistence
            + EvolutionPersistence
            + PromptEvolutionPersistence
            + AlliancePersistence
            + 'static,
    {
        let mood: Arc<dyn MoodPersistence> = store.clone();
        let traits: Arc<dyn EvolutionPersistence> = store.clone();
        let prompts: Arc<dyn PromptEvolutionPersistence> = store.clone();
        let alliances: Arc<dyn AlliancePersistence> = store.clone();
        Self {
            mood: Arc::new(Mutex::new(
                MoodEngine::new(config.mood.clone()).with_persistence(mood),
            )),
            traits: Mutex::new(
                TraitEvolutionEngine::new(config.traits.clone()).with_persistence(traits),
            ),
            prompts: Mutex::new(
                PromptEvolutionEngine::new(config.prompt_evolution.clone())
                    .with_persistence(prompts),
            ),
            alliances: Mutex::new(
                AllianceEngine::new(config.alliance.clone()).with_persistence(alliances),
            ),
            ..Self::new(config)
        }
    }

    /// Replace the sentiment analyzer used for incoming stimuli.
    ///
    /// Agents registered earlier keep the analyzer they were subscribed with.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// The stimulus router. Ingest and emit stimuli through it.
    pub const fn router(&self) -> &StimulusRouter {
        &self.router
    }

    /// Exclusive access to the alliance engine.
    pub async fn alliances(&self) -> MutexGuard<'_, AllianceEngine> {
        self.alliances.lock().await
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Bring an agent online.
    ///
    /// Restores or initializes state in every per-agent engine, then
    /// subscribes the agent so that each delivered stimulus moves its mood.
    /// Registering an agent again re-subscribes it with the new filter;
    /// engine state already held in memory is kept.
    pub async fn register_agent(&self, profile: AgentProfile) -> WarmStart {
        let seed_id = profile.seed_id.clone();

        let warm = WarmStart {
            mood: self
                .mood
                .lock()
                .await
                .load_or_initialize(&seed_id, &profile.traits)
                .await,
            traits: self
                .traits
                .lock()
                .await
                .load_or_register(&seed_id, profile.traits)
                .await,
            prompts: self
                .prompts
                .lock()
                .await
                .load_or_register(&seed_id, &profile.base_prompt)
                .await,
        };

        let mood = Arc::clone(&self.mood);
        let analyzer = Arc::clone(&self.analyzer);
        let target = seed_id.clone();
        let handler = move |event: StimulusEvent| {
            let mood = Arc::clone(&mood);
            let analyzer = Arc::clone(&analyzer);
            let target = target.clone();
            async move {
                let moved = mood
                    .lock()
                    .await
                    .apply_stimulus(&target, &event, analyzer.as_ref());
                if let Some(pad) = moved {
                    debug!(seed_id = %target, event_id = %event.event_id, ?pad, "stimulus moved mood");
                }
                Ok::<(), HandlerError>(())
            }
        };
        self.router
            .subscribe(seed_id.clone(), handler, profile.filter.clone())
            .await;

        info!(
            seed_id = %seed_id,
            name = %profile.name,
            restored_mood = warm.mood,
            restored_traits = warm.traits,
            restored_prompts = warm.prompts,
            "agent registered"
        );
        self.profiles.write().await.insert(seed_id, profile);
        warm
    }

    /// Take an agent offline. Engine state is kept for a later return.
    pub async fn deregister_agent(&self, seed_id: &SeedId) -> bool {
        let removed = self.profiles.write().await.remove(seed_id).is_some();
        if removed {
            self.router.unsubscribe(seed_id).await;
            info!(seed_id = %seed_id, "agent deregistered");
        }
        removed
    }

    /// Identifiers of registered agents.
    pub async fn agent_ids(&self) -> Vec<SeedId> {
        self.profiles.read().await.keys().cloned().collect()
    }

    async fn profile(&self, seed_id: &SeedId) -> Result<AgentProfile, AgentError> {
        self.profiles
            .read()
            .await
            .get(seed_id)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent(seed_id.clone()))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Close out a browsing session.
    ///
    /// Records the session's actions and enclaves as trait pressure, adds
    /// pressure from the agent's current mood, ages its adaptations, and
    /// then attempts a trait tick.
    pub async fn complete_session(
        &self,
        seed_id: &SeedId,
        actions: &[SessionAction],
        enclaves: &[String],
    ) -> Result<SessionReport, AgentError> {
        self.profile(seed_id).await?;

        let pad = self.mood.lock().await.get_state(seed_id);

        let trait_tick = {
            let mut traits = self.traits.lock().await;
            traits.record_browsing_session(seed_id, actions, enclaves);
            if let Some(pad) = pad {
                traits.record_mood_exposure(seed_id, pad);
            }
            traits.evolve(seed_id)
        };

        let decayed_adaptations = self
            .prompts
            .lock()
            .await
            .record_session(seed_id)
            .unwrap_or(0);

        debug!(
            seed_id = %seed_id,
            actions = actions.len(),
            enclaves = enclaves.len(),
            ticked = trait_tick.is_some(),
            decayed_adaptations,
            "session completed"
        );
        Ok(SessionReport {
            trait_tick,
            decayed_adaptations,
        })
    }

    /// Let time pass for an agent's mood.
    pub async fn decay_mood(&self, seed_id: &SeedId, steps: u32) -> Option<PadState> {
        self.mood.lock().await.decay_to_baseline(seed_id, steps)
    }

    /// Run a reflection if the agent is due for one.
    ///
    /// The prompt context is assembled from the agent's profile, its drift
    /// narrative and its current mood label. Other agents' sessions and
    /// queries proceed while the model call is in flight. Returns `Ok(None)`
    /// when no reflection ran.
    pub async fn reflect(
        &self,
        seed_id: &SeedId,
        recent_activity: Vec<String>,
        llm: &dyn ReflectionLlm,
    ) -> Result<Option<ReflectionOutcome>, AgentError> {
        let profile = self.profile(seed_id).await?;
        let mood = self
            .mood
            .lock()
            .await
            .mood_label(seed_id)
            .map(|label| label.to_string());
        let drift_narrative = self
            .traits
            .lock()
            .await
            .evolution_summary(seed_id)
            .map(|summary| summary.narrative);

        let ctx = ReflectionContext {
            agent_name: profile.name,
            base_prompt: profile.base_prompt,
            drift_narrative,
            recent_activity,
            mood,
        };
        let pending = self
            .prompts
            .lock()
            .await
            .begin_reflection(seed_id, &ctx, Utc::now());
        let Some(pending) = pending else {
            return Ok(None);
        };

        // No engine lock is held while the model runs.
        let response = pending.call(llm).await;
        Ok(self.prompts.lock().await.finish_reflection(pending, response))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current mood.
    pub async fn mood_of(&self, seed_id: &SeedId) -> Option<PadState> {
        self.mood.lock().await.get_state(seed_id)
    }

    /// Current mood label.
    pub async fn mood_label(&self, seed_id: &SeedId) -> Option<MoodLabel> {
        self.mood.lock().await.mood_label(seed_id)
    }

    /// Current (evolved) personality.
    pub async fn traits_of(&self, seed_id: &SeedId) -> Option<HexacoTraits> {
        self.traits.lock().await.current_traits(seed_id)
    }

    /// Active learned adaptations.
    pub async fn adaptations_of(&self, seed_id: &SeedId) -> Vec<PromptAdaptation> {
        self.prompts.lock().await.active_adaptations(seed_id)
    }

    /// Base prompt followed by the learned-behaviors overlay, if any.
    pub async fn assembled_prompt(&self, seed_id: &SeedId) -> Result<String, AgentError> {
        let profile = self.profile(seed_id).await?;
        let overlay = self.prompts.lock().await.build_prompt_overlay(seed_id);
        if overlay.is_empty() {
            Ok(profile.base_prompt)
        } else {
            Ok(format!("{}\n\n{overlay}", profile.base_prompt.trim_end()))
        }
    }

    /// Mean mood of an alliance's members.
    pub async fn alliance_mood(&self, alliance_id: AllianceId) -> Option<PadState> {
        let mood = self.mood.lock().await;
        let alliances = self.alliances.lock().await;
        alliances.collective_mood(alliance_id, &*mood)
    }
}

impl core::fmt::Debug for Colony {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Colony")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

//! Per-agent affect and adaptation engines for the Seedbed substrate.
//!
//! This crate holds the logic that operates on agent state without doing
//! I/O of its own. Storage, the reflection model, trust scores and topic
//! subscriptions are injected through traits; everything else is pure
//! in-memory computation.
//!
//! # Modules
//!
//! - [`mood`] -- PAD mood with personality baselines and decay ([`MoodEngine`])
//! - [`trait_evolution`] -- Slow HEXACO drift from behavior ([`TraitEvolutionEngine`])
//! - [`prompt_evolution`] -- Reflective behavior overlays ([`PromptEvolutionEngine`])
//! - [`alliance`] -- Trust-gated alliance formation ([`AllianceEngine`])
//! - [`sentiment`] -- Text to polarity/intensity ([`LexiconSentiment`])
//! - [`collaborators`] -- Trust, topic and mood lookups supplied by the host
//! - [`persistence`] -- Storage contracts and [`InMemoryPersistence`]
//! - [`config`] -- Tunables for every engine
//! - [`error`] -- Error types

pub mod alliance;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod mood;
pub mod persistence;
pub mod prompt_evolution;
pub mod sentiment;
pub mod trait_evolution;

// Re-export primary types at crate root for convenience.
pub use alliance::{
    Alliance, AllianceCharter, AllianceEngine, AllianceEvent, AllianceProposal, AllianceStatus,
    ProposalStatus,
};
pub use collaborators::{MoodReader, TopicProvider, TrustProvider};
pub use config::{AllianceConfig, MoodConfig, PromptEvolutionConfig, TraitEvolutionConfig};
pub use error::{AgentError, AllianceError, LlmError, PersistenceError};
pub use mood::{MoodEngine, MoodLabel, MoodSnapshot, MoodUpdate, MoodUpdateMetadata};
pub use persistence::{
    AlliancePersistence, EvolutionPersistence, InMemoryPersistence, MoodPersistence,
    PromptEvolutionPersistence,
};
pub use prompt_evolution::{
    PendingReflection, PromptAdaptation, PromptEvolutionEngine, PromptEvolutionState,
    ReflectionContext, ReflectionLlm, ReflectionOutcome, RejectionReason,
};
pub use sentiment::{LexiconSentiment, SentimentAnalyzer, SentimentScore};
pub use trait_evolution::{
    BrowsingAction, EvolutionState, EvolutionSummary, SessionAction, TraitEvolutionEngine,
    TraitTick,
};

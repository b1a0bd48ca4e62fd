//! Error types for the seedbed-agents crate.
//!
//! Only caller-visible validation failures are errors. Operations against
//! invalid state return `false` or `None`, and best-effort work (persistence,
//! reflection) logs its failures instead of propagating them.

use seedbed_types::SeedId;

/// Errors from engine operations that address a specific agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No state is registered for the agent.
    #[error("agent not registered: {0}")]
    UnknownAgent(SeedId),

    /// The reflection prompt template failed to render.
    #[error("prompt template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Validation failures when proposing an alliance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllianceError {
    /// The founder listed itself as an invitee.
    #[error("founder {0} cannot invite itself")]
    SelfInvitation(SeedId),

    /// The invitee list was empty.
    #[error("an alliance needs at least 1 invitee")]
    NoInvitees,

    /// More invitees than the configured maximum.
    #[error("an alliance may invite at most {max} agents (got {count})")]
    TooManyInvitees {
        /// Number of invitees supplied.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The same agent appears twice in the invitee list.
    #[error("agent {0} is invited more than once")]
    DuplicateInvitee(SeedId),

    /// Trust between the founder and an invitee is below the threshold.
    #[error("trust from {from} to {to} is {trust:.2}, below the required {required:.2}")]
    InsufficientTrust {
        /// The agent whose trust is insufficient.
        from: SeedId,
        /// The agent being trusted.
        to: SeedId,
        /// Observed trust value.
        trust: f64,
        /// Required minimum.
        required: f64,
    },
}

/// Failure reported by a persistence adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    /// The backing store rejected or failed the operation.
    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Failure reported by the reflection LLM callback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// The model call failed.
    #[error("llm call failed: {0}")]
    Failed(String),

    /// The model call ran past `reflection_timeout_secs`.
    #[error("llm call timed out")]
    Timeout,
}

//! Error types for the simulation binary.

/// Top-level error for `seedbed-sim`.
///
/// Each variant wraps a specific subsystem error so `main` can propagate
/// with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: seedbed_core::ConfigError,
    },

    /// An engine operation addressed an agent the colony does not know.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: seedbed_agents::AgentError,
    },

    /// An alliance proposal expected to succeed was rejected.
    #[error("alliance error: {source}")]
    Alliance {
        /// The underlying alliance error.
        #[from]
        source: seedbed_agents::AllianceError,
    },
}

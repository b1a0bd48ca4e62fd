//! Configuration loading and typed config structures for Seedbed.
//!
//! The canonical configuration lives in `seedbed-config.yaml`. Every
//! section is optional; omitted keys take the defaults documented on the
//! engine config structs in [`seedbed_agents::config`].

use std::path::Path;

use seedbed_agents::config::{
    AllianceConfig, MoodConfig, PromptEvolutionConfig, TraitEvolutionConfig,
};
use seedbed_router::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `logging.level`.
pub const LOG_LEVEL_ENV: &str = "SEEDBED_LOG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Seedbed configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedbedConfig {
    /// Stimulus router settings.
    pub router: RouterConfig,

    /// Mood engine tuning.
    pub mood: MoodConfig,

    /// Trait evolution tuning.
    pub traits: TraitEvolutionConfig,

    /// Prompt evolution tuning.
    pub prompt_evolution: PromptEvolutionConfig,

    /// Alliance protocol limits.
    pub alliance: AllianceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl SeedbedConfig {
    /// Load configuration from a YAML file.
    ///
    /// After parsing, `SEEDBED_LOG` (if set) overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying env overrides.
    ///
    /// Prompt evolution limits above their hard ceilings are lowered to
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.prompt_evolution = config.prompt_evolution.bounded();
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Stimulus router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Events retained for `get_recent_events` (default: 1000).
    pub history_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (default: "info").
    pub level: String,

    /// Emit JSON lines instead of human-readable output (default: false).
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Apply `SEEDBED_LOG` if it is set.
    pub fn apply_env_overrides(&mut self) {
        self.override_level(std::env::var(LOG_LEVEL_ENV).ok());
    }

    /// Replace the level with `value` unless it is absent or blank.
    pub fn override_level(&mut self, value: Option<String>) {
        if let Some(level) = value
            && !level.trim().is_empty()
        {
            self.level = level.trim().to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let config = SeedbedConfig::default();
        assert_eq!(config.router.history_capacity, 1_000);
        assert_eq!(config.traits.min_interactions, 15);
        assert_eq!(config.prompt_evolution.max_adaptations, 8);
        assert_eq!(config.alliance.max_invitees, 7);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn adaptation_limits_cannot_be_raised() {
        let yaml = r"
prompt_evolution:
  max_adaptations: 64
  max_adaptation_len: 5000
";
        let config = SeedbedConfig::parse(yaml).unwrap_or_default();
        assert_eq!(config.prompt_evolution.max_adaptations, 8);
        assert_eq!(config.prompt_evolution.max_adaptation_len, 100);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
router:
  history_capacity: 250

mood:
  decay_rate: 0.2
  sensitivity: 0.5
  audit_log_len: 10

traits:
  min_interactions: 5
  learning_rate: 0.1
  max_drift: 0.1
  pressure_retention: 0.5

prompt_evolution:
  max_adaptations: 4
  max_adaptation_len: 80
  sessions_between_reflections: 3
  min_hours_between_reflections: 1
  decay_sessions: 10
  max_new_per_reflection: 1
  reinforce_threshold: 0.6
  duplicate_threshold: 0.8

alliance:
  min_trust: 0.7
  max_invitees: 3

logging:
  level: debug
  json: true
";
        let config = SeedbedConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.router.history_capacity, 250);
        assert_eq!(config.mood.audit_log_len, 10);
        assert_eq!(config.traits.min_interactions, 5);
        assert_eq!(config.prompt_evolution.max_new_per_reflection, 1);
        assert_eq!(config.prompt_evolution.min_hours_between_reflections, 1);
        assert_eq!(config.alliance.max_invitees, 3);
        assert!(config.logging.json);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "
alliance:
  min_trust: 0.8
";
        let config = SeedbedConfig::parse(yaml).unwrap_or_default();
        assert!((config.alliance.min_trust - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.alliance.max_invitees, 7);
        assert_eq!(config.prompt_evolution.decay_sessions, 50);
        assert_eq!(config.router.history_capacity, 1_000);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = SeedbedConfig::parse("router: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = SeedbedConfig::from_file(Path::new("/nonexistent/seedbed-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn level_override_ignores_blank_values() {
        let mut logging = LoggingConfig::default();
        logging.override_level(Some(String::from("   ")));
        assert_eq!(logging.level, "info");
        logging.override_level(None);
        assert_eq!(logging.level, "info");
        logging.override_level(Some(String::from(" seedbed_router=trace ")));
        assert_eq!(logging.level, "seedbed_router=trace");
    }
}

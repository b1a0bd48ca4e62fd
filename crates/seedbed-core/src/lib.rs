//! Configuration and orchestration for the Seedbed agent substrate.
//!
//! This crate composes the stimulus router and the per-agent engines into
//! a [`Colony`], the shape a host embeds, and loads the YAML configuration
//! that tunes them.
//!
//! # Modules
//!
//! - [`config`] -- [`SeedbedConfig`] loading from `seedbed-config.yaml`
//! - [`colony`] -- [`Colony`], [`AgentProfile`] and session bookkeeping

pub mod colony;
pub mod config;

pub use colony::{AgentProfile, Colony, SessionReport, WarmStart};
pub use config::{ConfigError, LoggingConfig, RouterConfig, SeedbedConfig};

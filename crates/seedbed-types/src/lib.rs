//! Shared type definitions for the Seedbed agent substrate.
//!
//! This crate is the single source of truth for the data that crosses
//! component boundaries: stimulus events produced by the router, and the
//! personality/affect values read by the evolution engines. Types flow to
//! `TypeScript` via `ts-rs` for dashboards.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers ([`SeedId`], [`EventId`], [`AllianceId`])
//! - [`stimulus`] -- [`StimulusEvent`] and its type-tagged payloads
//! - [`personality`] -- [`HexacoTraits`] and [`PadState`]

pub mod ids;
pub mod personality;
pub mod stimulus;

// Re-export all public types at crate root for convenience.
pub use ids::{AllianceId, EventId, SeedId};
pub use personality::{HexacoTraits, PadState, TraitDimension};
pub use stimulus::{
    AgentReplyPayload, ChannelMessagePayload, ConversationType, CronTickPayload,
    InternalThoughtPayload, StimulusEvent, StimulusPayload, StimulusPriority, StimulusSource,
    StimulusType, TipDataType, TipPayload, WorldFeedPayload,
};

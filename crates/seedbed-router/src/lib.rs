//! Stimulus router for the Seedbed agent substrate.
//!
//! External and internal inputs (world-feed items, user tips, scheduler
//! ticks, agent replies, self-prompts, chat-platform messages) enter the
//! system through a [`StimulusRouter`] and are fanned out to per-agent
//! subscribers according to their filters, target lists, and pause state.
//!
//! # Modules
//!
//! - [`router`] -- [`StimulusRouter`] and [`RouterStats`]
//! - [`subscription`] -- [`Subscription`] and [`SubscriptionFilter`]
//! - [`handler`] -- The [`StimulusHandler`] trait and [`ChannelHandler`]
//! - [`history`] -- Bounded [`EventHistory`]
//! - [`error`] -- [`HandlerError`]

pub mod error;
pub mod handler;
pub mod history;
pub mod router;
pub mod subscription;

pub use error::HandlerError;
pub use handler::{ChannelHandler, StimulusHandler};
pub use history::{DEFAULT_HISTORY_CAPACITY, EventHistory};
pub use router::{RouterStats, StimulusRouter};
pub use subscription::{Subscription, SubscriptionFilter};

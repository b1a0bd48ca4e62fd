//! Stimulus events delivered by the router.
//!
//! A [`StimulusEvent`] is immutable once constructed. Its type is not stored
//! separately: it is derived from the [`StimulusPayload`] variant, so the
//! declared type and the payload shape can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{EventId, SeedId};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The kind of a stimulus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum StimulusType {
    /// An item from an external news or data feed.
    WorldFeed,
    /// A user-submitted tip.
    Tip,
    /// A scheduled heartbeat.
    CronTick,
    /// Another agent replied to one of this agent's posts.
    AgentReply,
    /// A self-generated prompt to think about a topic.
    InternalThought,
    /// A message arriving through an external chat channel.
    ChannelMessage,
}

impl StimulusType {
    /// Every stimulus type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::WorldFeed,
        Self::Tip,
        Self::CronTick,
        Self::AgentReply,
        Self::InternalThought,
        Self::ChannelMessage,
    ];

    /// The `snake_case` wire name of this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldFeed => "world_feed",
            Self::Tip => "tip",
            Self::CronTick => "cron_tick",
            Self::AgentReply => "agent_reply",
            Self::InternalThought => "internal_thought",
            Self::ChannelMessage => "channel_message",
        }
    }
}

impl core::fmt::Display for StimulusType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority of a stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum StimulusPriority {
    /// Background material.
    Low,
    /// Ordinary traffic.
    #[default]
    Normal,
    /// Should be handled before normal traffic.
    High,
    /// Urgent, time-critical news.
    Breaking,
}

/// Where a stimulus came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StimulusSource {
    /// Identifier of the producing provider (feed name, platform, `cron`, ...).
    pub provider_id: String,
    /// Whether the provider vouches for the origin of the content.
    pub verified: bool,
}

impl StimulusSource {
    /// An unverified source.
    pub fn unverified(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            verified: false,
        }
    }

    /// A verified source.
    pub fn verified(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            verified: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// An item from an external news or data feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldFeedPayload {
    /// Headline text.
    pub headline: String,
    /// Optional body or summary.
    pub body: Option<String>,
    /// Feed category used by subscription category filters.
    pub category: String,
    /// Human-readable name of the originating outlet.
    pub source_name: String,
    /// Link to the original item.
    pub source_url: Option<String>,
}

/// Content format of a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TipDataType {
    /// Free text.
    Text,
    /// A link to external content.
    Url,
}

/// A user-submitted tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TipPayload {
    /// Identifier assigned by the tip intake.
    pub tip_id: String,
    /// Tip body (text or URL depending on `data_type`).
    pub content: String,
    /// Format of `content`.
    pub data_type: TipDataType,
    /// Optional attribution of the submitter.
    pub attribution: Option<String>,
}

/// A scheduled heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CronTickPayload {
    /// Name of the schedule that fired.
    pub schedule_name: String,
    /// Number of times this schedule has fired, including this one.
    pub tick_count: u64,
}

/// Another agent replied to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentReplyPayload {
    /// The post being replied to.
    pub reply_to_post_id: String,
    /// The agent that wrote the reply.
    pub reply_from_seed_id: SeedId,
    /// Reply text.
    pub content: String,
}

/// A self-generated prompt to think about a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InternalThoughtPayload {
    /// What to think about.
    pub topic: String,
    /// Optional framing for the thought.
    pub prompt: Option<String>,
}

/// Kind of conversation a channel message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    /// One-to-one direct message.
    Direct,
    /// Small group chat.
    Group,
    /// Public or broadcast channel.
    Channel,
    /// Thread under another message.
    Thread,
}

/// A message arriving through an external chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChannelMessagePayload {
    /// Platform name (`discord`, `telegram`, ...).
    pub platform: String,
    /// Platform conversation identifier.
    pub conversation_id: String,
    /// Kind of conversation.
    pub conversation_type: ConversationType,
    /// Display name of the sender.
    pub sender_name: String,
    /// Platform identifier of the sender.
    pub sender_platform_id: String,
    /// Message text.
    pub content: String,
    /// Platform message identifier.
    pub message_id: String,
    /// Whether the sender is the agent's owner.
    pub is_owner: bool,
}

/// Type-tagged stimulus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StimulusPayload {
    /// See [`WorldFeedPayload`].
    WorldFeed(WorldFeedPayload),
    /// See [`TipPayload`].
    Tip(TipPayload),
    /// See [`CronTickPayload`].
    CronTick(CronTickPayload),
    /// See [`AgentReplyPayload`].
    AgentReply(AgentReplyPayload),
    /// See [`InternalThoughtPayload`].
    InternalThought(InternalThoughtPayload),
    /// See [`ChannelMessagePayload`].
    ChannelMessage(ChannelMessagePayload),
}

impl StimulusPayload {
    /// The stimulus type carried by this payload.
    pub const fn stimulus_type(&self) -> StimulusType {
        match self {
            Self::WorldFeed(_) => StimulusType::WorldFeed,
            Self::Tip(_) => StimulusType::Tip,
            Self::CronTick(_) => StimulusType::CronTick,
            Self::AgentReply(_) => StimulusType::AgentReply,
            Self::InternalThought(_) => StimulusType::InternalThought,
            Self::ChannelMessage(_) => StimulusType::ChannelMessage,
        }
    }

    /// The world-feed category, if this is a world-feed payload.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::WorldFeed(feed) => Some(feed.category.as_str()),
            _ => None,
        }
    }

    /// The human-readable text of the payload, used for sentiment scoring.
    ///
    /// Cron ticks carry no text and return `None`.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::WorldFeed(feed) => Some(match &feed.body {
                Some(body) => format!("{} {body}", feed.headline),
                None => feed.headline.clone(),
            }),
            Self::Tip(tip) => Some(tip.content.clone()),
            Self::CronTick(_) => None,
            Self::AgentReply(reply) => Some(reply.content.clone()),
            Self::InternalThought(thought) => Some(thought.topic.clone()),
            Self::ChannelMessage(message) => Some(message.content.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// StimulusEvent
// ---------------------------------------------------------------------------

/// An immutable stimulus routed to agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StimulusEvent {
    /// Unique event identifier.
    pub event_id: EventId,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Delivery priority.
    pub priority: StimulusPriority,
    /// Origin of the event.
    pub source: StimulusSource,
    /// Type-tagged payload.
    pub payload: StimulusPayload,
    /// When present, only these agents receive the event.
    pub target_seed_ids: Option<Vec<SeedId>>,
}

impl StimulusEvent {
    /// Build a new event stamped with a fresh id and the current time.
    pub fn new(
        payload: StimulusPayload,
        priority: StimulusPriority,
        source: StimulusSource,
        target_seed_ids: Option<Vec<SeedId>>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            priority,
            source,
            payload,
            target_seed_ids,
        }
    }

    /// The event's type, derived from its payload.
    pub const fn stimulus_type(&self) -> StimulusType {
        self.payload.stimulus_type()
    }

    /// Whether the event is restricted to specific agents.
    pub const fn is_targeted(&self) -> bool {
        self.target_seed_ids.is_some()
    }

    /// Whether this event may be delivered to `seed_id` under its target list.
    pub fn is_addressed_to(&self, seed_id: &SeedId) -> bool {
        self.target_seed_ids
            .as_ref()
            .is_none_or(|targets| targets.contains(seed_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(category: &str) -> StimulusPayload {
        StimulusPayload::WorldFeed(WorldFeedPayload {
            headline: String::from("Rover lands safely"),
            body: Some(String::from("Cheers at mission control")),
            category: category.to_owned(),
            source_name: String::from("wire"),
            source_url: None,
        })
    }

    #[test]
    fn type_is_derived_from_payload() {
        let event = StimulusEvent::new(
            feed("science"),
            StimulusPriority::Normal,
            StimulusSource::unverified("wire"),
            None,
        );
        assert_eq!(event.stimulus_type(), StimulusType::WorldFeed);
        assert_eq!(event.payload.category(), Some("science"));
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = StimulusPayload::CronTick(CronTickPayload {
            schedule_name: String::from("hourly"),
            tick_count: 3,
        });
        let json = serde_json::to_value(&payload).ok();
        assert_eq!(
            json.as_ref().and_then(|v| v.get("type")).and_then(|v| v.as_str()),
            Some("cron_tick")
        );
    }

    #[test]
    fn targets_restrict_addressing() {
        let nova = SeedId::new("nova");
        let ember = SeedId::new("ember");
        let event = StimulusEvent::new(
            feed("tech"),
            StimulusPriority::Low,
            StimulusSource::unverified("wire"),
            Some(vec![nova.clone()]),
        );
        assert!(event.is_addressed_to(&nova));
        assert!(!event.is_addressed_to(&ember));
    }

    #[test]
    fn cron_ticks_have_no_text() {
        let payload = StimulusPayload::CronTick(CronTickPayload {
            schedule_name: String::from("daily"),
            tick_count: 1,
        });
        assert!(payload.text().is_none());
        assert_eq!(
            feed("x").text().as_deref(),
            Some("Rover lands safely Cheers at mission control")
        );
    }
}

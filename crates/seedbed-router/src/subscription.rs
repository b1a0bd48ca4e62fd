//! Subscriptions and delivery filters.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use seedbed_types::{SeedId, StimulusEvent, StimulusType};

use crate::handler::StimulusHandler;

/// Optional narrowing of what a subscriber receives.
///
/// An empty filter (the default) receives every event type and every
/// world-feed category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// When set, only these event types are delivered.
    pub types: Option<BTreeSet<StimulusType>>,
    /// When set, world-feed events are delivered only for these categories.
    /// Other event types are unaffected.
    pub categories: Option<BTreeSet<String>>,
}

impl SubscriptionFilter {
    /// A filter that accepts everything.
    pub const fn all() -> Self {
        Self {
            types: None,
            categories: None,
        }
    }

    /// Restrict to the given event types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = StimulusType>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    /// Restrict world-feed events to the given categories.
    #[must_use]
    pub fn with_categories<S: Into<String>>(
        mut self,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Whether an event passes this filter (target lists are checked elsewhere).
    pub fn matches(&self, event: &StimulusEvent) -> bool {
        let type_ok = self
            .types
            .as_ref()
            .is_none_or(|types| types.contains(&event.stimulus_type()));
        if !type_ok {
            return false;
        }

        match (event.payload.category(), &self.categories) {
            (Some(category), Some(allowed)) => allowed.contains(category),
            _ => true,
        }
    }
}

/// A single agent's subscription. At most one exists per [`SeedId`].
#[derive(Clone)]
pub struct Subscription {
    /// The subscribing agent.
    pub seed_id: SeedId,
    /// Delivery callback.
    pub handler: Arc<dyn StimulusHandler>,
    /// Type and category filters.
    pub filter: SubscriptionFilter,
    /// Paused subscriptions receive nothing until resumed.
    pub paused: bool,
    /// When the subscription was (re)created.
    pub subscribed_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether this subscription should receive `event` right now.
    pub fn accepts(&self, event: &StimulusEvent) -> bool {
        !self.paused && event.is_addressed_to(&self.seed_id) && self.filter.matches(event)
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("seed_id", &self.seed_id)
            .field("filter", &self.filter)
            .field("paused", &self.paused)
            .field("subscribed_at", &self.subscribed_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use seedbed_types::{
        CronTickPayload, StimulusPayload, StimulusPriority, StimulusSource, WorldFeedPayload,
    };

    use super::*;

    fn feed(category: &str) -> StimulusEvent {
        StimulusEvent::new(
            StimulusPayload::WorldFeed(WorldFeedPayload {
                headline: String::from("headline"),
                body: None,
                category: category.to_owned(),
                source_name: String::from("wire"),
                source_url: None,
            }),
            StimulusPriority::Normal,
            StimulusSource::unverified("wire"),
            None,
        )
    }

    fn cron() -> StimulusEvent {
        StimulusEvent::new(
            StimulusPayload::CronTick(CronTickPayload {
                schedule_name: String::from("hourly"),
                tick_count: 1,
            }),
            StimulusPriority::Low,
            StimulusSource::verified("cron"),
            None,
        )
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = SubscriptionFilter::all();
        assert!(filter.matches(&feed("science")));
        assert!(filter.matches(&cron()));
    }

    #[test]
    fn type_filter_excludes_other_types() {
        let filter = SubscriptionFilter::default().with_types([StimulusType::CronTick]);
        assert!(filter.matches(&cron()));
        assert!(!filter.matches(&feed("science")));
    }

    #[test]
    fn category_filter_only_applies_to_world_feed() {
        let filter = SubscriptionFilter::default().with_categories(["science"]);
        assert!(filter.matches(&feed("science")));
        assert!(!filter.matches(&feed("sports")));
        assert!(filter.matches(&cron()));
    }
}

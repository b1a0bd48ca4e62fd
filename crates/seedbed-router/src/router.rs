//! The stimulus router.
//!
//! # Architecture
//!
//! Every ingestion call builds a [`StimulusEvent`], appends it to the
//! bounded history, then fans it out to each active subscriber whose
//! filter and target check pass. The subscriber table is snapshotted
//! under a read lock and the lock is released before any handler runs,
//! so handlers may call back into the router (subscribe, pause, ingest)
//! without deadlocking.
//!
//! # Invariants
//!
//! - At most one subscription per [`SeedId`]; re-subscribing replaces it.
//! - A failing or panicking handler never prevents delivery to others and
//!   never surfaces to the ingestion caller.
//! - History length never exceeds its capacity.
//! - The event counter only increases.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use seedbed_types::{
    AgentReplyPayload, ChannelMessagePayload, CronTickPayload, InternalThoughtPayload, SeedId,
    StimulusEvent, StimulusPayload, StimulusPriority, StimulusSource, TipPayload,
    WorldFeedPayload,
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::error::DeliveryFailure;
use crate::handler::{ChannelHandler, StimulusHandler};
use crate::history::{DEFAULT_HISTORY_CAPACITY, EventHistory};
use crate::subscription::{Subscription, SubscriptionFilter};

/// Provider id stamped on tips.
const TIP_PROVIDER: &str = "tip";
/// Provider id stamped on cron ticks.
const CRON_PROVIDER: &str = "cron";
/// Provider id stamped on internal thoughts.
const INTERNAL_PROVIDER: &str = "internal";

/// Point-in-time router counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Events routed since construction.
    pub total_events: u64,
    /// Deliveries that errored or panicked since construction.
    pub failed_deliveries: u64,
    /// Subscriptions currently receiving events.
    pub active_subscriptions: usize,
    /// Subscriptions currently paused.
    pub paused_subscriptions: usize,
    /// Events currently retained in history.
    pub history_len: usize,
    /// Maximum history length.
    pub history_capacity: usize,
}

/// Typed pub/sub router delivering stimuli to per-agent subscribers.
pub struct StimulusRouter {
    subscriptions: RwLock<BTreeMap<SeedId, Subscription>>,
    history: Mutex<EventHistory>,
    total_events: AtomicU64,
    failed_deliveries: AtomicU64,
}

impl StimulusRouter {
    /// Create a router with the default history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a router retaining at most `capacity` events.
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            history: Mutex::new(EventHistory::new(capacity)),
            total_events: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register `handler` for `seed_id`, replacing any existing subscription.
    pub async fn subscribe<H>(&self, seed_id: SeedId, handler: H, filter: SubscriptionFilter)
    where
        H: StimulusHandler + 'static,
    {
        self.subscribe_arc(seed_id, Arc::new(handler), filter).await;
    }

    /// Register a shared handler for `seed_id`.
    pub async fn subscribe_arc(
        &self,
        seed_id: SeedId,
        handler: Arc<dyn StimulusHandler>,
        filter: SubscriptionFilter,
    ) {
        let subscription = Subscription {
            seed_id: seed_id.clone(),
            handler,
            filter,
            paused: false,
            subscribed_at: Utc::now(),
        };
        let replaced = self
            .subscriptions
            .write()
            .await
            .insert(seed_id.clone(), subscription)
            .is_some();
        info!(seed_id = %seed_id, replaced, "subscriber registered");
    }

    /// Subscribe `seed_id` through a bounded channel and return its receiver.
    ///
    /// When the receiver falls `buffer` events behind, further deliveries
    /// to it are dropped and counted as failures.
    pub async fn subscribe_channel(
        &self,
        seed_id: SeedId,
        filter: SubscriptionFilter,
        buffer: usize,
    ) -> mpsc::Receiver<StimulusEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.subscribe(seed_id, ChannelHandler::new(tx), filter).await;
        rx
    }

    /// Remove the subscription for `seed_id`. Returns whether one existed.
    pub async fn unsubscribe(&self, seed_id: &SeedId) -> bool {
        let removed = self.subscriptions.write().await.remove(seed_id).is_some();
        if removed {
            info!(seed_id = %seed_id, "subscriber removed");
        }
        removed
    }

    /// Pause delivery to `seed_id`. Returns whether a subscription exists.
    pub async fn pause(&self, seed_id: &SeedId) -> bool {
        self.set_paused(seed_id, true).await
    }

    /// Resume delivery to `seed_id`. Returns whether a subscription exists.
    pub async fn resume(&self, seed_id: &SeedId) -> bool {
        self.set_paused(seed_id, false).await
    }

    async fn set_paused(&self, seed_id: &SeedId, paused: bool) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let Some(subscription) = subscriptions.get_mut(seed_id) else {
            return false;
        };
        subscription.paused = paused;
        debug!(seed_id = %seed_id, paused, "subscription pause state changed");
        true
    }

    /// Seed ids with a subscription, paused or not.
    pub async fn subscriber_ids(&self) -> Vec<SeedId> {
        self.subscriptions.read().await.keys().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Route a world-feed item to every matching subscriber.
    pub async fn ingest_world_feed(
        &self,
        payload: WorldFeedPayload,
        priority: Option<StimulusPriority>,
    ) -> StimulusEvent {
        let source = StimulusSource::unverified(payload.source_name.clone());
        let event = StimulusEvent::new(
            StimulusPayload::WorldFeed(payload),
            priority.unwrap_or(StimulusPriority::Normal),
            source,
            None,
        );
        self.dispatch(event).await
    }

    /// Route a user tip, optionally to specific agents.
    pub async fn ingest_tip(
        &self,
        payload: TipPayload,
        targets: Option<Vec<SeedId>>,
        priority: Option<StimulusPriority>,
    ) -> StimulusEvent {
        let event = StimulusEvent::new(
            StimulusPayload::Tip(payload),
            priority.unwrap_or(StimulusPriority::Normal),
            StimulusSource::unverified(TIP_PROVIDER),
            targets,
        );
        self.dispatch(event).await
    }

    /// Broadcast a low-priority scheduler tick.
    pub async fn emit_cron_tick(&self, schedule_name: &str, tick_count: u64) -> StimulusEvent {
        let event = StimulusEvent::new(
            StimulusPayload::CronTick(CronTickPayload {
                schedule_name: schedule_name.to_owned(),
                tick_count,
            }),
            StimulusPriority::Low,
            StimulusSource::verified(CRON_PROVIDER),
            None,
        );
        self.dispatch(event).await
    }

    /// Deliver a reply from one agent to `target`.
    pub async fn emit_agent_reply(
        &self,
        payload: AgentReplyPayload,
        target: SeedId,
        priority: Option<StimulusPriority>,
    ) -> StimulusEvent {
        let source = StimulusSource::verified(payload.reply_from_seed_id.as_str());
        let event = StimulusEvent::new(
            StimulusPayload::AgentReply(payload),
            priority.unwrap_or(StimulusPriority::Normal),
            source,
            Some(vec![target]),
        );
        self.dispatch(event).await
    }

    /// Deliver a self-prompt to `seed_id` only.
    pub async fn emit_internal_thought(
        &self,
        seed_id: SeedId,
        payload: InternalThoughtPayload,
    ) -> StimulusEvent {
        let event = StimulusEvent::new(
            StimulusPayload::InternalThought(payload),
            StimulusPriority::Low,
            StimulusSource::verified(INTERNAL_PROVIDER),
            Some(vec![seed_id]),
        );
        self.dispatch(event).await
    }

    /// Deliver an external chat message to `target`.
    ///
    /// Owner messages default to high priority and carry a verified source.
    pub async fn ingest_channel_message(
        &self,
        payload: ChannelMessagePayload,
        target: SeedId,
        priority: Option<StimulusPriority>,
    ) -> StimulusEvent {
        let default_priority = if payload.is_owner {
            StimulusPriority::High
        } else {
            StimulusPriority::Normal
        };
        let source = StimulusSource {
            provider_id: payload.platform.clone(),
            verified: payload.is_owner,
        };
        let event = StimulusEvent::new(
            StimulusPayload::ChannelMessage(payload),
            priority.unwrap_or(default_priority),
            source,
            Some(vec![target]),
        );
        self.dispatch(event).await
    }

    /// Route a fully-formed event produced elsewhere.
    pub async fn dispatch_external_event(&self, event: StimulusEvent) -> StimulusEvent {
        self.dispatch(event).await
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The newest `limit` routed events in arrival order.
    pub async fn get_recent_events(&self, limit: usize) -> Vec<StimulusEvent> {
        self.history.lock().await.recent(limit)
    }

    /// Current counters.
    pub async fn stats(&self) -> RouterStats {
        let (active, paused) = {
            let subscriptions = self.subscriptions.read().await;
            let paused = subscriptions.values().filter(|s| s.paused).count();
            (subscriptions.len().saturating_sub(paused), paused)
        };
        let (history_len, history_capacity) = {
            let history = self.history.lock().await;
            (history.len(), history.capacity())
        };
        RouterStats {
            total_events: self.total_events.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            active_subscriptions: active,
            paused_subscriptions: paused,
            history_len,
            history_capacity,
        }
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    async fn dispatch(&self, event: StimulusEvent) -> StimulusEvent {
        self.history.lock().await.push(event.clone());
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let recipients: Vec<(SeedId, Arc<dyn StimulusHandler>)> = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions
                .values()
                .filter(|s| s.accepts(&event))
                .map(|s| (s.seed_id.clone(), Arc::clone(&s.handler)))
                .collect()
        };

        let deliveries = recipients.iter().map(|(seed_id, handler)| {
            let event = &event;
            async move {
                let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
                let result = match outcome {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(DeliveryFailure::Error(e)),
                    Err(panic) => Err(DeliveryFailure::Panicked(panic_message(panic.as_ref()))),
                };
                (seed_id, result)
            }
        });

        let mut delivered: usize = 0;
        for (seed_id, result) in join_all(deliveries).await {
            match result {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(failure) => {
                    self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        seed_id = %seed_id,
                        event_id = %event.event_id,
                        stimulus_type = ?event.stimulus_type(),
                        error = %failure,
                        "stimulus delivery failed"
                    );
                }
            }
        }

        debug!(
            event_id = %event.event_id,
            stimulus_type = ?event.stimulus_type(),
            priority = ?event.priority,
            recipients = recipients.len(),
            delivered,
            "stimulus routed"
        );
        event
    }
}

impl Default for StimulusRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for StimulusRouter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StimulusRouter")
            .field("total_events", &self.total_events.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Render a panic payload as text.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use seedbed_types::{StimulusType, TipDataType};

    use super::*;
    use crate::error::HandlerError;

    fn tip(content: &str) -> TipPayload {
        TipPayload {
            tip_id: String::from("tip-1"),
            content: content.to_owned(),
            data_type: TipDataType::Text,
            attribution: None,
        }
    }

    fn counter_handler(
        count: Arc<AtomicUsize>,
    ) -> impl Fn(StimulusEvent) -> futures::future::Ready<Result<(), HandlerError>> + Send + Sync
    {
        move |_event| {
            count.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn resubscribe_replaces_handler() {
        let router = StimulusRouter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let seed = SeedId::from("alpha");

        router
            .subscribe(seed.clone(), counter_handler(Arc::clone(&first)), SubscriptionFilter::all())
            .await;
        router
            .subscribe(seed.clone(), counter_handler(Arc::clone(&second)), SubscriptionFilter::all())
            .await;

        router.ingest_tip(tip("hello"), None, None).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(router.subscriber_ids().await, vec![seed]);
    }

    #[tokio::test]
    async fn pause_and_resume_gate_delivery() {
        let router = StimulusRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seed = SeedId::from("alpha");
        router
            .subscribe(seed.clone(), counter_handler(Arc::clone(&count)), SubscriptionFilter::all())
            .await;

        assert!(router.pause(&seed).await);
        router.emit_cron_tick("hourly", 1).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let stats = router.stats().await;
        assert_eq!(stats.paused_subscriptions, 1);
        assert_eq!(stats.active_subscriptions, 0);

        assert!(router.resume(&seed).await);
        router.emit_cron_tick("hourly", 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_seed_operations_return_false() {
        let router = StimulusRouter::new();
        let ghost = SeedId::from("ghost");
        assert!(!router.unsubscribe(&ghost).await);
        assert!(!router.pause(&ghost).await);
        assert!(!router.resume(&ghost).await);
    }

    #[tokio::test]
    async fn ingestion_defaults() {
        let router = StimulusRouter::new();

        let cron = router.emit_cron_tick("daily", 7).await;
        assert_eq!(cron.priority, StimulusPriority::Low);
        assert!(cron.source.verified);

        let thought = router
            .emit_internal_thought(
                SeedId::from("alpha"),
                InternalThoughtPayload {
                    topic: String::from("weather"),
                    prompt: None,
                },
            )
            .await;
        assert_eq!(thought.priority, StimulusPriority::Low);
        assert_eq!(thought.target_seed_ids, Some(vec![SeedId::from("alpha")]));

        let tip_event = router
            .ingest_tip(tip("x"), None, Some(StimulusPriority::Breaking))
            .await;
        assert_eq!(tip_event.priority, StimulusPriority::Breaking);
        assert_eq!(tip_event.stimulus_type(), StimulusType::Tip);
        assert!(!tip_event.source.verified);

        assert_eq!(router.stats().await.total_events, 3);
    }

    #[tokio::test]
    async fn channel_subscription_receives_events() {
        let router = StimulusRouter::new();
        let mut rx = router
            .subscribe_channel(SeedId::from("alpha"), SubscriptionFilter::all(), 8)
            .await;

        let sent = router.ingest_tip(tip("via channel"), None, None).await;
        let received = rx.recv().await;
        assert_eq!(received.map(|e| e.event_id), Some(sent.event_id));
    }

    #[tokio::test]
    async fn full_channel_counts_as_failure() {
        let router = StimulusRouter::new();
        let _rx = router
            .subscribe_channel(SeedId::from("alpha"), SubscriptionFilter::all(), 1)
            .await;

        router.emit_cron_tick("t", 1).await;
        router.emit_cron_tick("t", 2).await;

        assert_eq!(router.stats().await.failed_deliveries, 1);
    }
}

//! Bounded event history.

use std::collections::VecDeque;

use seedbed_types::StimulusEvent;

/// Default number of events retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Circular buffer of recently routed events. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<StimulusEvent>,
    capacity: usize,
}

impl EventHistory {
    /// Create an empty history retaining at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, event: StimulusEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// The newest `limit` events in arrival order.
    pub fn recent(&self, limit: usize) -> Vec<StimulusEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of retained events.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

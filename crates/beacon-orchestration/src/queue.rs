//! Bounded FIFO for undeliverable events

use beacon_core::event::TelemetryEvent;
use metrics::counter;
use std::collections::VecDeque;
use tracing::warn;

/// Bounded FIFO holding events that could not be sent immediately. On
/// overflow the oldest entry is evicted, so the queue length never exceeds
/// the configured maximum.
pub struct EventQueue {
    entries: VecDeque<TelemetryEvent>,
    max_size: usize,
}

impl EventQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Append an event, returning the evicted oldest entry if the queue was
    /// full.
    pub fn push(&mut self, event: TelemetryEvent) -> Option<TelemetryEvent> {
        let evicted = if self.entries.len() >= self.max_size {
            self.entries.pop_front()
        } else {
            None
        };

        if let Some(dropped) = &evicted {
            warn!(kind = dropped.kind(), "Queue full; evicting oldest event");
            counter!("beacon.events.dropped", "reason" => "queue_overflow").increment(1);
        }

        self.entries.push_back(event);
        evicted
    }

    /// Remove and return all queued events in FIFO order.
    pub fn drain(&mut self) -> Vec<TelemetryEvent> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

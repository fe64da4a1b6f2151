//! Internal and external event queues, plus the delayed-event schedule.
//!
//! The macrostep loop always drains the internal queue before pulling from
//! the external one. Delayed events sit in a binary heap ordered by due
//! time, ties broken by insertion order; whenever the external queue is
//! pulled, every delayed event whose due time has passed is pumped onto it
//! first.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::time::Instant;

use statecharts_core::Event;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    internal: VecDeque<Event>,
    external: VecDeque<(u64, Event)>,
    delayed: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    cancel_id: Option<String>,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn push_internal(&mut self, event: Event) {
        debug!(event = %event.name, "queue internal event");
        self.internal.push_back(event);
    }

    /// Enqueue an external event, returning its sequence number so a caller
    /// can recognize it when it is dequeued.
    pub(crate) fn push_external(&mut self, event: Event) -> u64 {
        let seq = self.next_seq();
        debug!(event = %event.name, seq, "queue external event");
        self.external.push_back((seq, event));
        seq
    }

    pub(crate) fn pop_internal(&mut self) -> Option<Event> {
        self.internal.pop_front()
    }

    /// Pop the next external event that is due at `now`, pumping matured
    /// delayed events onto the external queue first.
    pub(crate) fn pop_external(&mut self, now: Instant) -> Option<(u64, Event)> {
        self.pump_due(now);
        self.external.pop_front()
    }

    pub(crate) fn schedule(&mut self, event: Event, due: Instant, cancel_id: Option<String>) {
        let seq = self.next_seq();
        debug!(event = %event.name, cancel_id = ?cancel_id, "schedule delayed event");
        self.delayed.push(Reverse(Scheduled {
            due,
            seq,
            cancel_id,
            event,
        }));
    }

    /// Remove an as-yet-unfired delayed event. Returns whether anything was
    /// cancelled; an already-fired id is a no-op.
    pub(crate) fn cancel(&mut self, cancel_id: &str) -> bool {
        let before = self.delayed.len();
        let kept: BinaryHeap<Reverse<Scheduled>> = self
            .delayed
            .drain()
            .filter(|Reverse(s)| s.cancel_id.as_deref() != Some(cancel_id))
            .collect();
        self.delayed = kept;
        self.delayed.len() != before
    }

    /// Due time of the earliest pending delayed event, if any. The async
    /// interpreter sleeps until this instant when only delayed events
    /// remain.
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.delayed.peek().map(|Reverse(s)| s.due)
    }

    fn pump_due(&mut self, now: Instant) {
        while self
            .delayed
            .peek()
            .is_some_and(|Reverse(s)| s.due <= now)
        {
            let Some(Reverse(s)) = self.delayed.pop() else {
                break;
            };
            let seq = self.next_seq();
            self.external.push_back((seq, s.event));
        }
    }
}

//! Discrete-event scheduler
//!
//! A single-threaded event queue over simulated time. Events are popped in
//! non-decreasing time order; events scheduled for the same instant pop in
//! the order they were scheduled. Every scheduled event gets an [`EventId`]
//! that can later cancel it.
//!
//! ```rust
//! use fso_core::scheduler::Scheduler;
//! use fso_core::types::SimTime;
//!
//! let mut sched = Scheduler::new();
//! sched.schedule_in(SimTime::from_nanos(20), "late");
//! let early = sched.schedule_in(SimTime::from_nanos(10), "early");
//! sched.cancel(early);
//!
//! let (time, _, event) = sched.pop().unwrap();
//! assert_eq!(event, "late");
//! assert_eq!(time, SimTime::from_nanos(20));
//! assert!(sched.pop().is_none());
//! ```

use crate::error::{FsoError, FsoResult};
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use tracing::trace;

/// Cancellation token for a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry<E> {
    time: SimTime,
    id: EventId,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; ids are issued in scheduling order
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Event queue keyed by simulated time
pub struct Scheduler<E> {
    now: SimTime,
    next_id: u64,
    queue: BinaryHeap<Entry<E>>,
    live: HashSet<EventId>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.live.len())
            .finish()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            next_id: 0,
            queue: BinaryHeap::new(),
            live: HashSet::new(),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of scheduled, uncancelled events
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Schedule `event` at absolute time `time`
    ///
    /// Scheduling in the past is rejected.
    pub fn schedule_at(&mut self, time: SimTime, event: E) -> FsoResult<EventId> {
        if time < self.now {
            return Err(FsoError::InvalidParameter {
                name: "schedule_time",
                value: time.as_secs_f64(),
                reason: "cannot schedule before the current simulated time",
            });
        }
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.queue.push(Entry { time, id, event });
        self.live.insert(id);
        trace!(target: "fso::scheduler", %id, %time, "event scheduled");
        Ok(id)
    }

    /// Schedule `event` after `delay` from now
    pub fn schedule_in(&mut self, delay: SimTime, event: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let time = self.now + delay;
        self.queue.push(Entry { time, id, event });
        self.live.insert(id);
        trace!(target: "fso::scheduler", %id, %time, "event scheduled");
        id
    }

    /// Cancel a pending event. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let removed = self.live.remove(&id);
        if removed {
            trace!(target: "fso::scheduler", %id, "event cancelled");
        }
        removed
    }

    /// Whether `id` is still pending
    pub fn is_pending(&self, id: EventId) -> bool {
        self.live.contains(&id)
    }

    /// Time of the next live event, if any
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.queue.peek().map(|e| e.time)
    }

    /// Move the clock forward to `time` without firing anything
    ///
    /// Fails if a live event is due before `time`; going backwards is a no-op.
    pub fn advance_to(&mut self, time: SimTime) -> FsoResult<()> {
        if let Some(next) = self.peek_time() {
            if next < time {
                return Err(FsoError::InvalidParameter {
                    name: "advance_time",
                    value: time.as_secs_f64(),
                    reason: "an event is due before the requested time",
                });
            }
        }
        if time > self.now {
            self.now = time;
        }
        Ok(())
    }

    /// Pop the next live event and advance simulated time to it
    pub fn pop(&mut self) -> Option<(SimTime, EventId, E)> {
        self.discard_cancelled();
        let entry = self.queue.pop()?;
        self.live.remove(&entry.id);
        self.now = entry.time;
        Some((entry.time, entry.id, entry.event))
    }

    fn discard_cancelled(&mut self) {
        while let Some(head) = self.queue.peek() {
            if self.live.contains(&head.id) {
                break;
            }
            self.queue.pop();
        }
    }
}

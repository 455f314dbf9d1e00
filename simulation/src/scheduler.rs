//! Discrete-event scheduler.
//!
//! Events are keyed by `(time, sequence)`: the earliest time runs first and
//! events sharing a time run in the order they were scheduled.

use {
    crate::message::Envelope,
    log::*,
    std::collections::BTreeMap,
    tendersim_consensus_bft::{NodeId, TimeoutEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// An envelope arriving at `to`.
    Deliver {
        from: NodeId,
        to: NodeId,
        envelope: Envelope,
    },
    /// A consensus timer of a validator.
    Timeout { node: NodeId, event: TimeoutEvent },
    /// A client's next sending round.
    ClientTick { client: NodeId },
    /// A late seed node joining the network.
    StartSeedNode { node: NodeId },
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BTreeMap<EventKey, SimEvent>,
    sequence: u64,
    now: u64,
    killed: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `event` once, `delay` ticks from now.
    pub fn schedule_once(&mut self, event: SimEvent, delay: u64) -> EventKey {
        self.sequence += 1;
        let key = EventKey {
            time: self.now.saturating_add(delay),
            sequence: self.sequence,
        };
        self.queue.insert(key, event);
        key
    }

    /// Current logical time: the time of the last popped event.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<u64> {
        if self.killed {
            return None;
        }
        self.queue.first_key_value().map(|(key, _)| key.time)
    }

    /// Remove the next event and advance the clock to it.
    pub fn pop_next(&mut self) -> Option<(EventKey, SimEvent)> {
        if self.killed {
            return None;
        }
        let (key, event) = self.queue.pop_first()?;
        self.now = key.time;
        Some((key, event))
    }

    /// Stop the scheduler. Pending events are discarded.
    pub fn kill(&mut self) {
        if !self.killed {
            debug!(
                "scheduler killed at {} with {} pending events",
                self.now,
                self.queue.len()
            );
        }
        self.killed = true;
        self.queue.clear();
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

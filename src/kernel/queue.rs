use std::collections::VecDeque;
use tracing::{debug, warn};

use super::event::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Queue length reached the batch size.
    Size,
    /// Periodic timer tick.
    Timer,
    /// Final flush issued by `stop()`.
    Shutdown,
    /// Explicit `flush()` call.
    Manual,
}

/// Snapshot of the queue handed to one transport attempt.
#[derive(Debug)]
pub struct Batch {
    id: u64,
    trigger: FlushTrigger,
    events: Vec<Envelope>,
}

impl Batch {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    pub fn events(&self) -> &[Envelope] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Flushing { batch_id: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    pub enqueued: u64,
    pub flush_attempts: u64,
    pub delivered_batches: u64,
    pub delivered_events: u64,
    pub failed_flushes: u64,
    pub dropped_events: u64,
}

/// Ordered in-memory holding area with the single in-flight guard.
///
/// Idle -> Flushing happens on `push` (size trigger) or `begin_flush`; the live
/// queue is swapped for an empty one and the snapshot leaves as a [`Batch`].
/// `complete` returns to Idle; a failed snapshot is put back in front of
/// anything enqueued since, so delivery order always equals enqueue order.
#[derive(Debug)]
pub struct EventQueue {
    live: VecDeque<Envelope>,
    state: QueueState,
    batch_size: usize,
    max_queued: Option<usize>,
    next_batch_id: u64,
    counters: QueueCounters,
}

impl EventQueue {
    pub fn new(batch_size: usize, max_queued: Option<usize>) -> Self {
        Self {
            live: VecDeque::new(),
            state: QueueState::Idle,
            batch_size: batch_size.max(1),
            max_queued,
            next_batch_id: 0,
            counters: QueueCounters::default(),
        }
    }

    /// Append. Returns the batch to deliver when the size trigger fires.
    pub fn push(&mut self, envelope: Envelope) -> Option<Batch> {
        self.live.push_back(envelope);
        self.counters.enqueued += 1;
        self.enforce_cap();

        if self.state == QueueState::Idle && self.live.len() >= self.batch_size {
            debug!(queued = self.live.len(), "batch size reached");
            return self.begin_flush(FlushTrigger::Size);
        }
        None
    }

    /// `None` when a flush is already in flight or there is nothing to send.
    pub fn begin_flush(&mut self, trigger: FlushTrigger) -> Option<Batch> {
        if self.is_flushing() || self.live.is_empty() {
            return None;
        }
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        self.state = QueueState::Flushing { batch_id: id };
        self.counters.flush_attempts += 1;

        let events: Vec<Envelope> = std::mem::take(&mut self.live).into();
        Some(Batch {
            id,
            trigger,
            events,
        })
    }

    pub fn complete(&mut self, batch: Batch, outcome: DeliveryOutcome) {
        match self.state {
            QueueState::Flushing { batch_id } if batch_id == batch.id => {}
            state => {
                warn!(batch = batch.id, ?state, "completion for a batch that is not in flight");
                return;
            }
        }
        self.state = QueueState::Idle;

        match outcome {
            DeliveryOutcome::Delivered => {
                self.counters.delivered_batches += 1;
                self.counters.delivered_events += batch.events.len() as u64;
            }
            DeliveryOutcome::Failed => {
                self.counters.failed_flushes += 1;
                let mut restored: VecDeque<Envelope> = batch.events.into();
                restored.append(&mut self.live);
                self.live = restored;
                self.enforce_cap();
            }
        }
    }

    /// Drop oldest events past the cap.
    fn enforce_cap(&mut self) {
        let Some(max) = self.max_queued else {
            return;
        };
        let excess = self.live.len().saturating_sub(max);
        if excess > 0 {
            self.live.drain(..excess);
            self.counters.dropped_events += excess as u64;
            warn!(dropped = excess, cap = max, "event queue over capacity, oldest events dropped");
        }
    }

    pub fn is_flushing(&self) -> bool {
        matches!(self.state, QueueState::Flushing { .. })
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.live.iter()
    }

    pub fn counters(&self) -> QueueCounters {
        self.counters
    }
}

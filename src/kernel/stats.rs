use super::queue::QueueCounters;

/// Point-in-time counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub enqueued: u64,
    pub sampled_out: u64,
    pub flush_attempts: u64,
    pub delivered_batches: u64,
    pub delivered_events: u64,
    pub failed_flushes: u64,
    pub dropped_events: u64,
    pub queued: usize,
    pub flushing: bool,
}

impl AgentStats {
    pub fn compute(counters: QueueCounters, sampled_out: u64, queued: usize, flushing: bool) -> Self {
        Self {
            enqueued: counters.enqueued,
            sampled_out,
            flush_attempts: counters.flush_attempts,
            delivered_batches: counters.delivered_batches,
            delivered_events: counters.delivered_events,
            failed_flushes: counters.failed_flushes,
            dropped_events: counters.dropped_events,
            queued,
            flushing,
        }
    }

    /// Events handed to the agent that have neither been delivered nor dropped.
    pub fn pending(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.delivered_events)
            .saturating_sub(self.dropped_events)
    }
}

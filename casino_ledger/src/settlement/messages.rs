//! Settlement worker message types.

use tokio::sync::oneshot;

/// Messages accepted by the [`SettlementActor`](super::SettlementActor)
#[derive(Debug)]
pub enum SettlementMessage {
    /// New work was enqueued
    Wake,

    /// Settle everything currently pending, then report
    Drain {
        response: oneshot::Sender<DrainReport>,
    },

    Shutdown,
}

/// Outcome of one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub settled: usize,
    /// Entries that errored and were left pending
    pub failed: usize,
}

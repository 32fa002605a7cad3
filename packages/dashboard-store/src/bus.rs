//! Broadcast of committed mutations.
//!
//! # Guarantees
//!
//! - **Commit order**: records are published while the state write lock is
//!   held, so `sequence` is strictly increasing on every receiver
//! - **At-most-once delivery**: slow receivers may miss records
//! - **No replay**: records published before `subscribe()` are not received
//!
//! The UI uses this to re-read getters after a commit instead of polling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::MutationId;

/// Default channel capacity for the commit bus.
const DEFAULT_CAPACITY: usize = 1024;

/// A mutation that has been applied to the state tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRecord {
    /// Position in the container's commit order, starting at 1.
    pub sequence: u64,
    /// Module whose state changed.
    pub module: &'static str,
    pub mutation: MutationId,
    pub committed_at: DateTime<Utc>,
}

/// Broadcast channel of [`CommitRecord`]s.
///
/// # Example
///
/// ```ignore
/// let mut commits = store.subscribe();
/// store.dispatch(ActionId::FetchAccounts, None).await?;
///
/// let record = commits.recv().await?;
/// assert_eq!(record.mutation, MutationId::SetAccount);
/// ```
#[derive(Clone)]
pub struct CommitBus {
    sender: broadcast::Sender<CommitRecord>,
}

impl CommitBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` records per slow receiver.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a record. Returns the number of receivers that got it.
    pub fn publish(&self, record: CommitRecord) -> usize {
        self.sender.send(record).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommitRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CommitBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommitBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64) -> CommitRecord {
        CommitRecord {
            sequence,
            module: "license",
            mutation: MutationId::SetLicense,
            committed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = CommitBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(record(1)), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.mutation, MutationId::SetLicense);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = CommitBus::new();
        assert_eq!(bus.publish(record(1)), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_records() {
        let bus = CommitBus::new();
        let mut early = bus.subscribe();
        bus.publish(record(1));

        let mut late = bus.subscribe();
        bus.publish(record(2));

        assert_eq!(early.recv().await.unwrap().sequence, 1);
        assert_eq!(early.recv().await.unwrap().sequence, 2);
        assert_eq!(late.recv().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_lagging_receiver_reports_skipped_records() {
        let bus = CommitBus::with_capacity(2);
        let mut receiver = bus.subscribe();

        for seq in 1..=4 {
            bus.publish(record(seq));
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(receiver.recv().await.unwrap().sequence, 3);
    }
}

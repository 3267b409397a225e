//! # Event Bus System
//!
//! Decoupled communication between engine components using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The engine emits a [`SyncEvent`] for every notable run transition. Hosts
//! subscribe to drive UI refreshes or external notifications without being
//! wired into the engine itself.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(SyncEvent::PullStarted {
//!         tenant_id: "tenant-1".to_string(),
//!         run_id: "run-1".to_string(),
//!     })
//!     .ok();
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber missed `n` events. Non-fatal; the
//!   subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: all senders dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted over the lifecycle of sync runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// An inbound (pull) run was dispatched.
    PullStarted {
        /// The tenant being synced.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
    },
    /// An inbound run finished successfully.
    PullCompleted {
        /// The tenant that was synced.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
        /// Number of records upserted.
        records_processed: u64,
    },
    /// An inbound run was dispatched but found nothing to do
    /// (tenant missing or sync disabled).
    PullSkipped {
        /// The tenant that was skipped.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
    },
    /// An inbound run failed after exhausting its retries.
    PullFailed {
        /// The tenant whose run failed.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
        /// Human-readable error message.
        message: String,
    },
    /// An outbound (push) drain was dispatched.
    PushStarted {
        /// The tenant being drained.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
    },
    /// An outbound drain finished.
    PushCompleted {
        /// The tenant that was drained.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
        /// Changes pushed successfully.
        pushed: u64,
        /// Changes that failed their attempt.
        failed: u64,
    },
    /// An outbound drain was dispatched but found nothing to do
    /// (tenant missing or sync disabled).
    PushSkipped {
        /// The tenant that was skipped.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
    },
    /// An outbound drain failed after exhausting its retries.
    PushFailed {
        /// The tenant whose drain failed.
        tenant_id: String,
        /// Identifier of this run.
        run_id: String,
        /// Human-readable error message.
        message: String,
    },
}

impl SyncEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SyncEvent::PullStarted { .. } => "Pull started",
            SyncEvent::PullCompleted { .. } => "Pull completed successfully",
            SyncEvent::PullSkipped { .. } => "Pull skipped",
            SyncEvent::PullFailed { .. } => "Pull failed",
            SyncEvent::PushStarted { .. } => "Push started",
            SyncEvent::PushCompleted { .. } => "Push completed",
            SyncEvent::PushSkipped { .. } => "Push skipped",
            SyncEvent::PushFailed { .. } => "Push failed",
        }
    }

    /// Whether this event marks a run failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SyncEvent::PullFailed { .. } | SyncEvent::PushFailed { .. }
        )
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to sync events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: SyncEvent) -> Result<usize, SendError<SyncEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_started(tenant: &str) -> SyncEvent {
        SyncEvent::PullStarted {
            tenant_id: tenant.to_string(),
            run_id: "run-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);

        // Should error when no subscribers
        assert!(bus.emit(pull_started("tenant-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = SyncEvent::PullCompleted {
            tenant_id: "tenant-1".to_string(),
            run_id: "run-1".to_string(),
            records_processed: 12,
        };
        bus.emit(event.clone()).ok();

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2); // Very small buffer
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(pull_started(&format!("tenant-{}", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_event_serialization() {
        let event = SyncEvent::PushCompleted {
            tenant_id: "tenant-1".to_string(),
            run_id: "run-9".to_string(),
            pushed: 49,
            failed: 1,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("run-9"));

        let deserialized: SyncEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}

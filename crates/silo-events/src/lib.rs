#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! In-process event bus for scan, link, and rehome progress and audit
//! (spec §9 "progress reporting").
//!
//! Built on `tokio::broadcast` with an in-memory replay ring, so a CLI
//! subcommand started after a scan began can still observe its recent
//! history instead of only events published after it subscribed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::error;

/// Identifier assigned to each event emitted by the toolkit.
pub type EventId = u64;

const DEFAULT_REPLAY_CAPACITY: usize = 512;

/// Typed domain events surfaced by the catalog, scanner, link planner, and
/// rehome planner/executor.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A device was registered or its identifier was renumbered.
    DeviceRegistered {
        /// Internal catalog id of the device.
        device_id: i64,
        /// Persistent filesystem UUID.
        fs_uuid: String,
    },
    /// A scan session started on a device.
    ScanStarted {
        /// Device being scanned.
        device_id: i64,
        /// Scan root relative path.
        relative_root: String,
    },
    /// A scan session reported incremental progress.
    ScanProgress {
        /// Device being scanned.
        device_id: i64,
        /// Files processed so far in this session.
        files_processed: u64,
        /// Bytes hashed so far in this session.
        bytes_hashed: u64,
    },
    /// A scan session finished.
    ScanCompleted {
        /// Device scanned.
        device_id: i64,
        /// Rows added.
        added: i64,
        /// Rows updated.
        updated: i64,
        /// Rows marked deleted.
        deleted: i64,
    },
    /// A scan session aborted with an error.
    ScanFailed {
        /// Device being scanned.
        device_id: i64,
        /// Error message.
        message: String,
    },
    /// A payload's manifest and identity were (re)computed.
    PayloadIndexed {
        /// Device the payload resides on.
        device_id: i64,
        /// Payload root, relative to the device.
        relative_root: String,
        /// Resolved payload hash, if every member had a full digest.
        payload_hash: Option<String>,
    },
    /// A hardlink dedup plan was computed.
    LinkPlanCreated {
        /// Plan name.
        plan_name: String,
        /// Number of actions in the plan.
        action_count: i64,
        /// Total bytes the plan projects to save.
        total_bytes_to_save: i64,
    },
    /// A single hardlink action completed, failed, or was skipped.
    LinkActionResolved {
        /// Owning plan name.
        plan_name: String,
        /// Duplicate path the action concerned.
        duplicate_path: String,
        /// Resulting status string (e.g. `completed`, `failed`, `skipped`).
        status: String,
    },
    /// A rehome plan was computed.
    RehomePlanned {
        /// Resolved decision string (`block`, `reuse`, `move`).
        decision: String,
        /// Payload hash the plan concerns, if known.
        payload_hash: Option<String>,
        /// Source device.
        source_device_id: i64,
    },
    /// A rehome plan began applying (pause/relocate/resume protocol).
    RehomeApplying {
        /// Audit run id.
        run_id: i64,
    },
    /// A rehome run completed successfully, spot-check included.
    RehomeCompleted {
        /// Audit run id.
        run_id: i64,
    },
    /// A rehome run failed and was rolled back.
    RehomeRolledBack {
        /// Audit run id.
        run_id: i64,
        /// Error message describing the failure.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator, used for CLI filtering and logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DeviceRegistered { .. } => "device_registered",
            Self::ScanStarted { .. } => "scan_started",
            Self::ScanProgress { .. } => "scan_progress",
            Self::ScanCompleted { .. } => "scan_completed",
            Self::ScanFailed { .. } => "scan_failed",
            Self::PayloadIndexed { .. } => "payload_indexed",
            Self::LinkPlanCreated { .. } => "link_plan_created",
            Self::LinkActionResolved { .. } => "link_action_resolved",
            Self::RehomePlanned { .. } => "rehome_planned",
            Self::RehomeApplying { .. } => "rehome_applying",
            Self::RehomeCompleted { .. } => "rehome_completed",
            Self::RehomeRolledBack { .. } => "rehome_rolled_back",
        }
    }
}

/// Metadata wrapper around events: a monotonic id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast/replay capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default in-memory buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a new event to the bus, assigning it a sequential identifier.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying any buffered events newer than
    /// `since_id`.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.lock_buffer();
            for item in buffer.iter().filter(|item| item.id > since) {
                backlog.push_back(item.clone());
            }
        }

        let receiver = self.sender.subscribe();
        EventStream { backlog, receiver }
    }

    /// Return the last assigned identifier, if any events have been
    /// published.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer mutex has been poisoned.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.lock_buffer();
        buffer.back().map(|event| event.id)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("event buffer mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper yielding events from the replay backlog first, then the
/// live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, draining the replay backlog first.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => self.receiver.recv().await.ok(),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_assigns_increasing_ids() {
        let bus = EventBus::new();
        let first = bus.publish(Event::ScanStarted {
            device_id: 1,
            relative_root: String::new(),
        });
        let second = bus.publish(Event::ScanCompleted {
            device_id: 1,
            added: 1,
            updated: 0,
            deleted: 0,
        });
        assert!(second > first);
        assert_eq!(bus.last_event_id(), Some(second));
    }

    #[tokio::test]
    async fn subscribe_replays_backlog_before_live_events() {
        let bus = EventBus::new();
        let first = bus.publish(Event::ScanStarted {
            device_id: 1,
            relative_root: String::new(),
        });

        let mut stream = bus.subscribe(Some(0));
        let replayed = stream.next().await.unwrap();
        assert_eq!(replayed.id, first);

        bus.publish(Event::ScanCompleted {
            device_id: 1,
            added: 1,
            updated: 0,
            deleted: 0,
        });
        let live = stream.next().await.unwrap();
        assert_eq!(live.event.kind(), "scan_completed");
    }

    #[test]
    fn event_kind_covers_every_variant() {
        let events = [
            Event::DeviceRegistered {
                device_id: 1,
                fs_uuid: "u".to_string(),
            },
            Event::ScanFailed {
                device_id: 1,
                message: "boom".to_string(),
            },
            Event::PayloadIndexed {
                device_id: 1,
                relative_root: "r".to_string(),
                payload_hash: None,
            },
            Event::LinkPlanCreated {
                plan_name: "p".to_string(),
                action_count: 1,
                total_bytes_to_save: 1,
            },
            Event::LinkActionResolved {
                plan_name: "p".to_string(),
                duplicate_path: "d".to_string(),
                status: "completed".to_string(),
            },
            Event::RehomePlanned {
                decision: "move".to_string(),
                payload_hash: None,
                source_device_id: 1,
            },
            Event::RehomeApplying { run_id: 1 },
            Event::RehomeCompleted { run_id: 1 },
            Event::RehomeRolledBack {
                run_id: 1,
                message: "m".to_string(),
            },
        ];
        for event in &events {
            assert!(!event.kind().is_empty());
        }
    }
}

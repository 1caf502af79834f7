//! Events delivered by the host and their extended lifetime.

use bytes::Bytes;
use reminders_common::RelayError;
use serde_json::Value as JsonValue;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{error, trace};

use crate::control::ReplyPort;
use crate::fetch::FetchRequest;
use crate::notification::NotificationInteraction;
use crate::subscription::SubscriptionOptions;

/// An event the host dispatches to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchRequest),
    Push {
        payload: Option<Bytes>,
    },
    NotificationClick(NotificationInteraction),
    NotificationClose(NotificationInteraction),
    Message {
        data: JsonValue,
        reply: Option<ReplyPort>,
    },
    PushSubscriptionChange {
        previous: Option<SubscriptionOptions>,
    },
    /// Uncaught error in the worker.
    Error {
        message: String,
    },
    /// Rejected promise nobody handled.
    UnhandledRejection {
        reason: String,
    },
}

/// Event kind, for logging and bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Push,
    NotificationClick,
    NotificationClose,
    Message,
    PushSubscriptionChange,
    Error,
    UnhandledRejection,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Push => "push",
            EventKind::NotificationClick => "notificationclick",
            EventKind::NotificationClose => "notificationclose",
            EventKind::Message => "message",
            EventKind::PushSubscriptionChange => "pushsubscriptionchange",
            EventKind::Error => "error",
            EventKind::UnhandledRejection => "unhandledrejection",
        }
    }
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Push { .. } => EventKind::Push,
            WorkerEvent::NotificationClick(_) => EventKind::NotificationClick,
            WorkerEvent::NotificationClose(_) => EventKind::NotificationClose,
            WorkerEvent::Message { .. } => EventKind::Message,
            WorkerEvent::PushSubscriptionChange { .. } => EventKind::PushSubscriptionChange,
            WorkerEvent::Error { .. } => EventKind::Error,
            WorkerEvent::UnhandledRejection { .. } => EventKind::UnhandledRejection,
        }
    }
}

/// Settled work of one event.
#[derive(Debug, Default)]
pub struct EventCompletion {
    pub settled: usize,
    pub failures: Vec<RelayError>,
}

impl EventCompletion {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Work registered against an event. The host keeps the worker alive until
/// [`ExtendableEvent::completed`] resolves.
pub struct ExtendableEvent {
    kind: EventKind,
    tasks: JoinSet<Result<(), RelayError>>,
}

impl std::fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("kind", &self.kind)
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl ExtendableEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            tasks: JoinSet::new(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Register work. Must be called from inside a tokio runtime.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<(), RelayError>> + Send + 'static,
    {
        trace!(event = self.kind.name(), "wait_until");
        self.tasks.spawn(work);
    }

    /// Work still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for all registered work.
    pub async fn completed(mut self) -> EventCompletion {
        let mut completion = EventCompletion::default();
        while let Some(joined) = self.tasks.join_next().await {
            completion.settled += 1;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(event = self.kind.name(), category = err.category(), error = %err, "Event work failed");
                    completion.failures.push(err);
                }
                Err(join_err) => {
                    error!(event = self.kind.name(), error = %join_err, "Event work panicked");
                    completion
                        .failures
                        .push(RelayError::internal(join_err.to_string()));
                }
            }
        }
        completion
    }
}

//! Event dispatch.
//!
//! One handler per [`EventKind`]. Fetch responses are produced inline; all
//! other asynchronous work is registered on the returned
//! [`ExtendableEvent`] so the host can keep the worker alive until it
//! settles.

use bytes::Bytes;
use reminders_common::RelayError;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::control::{plan_control, ControlAction, ControlMessage, ReplyPort, VersionReply};
use crate::event::{ExtendableEvent, WorkerEvent};
use crate::fetch::{FetchRequest, FetchResponse};
use crate::host::Host;
use crate::lifecycle::{CacheLifecycle, LifecycleState, LifecycleTracker};
use crate::notification::{
    InteractionRouter, NotificationDispatcher, NotificationInteraction, Normalizer, PlatformHint,
};
use crate::relay::now_millis;
use crate::router::RequestRouter;
use crate::subscription::{SubscriptionOptions, SubscriptionRotator};

/// Result of handing one event to the worker.
#[derive(Debug)]
pub struct HandledEvent {
    /// Set for fetch events only.
    pub response: Option<FetchResponse>,
    pub lifetime: ExtendableEvent,
}

struct Inner {
    config: WorkerConfig,
    host: Host,
    platform: PlatformHint,
    router: RequestRouter,
    lifecycle: CacheLifecycle,
    tracker: LifecycleTracker,
    normalizer: Normalizer,
    dispatcher: NotificationDispatcher,
    interactions: InteractionRouter,
    rotator: SubscriptionRotator,
}

/// The background agent. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ReminderWorker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ReminderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderWorker")
            .field("cache_name", &self.inner.config.cache_name)
            .field("platform", &self.inner.platform)
            .field("state", &self.inner.tracker.state())
            .finish()
    }
}

impl ReminderWorker {
    pub fn new(config: WorkerConfig, host: Host, platform: PlatformHint) -> Result<Self, RelayError> {
        config.validate()?;
        let lifecycle = CacheLifecycle::new(&config)?;
        let inner = Inner {
            router: RequestRouter::new(&config),
            lifecycle,
            tracker: LifecycleTracker::new(),
            normalizer: Normalizer::new(config.notification.clone()),
            dispatcher: NotificationDispatcher::new(),
            interactions: InteractionRouter::new(&config),
            rotator: SubscriptionRotator::new(config.subscribe_endpoint.clone()),
            platform,
            host,
            config,
        };
        info!(cache = %inner.config.cache_name, ?platform, "Worker created");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.tracker.state()
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.inner.tracker.skip_waiting_requested()
    }

    /// Dispatch one event.
    pub async fn handle(&self, event: WorkerEvent) -> HandledEvent {
        let mut lifetime = ExtendableEvent::new(event.kind());
        debug!(event = event.kind().name(), "Handling event");

        let response = match event {
            WorkerEvent::Install => {
                self.on_install(&mut lifetime);
                None
            }
            WorkerEvent::Activate => {
                self.on_activate(&mut lifetime);
                None
            }
            WorkerEvent::Fetch(request) => Some(self.on_fetch(request, &mut lifetime).await),
            WorkerEvent::Push { payload } => {
                self.on_push(payload, &mut lifetime);
                None
            }
            WorkerEvent::NotificationClick(interaction) => {
                self.on_notification_click(interaction, &mut lifetime);
                None
            }
            WorkerEvent::NotificationClose(interaction) => {
                self.inner.interactions.handle_close(&interaction);
                None
            }
            WorkerEvent::Message { data, reply } => {
                self.on_message(data, reply, &mut lifetime);
                None
            }
            WorkerEvent::PushSubscriptionChange { previous } => {
                self.on_subscription_change(previous, &mut lifetime);
                None
            }
            WorkerEvent::Error { message } => {
                error!(%message, "Uncaught worker error");
                None
            }
            WorkerEvent::UnhandledRejection { reason } => {
                error!(%reason, "Unhandled rejection in worker");
                None
            }
        };

        HandledEvent { response, lifetime }
    }

    /// Dispatch and wait for all registered work. Install failures surface
    /// as the returned error.
    pub async fn run(&self, event: WorkerEvent) -> Result<Option<FetchResponse>, RelayError> {
        let handled = self.handle(event).await;
        let mut completion = handled.lifetime.completed().await;
        match completion.failures.pop() {
            Some(err) => Err(err),
            None => Ok(handled.response),
        }
    }

    // ==================== Lifecycle ====================

    fn on_install(&self, lifetime: &mut ExtendableEvent) {
        let this = self.clone();
        lifetime.wait_until(async move {
            let inner = &this.inner;
            inner.tracker.transition(LifecycleState::Installing)?;

            let installed = inner
                .lifecycle
                .install(inner.host.cache.as_ref(), inner.host.network.as_ref())
                .await;
            if let Err(err) = installed {
                error!(error = %err, "Install failed");
                inner.tracker.transition(LifecycleState::Redundant)?;
                return Err(err.into());
            }

            inner.tracker.transition(LifecycleState::Installed)?;
            inner.tracker.request_skip_waiting();
            if let Err(err) = inner.host.scope.skip_waiting().await {
                warn!(error = %err, "skip_waiting after install failed");
            }
            Ok::<(), RelayError>(())
        });
    }

    fn on_activate(&self, lifetime: &mut ExtendableEvent) {
        let this = self.clone();
        lifetime.wait_until(async move {
            let inner = &this.inner;
            inner.tracker.transition(LifecycleState::Activating)?;

            let report = inner
                .lifecycle
                .activate(inner.host.cache.as_ref(), inner.host.clients.as_ref())
                .await;
            info!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                claimed = report.claimed,
                "Activated"
            );

            inner.tracker.transition(LifecycleState::Active)?;
            Ok::<(), RelayError>(())
        });
    }

    // ==================== Fetch ====================

    async fn on_fetch(&self, request: FetchRequest, lifetime: &mut ExtendableEvent) -> FetchResponse {
        let inner = &self.inner;
        let routed = inner
            .router
            .respond(&request, inner.host.cache.as_ref(), inner.host.network.as_ref())
            .await;

        if let Some((request, response)) = routed.write_back {
            let cache = inner.host.cache.clone();
            let cache_name = inner.router.cache_name().to_string();
            lifetime.wait_until(async move {
                if let Err(err) = cache.put(&cache_name, &request, &response).await {
                    warn!(url = %request.url, error = %err, "Failed to cache response");
                }
                Ok::<(), RelayError>(())
            });
        }

        routed.response
    }

    // ==================== Push ====================

    fn on_push(&self, payload: Option<Bytes>, lifetime: &mut ExtendableEvent) {
        let this = self.clone();
        lifetime.wait_until(async move {
            let inner = &this.inner;
            let now = now_millis();
            let descriptor = inner
                .normalizer
                .normalize(payload.as_deref(), inner.platform, now);
            inner
                .dispatcher
                .dispatch(
                    &descriptor,
                    inner.host.notifications.as_ref(),
                    inner.host.clients.as_ref(),
                    now,
                )
                .await;
            Ok::<(), RelayError>(())
        });
    }

    fn on_notification_click(&self, interaction: NotificationInteraction, lifetime: &mut ExtendableEvent) {
        let this = self.clone();
        lifetime.wait_until(async move {
            let inner = &this.inner;
            let outcome = inner
                .interactions
                .handle_click(
                    &interaction,
                    inner.host.notifications.as_ref(),
                    inner.host.clients.as_ref(),
                    now_millis(),
                )
                .await;
            debug!(?outcome, "Notification click handled");
            Ok::<(), RelayError>(())
        });
    }

    // ==================== Control ====================

    fn on_message(&self, data: JsonValue, reply: Option<ReplyPort>, lifetime: &mut ExtendableEvent) {
        let message = ControlMessage::from_value(data);
        let mut reply = reply;

        for action in plan_control(&message) {
            match action {
                ControlAction::SkipWaiting => {
                    self.inner.tracker.request_skip_waiting();
                    let scope = self.inner.host.scope.clone();
                    lifetime.wait_until(async move {
                        if let Err(err) = scope.skip_waiting().await {
                            warn!(error = %err, "skip_waiting failed");
                        }
                        Ok::<(), RelayError>(())
                    });
                }
                ControlAction::ReplyVersion => {
                    let version = VersionReply {
                        version: self.inner.config.cache_name.clone(),
                        app_type: self.inner.config.app_type.clone(),
                    };
                    match reply.take() {
                        Some(port) => {
                            let body = serde_json::to_value(&version).unwrap_or(JsonValue::Null);
                            if !port.send(body) {
                                warn!("Version reply dropped, client went away");
                            }
                        }
                        None => warn!("GET_VERSION without a reply port"),
                    }
                }
                ControlAction::SyncReminders => {
                    info!("Reminder sync requested");
                }
            }
        }
    }

    fn on_subscription_change(&self, previous: Option<SubscriptionOptions>, lifetime: &mut ExtendableEvent) {
        let this = self.clone();
        lifetime.wait_until(async move {
            let inner = &this.inner;
            let rotated = inner
                .rotator
                .rotate(
                    previous.as_ref(),
                    inner.host.push.as_ref(),
                    inner.host.network.as_ref(),
                )
                .await;
            match rotated {
                Ok(subscription) => {
                    info!(endpoint = %subscription.endpoint, "Push subscription rotated");
                    Ok::<(), RelayError>(())
                }
                Err(err) => {
                    error!(error = %err, "Push subscription rotation failed");
                    Err(err.into())
                }
            }
        });
    }
}

// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client sessions and their startup state machine.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::RegistryError;
use crate::lsp::{DocumentSelector, LanguageClient, LspResult, ServerNotification};
use crate::workspace::WorkspaceFolder;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::{SessionEvent, GLOBAL_METRICS};

use super::notifier::Subscription;

/// Identity of a session in the routing table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingKey {
    /// The folder-less session used when no workspace folder is open.
    Default,
    /// An outermost folder URI (without trailing `/`).
    Folder(String),
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Folder(uri) => write!(f, "{}", uri),
        }
    }
}

/// Settled state of the latest start or restart attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Ready,
    Failed(String),
}

impl SessionState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone)]
struct Attempt {
    generation: u64,
    state: SessionState,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Lifecycle {
    Start,
    Restart,
}

/// One language server connection owned by the registry.
pub struct ClientSession {
    key: RoutingKey,
    client: Arc<dyn LanguageClient>,
    selector: DocumentSelector,
    folder: Option<WorkspaceFolder>,
    attempt: watch::Sender<Attempt>,
    /// Latest lifecycle task; each new one waits for its predecessor.
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ClientSession {
    pub(crate) fn new(
        key: RoutingKey,
        client: Arc<dyn LanguageClient>,
        selector: DocumentSelector,
        folder: Option<WorkspaceFolder>,
    ) -> Arc<Self> {
        let (attempt, _) = watch::channel(Attempt {
            generation: 0,
            state: SessionState::Pending,
        });
        Arc::new(Self {
            key,
            client,
            selector,
            folder,
            attempt,
            task: Mutex::new(None),
            disposed: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn key(&self) -> &RoutingKey {
        &self.key
    }

    /// The client handle, whether or not it has finished starting.
    pub fn client(&self) -> Arc<dyn LanguageClient> {
        Arc::clone(&self.client)
    }

    pub fn selector(&self) -> &DocumentSelector {
        &self.selector
    }

    pub fn folder(&self) -> Option<&WorkspaceFolder> {
        self.folder.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.attempt.borrow().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Number of start/restart attempts begun so far.
    pub fn generation(&self) -> u64 {
        self.attempt.borrow().generation
    }

    /// Suspend until the latest attempt settles.
    pub async fn wait_until_ready(&self) -> Result<Arc<dyn LanguageClient>, RegistryError> {
        let mut rx = self.attempt.subscribe();
        let settled = rx
            .wait_for(|a| a.state.is_settled())
            .await
            .map_err(|_| RegistryError::Disposed(self.key.to_string()))?
            .state
            .clone();

        match settled {
            SessionState::Ready => Ok(self.client()),
            SessionState::Failed(message) => Err(RegistryError::StartupFailed {
                key: self.key.to_string(),
                message,
            }),
            SessionState::Pending => Err(RegistryError::Disposed(self.key.to_string())),
        }
    }

    pub(crate) fn add_subscription(&self, subscription: Subscription) {
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.push(subscription);
        }
    }

    pub(crate) fn dispose_subscriptions(&self) {
        let subs = match self.subscriptions.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for sub in subs {
            sub.dispose();
        }
    }

    /// Start forwarding server notifications to the log.
    pub(crate) fn forward_notifications(&self) {
        let mut rx = self.client.subscribe_notifications();
        let key = self.key.to_string();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => log_notification(&key, &notification),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(session = %key, skipped = n, "Notification forwarder lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.add_subscription(Subscription::from_task(handle));
    }

    /// Begin a new attempt running `op` once every earlier lifecycle task
    /// has finished. Returns `false` if the session was already disposed.
    pub(crate) fn run_lifecycle<F, Fut>(self: &Arc<Self>, kind: Lifecycle, op: F) -> bool
    where
        F: FnOnce(Arc<dyn LanguageClient>) -> Fut + Send + 'static,
        Fut: Future<Output = LspResult<()>> + Send + 'static,
    {
        let mut slot = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.disposed.load(Ordering::SeqCst) {
            return false;
        }

        let mut generation = 0;
        self.attempt.send_modify(|a| {
            a.generation += 1;
            a.state = SessionState::Pending;
            generation = a.generation;
        });

        let previous = slot.take();
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let started = Instant::now();
            let result = op(session.client()).await;
            session.settle(kind, generation, result, started.elapsed());
        });
        *slot = Some(handle);
        true
    }

    fn settle(&self, kind: Lifecycle, generation: u64, result: LspResult<()>, elapsed: Duration) {
        let state = match &result {
            Ok(()) => {
                info!(session = %self.key, ?kind, elapsed_ms = elapsed.as_millis() as u64, "Language client ready");
                #[cfg(feature = "telemetry")]
                {
                    let event = match kind {
                        Lifecycle::Start => SessionEvent::Started,
                        Lifecycle::Restart => SessionEvent::Restarted,
                    };
                    GLOBAL_METRICS.record_session(event);
                    GLOBAL_METRICS.record_operation("session.startup", elapsed);
                }
                SessionState::Ready
            }
            Err(e) => {
                error!(session = %self.key, ?kind, error = %e, "Language client failed to start");
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_session(match kind {
                    Lifecycle::Start => SessionEvent::StartFailed,
                    Lifecycle::Restart => SessionEvent::RestartFailed,
                });
                SessionState::Failed(e.to_string())
            }
        };

        let applied = self.attempt.send_if_modified(|a| {
            if a.generation == generation {
                a.state = state;
                true
            } else {
                false
            }
        });
        if !applied {
            debug!(session = %self.key, generation, "Discarding stale attempt result");
        }
    }

    /// Wait for pending lifecycle work, then stop the client. Errors and
    /// timeouts are logged and swallowed.
    pub(crate) async fn shutdown(&self, timeout: Duration) {
        let pending = {
            let mut slot = match self.task.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.disposed.store(true, Ordering::SeqCst);
            slot.take()
        };

        if let Some(handle) = pending {
            if let Err(e) = handle.await {
                warn!(session = %self.key, error = %e, "Startup task ended abnormally");
            }
        }

        match tokio::time::timeout(timeout, self.client.stop()).await {
            Ok(Ok(())) => {
                info!(session = %self.key, "Language client stopped");
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_session(SessionEvent::Disposed);
            }
            Ok(Err(e)) => {
                warn!(session = %self.key, error = %e, "Language client failed to stop");
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_session(SessionEvent::TeardownFailed);
            }
            Err(_) => {
                warn!(session = %self.key, timeout_ms = timeout.as_millis() as u64, "Language client stop timed out");
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_session(SessionEvent::TeardownFailed);
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("key", &self.key)
            .field("client", &self.client.name())
            .field("state", &self.state())
            .finish()
    }
}

fn log_notification(session: &str, notification: &ServerNotification) {
    match (notification.message_text(), notification.message_type()) {
        (Some(text), Some(1)) => error!(session, "{}", text),
        (Some(text), Some(2)) => warn!(session, "{}", text),
        (Some(text), Some(3)) => info!(session, "{}", text),
        (Some(text), _) => debug!(session, "{}", text),
        (None, _) => trace!(session, method = %notification.method, "Server notification"),
    }
}

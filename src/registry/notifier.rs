// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Change notification for the routing table.

use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Multicast "routing table changed" event.
///
/// Listeners are invoked synchronously, in subscription order, after the
/// registry has committed a change. They receive no payload: consumers
/// re-query the registry.
#[derive(Default, Clone)]
pub struct ChangeNotifier {
    listeners: Arc<Mutex<Listeners>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped or disposed.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = match self.listeners.lock() {
            Ok(mut guard) => {
                let id = guard.next_id;
                guard.next_id += 1;
                guard.entries.push((id, Arc::new(listener)));
                id
            }
            Err(_) => return Subscription::empty(),
        };

        let weak: Weak<Mutex<Listeners>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                if let Ok(mut guard) = listeners.lock() {
                    guard.entries.retain(|(entry_id, _)| *entry_id != id);
                }
            }
        })
    }

    /// Invoke every listener.
    pub fn notify(&self) {
        // Snapshot first so listeners may (un)subscribe from inside a callback.
        let snapshot: Vec<Listener> = match self.listeners.lock() {
            Ok(guard) => guard.entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            Err(_) => return,
        };
        for listener in snapshot {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .map(|guard| guard.entries.len())
            .unwrap_or(0)
    }
}

/// A disposable registration. Disposal runs at most once, on
/// [`Subscription::dispose`] or on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { dispose: None }
    }

    /// Subscription that aborts a background task.
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self::new(move || handle.abort())
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(notifier: &ChangeNotifier) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = notifier.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let notifier = ChangeNotifier::new();
        let (a, _sa) = counter(&notifier);
        let (b, _sb) = counter(&notifier);

        notifier.notify();
        notifier.notify();

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispose_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let (count, sub) = counter(&notifier);
        assert_eq!(notifier.listener_count(), 1);

        sub.dispose();
        notifier.notify();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = ChangeNotifier::new();
        {
            let (_count, _sub) = counter(&notifier);
            assert_eq!(notifier.listener_count(), 1);
        }
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_notify() {
        let notifier = ChangeNotifier::new();
        let inner = notifier.clone();
        let held = Arc::new(Mutex::new(Vec::new()));
        let held_clone = Arc::clone(&held);
        let _sub = notifier.subscribe(move || {
            let sub = inner.subscribe(|| {});
            held_clone.lock().unwrap().push(sub);
        });

        notifier.notify();
        assert_eq!(notifier.listener_count(), 2);
    }

    #[test]
    fn test_subscription_outlives_notifier() {
        let notifier = ChangeNotifier::new();
        let (_count, sub) = counter(&notifier);
        drop(notifier);
        sub.dispose();
    }

    #[tokio::test]
    async fn test_task_subscription_aborts() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });

        Subscription::from_task(handle).dispose();
        assert!(rx.await.is_err());
    }
}

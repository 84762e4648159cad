//! In-process signal bus
//!
//! Replaces the DOM CustomEvent mechanism of the web UI: parts of the
//! program with no shared ancestor (the batch action path, per-service
//! watchers) broadcast refresh and task-created signals to each other.
//! Delivery is synchronous; a subscription deregisters when dropped.

use dockhand_api::ServiceKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

/// Signals carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A service's data changed; anything displaying it should refetch.
    ServiceRefresh { key: ServiceKey },
    /// An update task was just created covering these services.
    TaskCreated {
        stack_name: String,
        service_names: Vec<String>,
    },
}

impl Signal {
    pub fn refresh(key: ServiceKey) -> Self {
        Self::ServiceRefresh { key }
    }

    pub fn task_created(stack_name: impl Into<String>, service_names: Vec<String>) -> Self {
        Self::TaskCreated {
            stack_name: stack_name.into(),
            service_names,
        }
    }

    /// Whether this signal addresses the given service.
    pub fn concerns(&self, key: &ServiceKey) -> bool {
        match self {
            Self::ServiceRefresh { key: signalled } => signalled == key,
            Self::TaskCreated {
                stack_name,
                service_names,
            } => {
                *stack_name == key.stack_name
                    && service_names
                        .iter()
                        .any(|service| *service == key.service_name)
            }
        }
    }
}

type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

/// Process-wide broadcast primitive. Owners share it behind an `Arc`.
#[derive(Default)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler)>>,
}

/// Keeps a handler registered; dropping it deregisters.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.handlers
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every published signal.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap()
            .push((id, Arc::new(handler)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Adapter for async consumers: published signals are forwarded into an
    /// unbounded channel for the lifetime of the subscription.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Signal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |signal| {
            let _ = tx.send(signal.clone());
        });
        (subscription, rx)
    }

    /// Deliver `signal` to every live subscriber before returning.
    ///
    /// Handlers run outside the internal lock, so a handler may publish or
    /// subscribe re-entrantly. Delivery order across subscribers is
    /// unspecified.
    pub fn publish(&self, signal: &Signal) {
        let handlers: Vec<Handler> = self
            .inner
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(signal);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = SignalBus::new();
        let seen_a = Arc::new(AtomicUsize::new(0));
        let seen_b = Arc::new(AtomicUsize::new(0));

        let a = seen_a.clone();
        let _sub_a = bus.subscribe(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = seen_b.clone();
        let _sub_b = bus.subscribe(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&Signal::refresh(ServiceKey::new("web", "app")));

        // Synchronous delivery: both saw it before publish returned
        assert_eq!(seen_a.load(Ordering::SeqCst), 1);
        assert_eq!(seen_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_deregisters() {
        let bus = SignalBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        let sub = bus.subscribe(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(&Signal::refresh(ServiceKey::new("web", "app")));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_publish_re_entrantly() {
        let bus = Arc::new(SignalBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        let s = seen.clone();
        let _relay = bus.subscribe(move |signal| {
            s.fetch_add(1, Ordering::SeqCst);
            // Relay a refresh once for every task-created signal
            if let Signal::TaskCreated { stack_name, .. } = signal {
                inner_bus.publish(&Signal::refresh(ServiceKey::new(stack_name, "app")));
            }
        });

        bus.publish(&Signal::task_created("web", vec!["app".to_string()]));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_channel_adapter() {
        let bus = SignalBus::new();
        let (sub, mut rx) = bus.subscribe_channel();

        let signal = Signal::task_created("web", vec!["app".to_string(), "db".to_string()]);
        bus.publish(&signal);
        assert_eq!(rx.recv().await, Some(signal));

        drop(sub);
        bus.publish(&Signal::refresh(ServiceKey::new("web", "app")));
        assert!(rx.recv().await.is_none(), "channel closes with subscription");
    }

    #[test]
    fn test_concerns_matches_named_services_only() {
        let created = Signal::task_created("web", vec!["app".to_string(), "db".to_string()]);
        assert!(created.concerns(&ServiceKey::new("web", "app")));
        assert!(created.concerns(&ServiceKey::new("web", "db")));
        assert!(!created.concerns(&ServiceKey::new("web", "cache")));
        assert!(!created.concerns(&ServiceKey::new("media", "app")));

        let refresh = Signal::refresh(ServiceKey::new("web", "app"));
        assert!(refresh.concerns(&ServiceKey::new("web", "app")));
        assert!(!refresh.concerns(&ServiceKey::new("web", "db")));
    }
}

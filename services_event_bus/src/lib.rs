//! # Event Bus
//!
//! Named publish/subscribe for the shell and its extensions.
//!
//! ## Philosophy
//!
//! - **Many listeners per event**: Subscribing never replaces an earlier subscriber
//! - **Failures stay local**: A failing or panicking subscriber is logged and skipped
//! - **Snapshot delivery**: An emit delivers to the subscribers present when it started
//!
//! Delivery is synchronous and in subscription order for a single event
//! name. Nothing is ordered across different names, and nothing persists.

use core_types::{HandlerError, HandlerResult};
use lifecycle::run_guarded;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Subscriber callback
pub type EventCallback = Rc<dyn Fn(&Value) -> HandlerResult>;

/// Identifies one subscription for [`EventBus::off`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Outcome of one emit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Subscribers that returned `Ok`
    pub delivered: usize,
    /// Subscribers that returned `Err` or panicked
    pub failed: usize,
}

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    by_event: BTreeMap<String, Vec<(SubscriptionId, EventCallback)>>,
}

/// In-memory event bus
///
/// Share it behind an `Rc`; all methods take `&self` and subscribers may
/// subscribe, unsubscribe or emit from inside a callback.
#[derive(Default)]
pub struct EventBus {
    subs: RefCell<Subscriptions>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event`
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&Value) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        let mut subs = self.subs.borrow_mut();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.by_event
            .entry(event.into())
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Removes a subscription; returns whether it existed
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut subs = self.subs.borrow_mut();
        let Some(list) = subs.by_event.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subs.by_event.remove(event);
        }
        removed
    }

    /// Delivers `payload` to every current subscriber of `event`
    pub fn emit(&self, event: &str, payload: &Value) -> EmitReport {
        let snapshot: Vec<(SubscriptionId, EventCallback)> = self
            .subs
            .borrow()
            .by_event
            .get(event)
            .cloned()
            .unwrap_or_default();

        if snapshot.is_empty() {
            debug!(event, "emit with no subscribers");
        }

        let mut report = EmitReport::default();
        for (id, callback) in snapshot {
            match run_guarded(|| callback(payload)) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    log_failure(event, id, &err);
                }
                Err(panic) => {
                    report.failed += 1;
                    log_failure(event, id, &HandlerError::new(panic.to_string()));
                }
            }
        }
        report
    }

    /// Number of subscribers for `event`
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subs
            .borrow()
            .by_event
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drops every subscriber of `event`
    pub fn clear(&self, event: &str) {
        let removed = self.subs.borrow_mut().by_event.remove(event);
        drop(removed);
    }
}

fn log_failure(event: &str, id: SubscriptionId, err: &HandlerError) {
    warn!(event, subscription = %id, error = %err, "event subscriber failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> impl Fn(&Value) -> HandlerResult {
        let log = log.clone();
        move |payload| {
            log.borrow_mut().push(format!("{}:{}", tag, payload));
            Ok(())
        }
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on("tabSelected", recorder(&log, "a"));
        bus.on("tabSelected", recorder(&log, "b"));
        bus.on("other", recorder(&log, "c"));

        let report = bus.emit("tabSelected", &json!(1));
        assert_eq!(report, EmitReport { delivered: 2, failed: 0 });
        assert_eq!(*log.borrow(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nobody", &Value::Null), EmitReport::default());
    }

    #[test]
    fn test_off_removes_only_that_subscription() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = bus.on("e", recorder(&log, "a"));
        bus.on("e", recorder(&log, "b"));

        assert!(bus.off("e", a));
        assert!(!bus.off("e", a));
        assert!(!bus.off("missing", a));
        bus.emit("e", &json!("x"));
        assert_eq!(*log.borrow(), vec!["b:\"x\""]);
        assert_eq!(bus.subscriber_count("e"), 1);
    }

    #[test]
    fn test_failing_and_panicking_subscribers_do_not_block_others() {
        let bus = EventBus::new();
        let reached = Rc::new(Cell::new(false));

        bus.on("e", |_| Err(HandlerError::new("bad state")));
        bus.on("e", |_| panic!("subscriber exploded"));
        let r = reached.clone();
        bus.on("e", move |_| {
            r.set(true);
            Ok(())
        });

        let report = bus.emit("e", &Value::Null);
        assert_eq!(report, EmitReport { delivered: 1, failed: 2 });
        assert!(reached.get());
    }

    #[test]
    fn test_subscribe_during_emit_takes_effect_next_emit() {
        let bus = Rc::new(EventBus::new());
        let count = Rc::new(Cell::new(0));

        let inner_bus = Rc::downgrade(&bus);
        let c = count.clone();
        bus.on("e", move |_| {
            if let Some(bus) = inner_bus.upgrade() {
                let c = c.clone();
                bus.on("e", move |_| {
                    c.set(c.get() + 1);
                    Ok(())
                });
            }
            Ok(())
        });

        assert_eq!(bus.emit("e", &Value::Null).delivered, 1);
        assert_eq!(count.get(), 0);
        bus.emit("e", &Value::Null);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_unsubscribe_during_emit_still_delivers_snapshot() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(Cell::new(None));

        let b = Rc::downgrade(&bus);
        let s = second.clone();
        bus.on("e", move |_| {
            if let (Some(bus), Some(id)) = (b.upgrade(), s.get()) {
                bus.off("e", id);
            }
            Ok(())
        });
        second.set(Some(bus.on("e", recorder(&log, "second"))));

        bus.emit("e", &json!(1));
        bus.emit("e", &json!(2));
        assert_eq!(*log.borrow(), vec!["second:1"]);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        bus.on("e", |_| Ok(()));
        bus.on("e", |_| Ok(()));
        assert_eq!(bus.subscriber_count("e"), 2);
        bus.clear("e");
        assert_eq!(bus.subscriber_count("e"), 0);
    }
}

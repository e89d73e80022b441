//! Subscription registry
//!
//! Holds exactly one subscription per named event for the lifetime of a
//! session. Subscribing twice is a no-op, a reconnect reuses the same set, and
//! teardown drops everything at once.

use std::collections::BTreeSet;

use plansync_domain::{EventKind, Result};
use serde_json::Value;
use tracing::{debug, trace};

use super::InboundEvent;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: BTreeSet<EventKind>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when `kind` was already subscribed.
    pub fn subscribe(&mut self, kind: EventKind) -> bool {
        let added = self.active.insert(kind);
        if added {
            debug!(event = %kind, "Subscribed");
        }
        added
    }

    /// Subscribe to every event the session consumes; returns how many were
    /// new.
    pub fn subscribe_all(&mut self) -> usize {
        EventKind::ALL.into_iter().filter(|kind| self.subscribe(*kind)).count()
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.active.contains(&kind)
    }

    /// Event names to register with the transport.
    pub fn targets(&self) -> Vec<&'static str> {
        self.active.iter().map(EventKind::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop every subscription and return what was active.
    pub fn teardown(&mut self) -> Vec<EventKind> {
        let dropped: Vec<EventKind> = std::mem::take(&mut self.active).into_iter().collect();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Subscriptions torn down");
        }
        dropped
    }

    /// Route one transport message. `Ok(None)` for names nobody subscribed to.
    ///
    /// # Errors
    /// `PlanSyncError::MalformedMessage` for a subscribed event whose payload
    /// does not decode.
    pub fn route(&self, target: &str, payload: Value) -> Result<Option<InboundEvent>> {
        let Some(kind) = target.parse::<EventKind>().ok().filter(|kind| self.is_subscribed(*kind))
        else {
            trace!(event_name = target, "Ignoring message without subscription");
            return Ok(None);
        };
        InboundEvent::decode(kind, payload).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subscribing_twice_keeps_one_subscription() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(registry.subscribe_all(), 7);
        assert_eq!(registry.subscribe_all(), 0);
        assert!(!registry.subscribe(EventKind::VoteActivity));
        assert_eq!(registry.len(), 7);
        assert!(registry.targets().contains(&"lockActivity"));
    }

    #[test]
    fn teardown_stops_routing() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe_all();
        let payload = json!({"id": "2025-01-01", "byUser": "bob"});
        assert!(registry.route("dateAdded", payload.clone()).unwrap().is_some());

        assert_eq!(registry.teardown().len(), 7);
        assert!(registry.is_empty());
        assert!(registry.route("dateAdded", payload).unwrap().is_none());
    }

    #[test]
    fn unknown_targets_are_ignored_and_bad_payloads_fail() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(EventKind::ActivityAdded);
        assert!(registry.route("planRenamed", json!({})).unwrap().is_none());
        assert!(registry.route("dateAdded", json!({})).unwrap().is_none());
        assert!(registry.route("activityAdded", json!({"id": "x"})).is_err());
    }
}

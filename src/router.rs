use crate::lock;
use crate::protocol::Response;
use crate::types::{IndexPath, NodeId};
use crate::value::ControlValue;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Callback invoked with the device key and the response's `value` sub-tree
pub type ResponseCallback = Arc<dyn Fn(&str, &ControlValue) + Send + Sync>;

/// (instance tag, attribute, index path) triple a response is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub instance_tag: String,
    pub attribute: String,
    pub index_path: IndexPath,
}

impl RouteKey {
    pub fn new(
        instance_tag: impl Into<String>,
        attribute: impl Into<String>,
        index_path: IndexPath,
    ) -> Self {
        Self {
            instance_tag: instance_tag.into(),
            attribute: attribute.into(),
            index_path,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.instance_tag, self.attribute, self.index_path)
    }
}

/// Identity and liveness of whoever registered a callback
///
/// Once retired, callbacks registered under this owner are never invoked again.
#[derive(Debug, Clone)]
pub struct Owner {
    id: NodeId,
    alive: Arc<AtomicBool>,
}

impl Owner {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the owner dead. Returns `false` if it already was.
    pub fn retire(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of routing one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A callback received the value
    Delivered,
    /// A registration matched but the response carried no value
    Acknowledged,
    /// Nothing is registered for the key
    Unregistered,
    /// The matching registration belongs to a disposed node
    Stale,
}

#[derive(Clone)]
struct Registration {
    owner: Owner,
    callback: ResponseCallback,
    issued: Instant,
}

#[derive(Default)]
struct Entry {
    subscription: Option<Registration>,
    pending: VecDeque<Registration>,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.subscription.is_none() && self.pending.is_empty()
    }
}

enum Lookup {
    Missing,
    Stale,
    Found(ResponseCallback),
}

/// Correlates responses with outstanding requests and active subscriptions
///
/// The registration map is locked only while looking up or mutating entries.
/// Callbacks run after the lock is released, so they may issue new commands
/// and register new callbacks.
pub struct ResponseRouter {
    device: String,
    entries: Mutex<HashMap<RouteKey, Entry>>,
}

impl ResponseRouter {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a callback for a key
    ///
    /// One-shot registrations queue behind each other and are consumed by
    /// replies in order. A persistent registration replaces any existing
    /// subscription for the same key.
    pub fn register(&self, key: RouteKey, owner: &Owner, callback: ResponseCallback, one_shot: bool) {
        let registration = Registration {
            owner: owner.clone(),
            callback,
            issued: Instant::now(),
        };

        let mut entries = lock(&self.entries);
        let entry = entries.entry(key).or_default();
        if one_shot {
            entry.pending.push_back(registration);
        } else {
            entry.subscription = Some(registration);
        }
    }

    /// Drop the subscription for a key. Returns whether one existed.
    pub fn unsubscribe(&self, key: &RouteKey) -> bool {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let removed = entry.subscription.take().is_some();
        if entry.is_empty() {
            entries.remove(key);
        }
        removed
    }

    /// Drop every registration belonging to an owner
    pub fn remove_owner(&self, owner: NodeId) -> usize {
        let mut removed = 0;
        let mut entries = lock(&self.entries);
        for entry in entries.values_mut() {
            if entry
                .subscription
                .as_ref()
                .is_some_and(|registration| registration.owner.id() == owner)
            {
                entry.subscription = None;
                removed += 1;
            }
            let before = entry.pending.len();
            entry.pending.retain(|registration| registration.owner.id() != owner);
            removed += before - entry.pending.len();
        }
        entries.retain(|_, entry| !entry.is_empty());
        removed
    }

    /// Forget everything, e.g. after the transport dropped
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Drop one-shot registrations that have waited longer than `max_age`
    pub fn prune_expired(&self, max_age: Duration) -> usize {
        let mut expired = 0;
        let mut entries = lock(&self.entries);
        for (key, entry) in entries.iter_mut() {
            let before = entry.pending.len();
            entry
                .pending
                .retain(|registration| registration.issued.elapsed() < max_age);
            let dropped = before - entry.pending.len();
            if dropped > 0 {
                tracing::warn!("{} request(s) for {} went unanswered", dropped, key);
                expired += dropped;
            }
        }
        entries.retain(|_, entry| !entry.is_empty());
        expired
    }

    pub fn is_subscribed(&self, key: &RouteKey) -> bool {
        lock(&self.entries)
            .get(key)
            .is_some_and(|entry| entry.subscription.is_some())
    }

    /// Number of one-shot registrations waiting on a key
    pub fn pending(&self, key: &RouteKey) -> usize {
        lock(&self.entries)
            .get(key)
            .map_or(0, |entry| entry.pending.len())
    }

    /// Keys with an active subscription, sorted
    pub fn subscriptions(&self) -> Vec<RouteKey> {
        let mut keys: Vec<RouteKey> = lock(&self.entries)
            .iter()
            .filter(|(_, entry)| entry.subscription.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Route one response to its registration
    ///
    /// Replies consume the oldest one-shot registration for the key and fall
    /// back to the subscription; published feedback only reaches the
    /// subscription.
    pub fn dispatch(&self, response: &Response) -> DispatchOutcome {
        let key = response.key();

        let lookup = {
            let mut entries = lock(&self.entries);
            match entries.get_mut(&key) {
                None => Lookup::Missing,
                Some(entry) => {
                    let from_pending = if response.publish {
                        None
                    } else {
                        entry.pending.pop_front()
                    };
                    let registration = match from_pending {
                        Some(registration) => Some(registration),
                        None => entry.subscription.clone(),
                    };

                    let lookup = match registration {
                        None => Lookup::Missing,
                        Some(registration) if !registration.owner.is_alive() => {
                            if entry
                                .subscription
                                .as_ref()
                                .is_some_and(|current| current.owner.id() == registration.owner.id())
                            {
                                entry.subscription = None;
                            }
                            Lookup::Stale
                        }
                        Some(registration) => Lookup::Found(registration.callback),
                    };

                    if entry.is_empty() {
                        entries.remove(&key);
                    }
                    lookup
                }
            }
        };

        match lookup {
            Lookup::Missing => {
                tracing::trace!("Dropping unregistered response for {}", key);
                DispatchOutcome::Unregistered
            }
            Lookup::Stale => {
                tracing::debug!("Dropping response for disposed node at {}", key);
                DispatchOutcome::Stale
            }
            Lookup::Found(callback) => match &response.value {
                Some(value) => {
                    callback(&self.device, value);
                    DispatchOutcome::Delivered
                }
                None => {
                    tracing::trace!("Acknowledged {}", key);
                    DispatchOutcome::Acknowledged
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn key(attribute: &str, index: u32) -> RouteKey {
        RouteKey::new("AEC1", attribute, IndexPath::from([index]))
    }

    fn counter() -> (Arc<AtomicUsize>, ResponseCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let callback: ResponseCallback = Arc::new(move |_: &str, _: &ControlValue| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (hits, callback)
    }

    #[test]
    fn one_shot_is_removed_after_dispatch() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (hits, callback) = counter();
        router.register(key("gain", 1), &owner, callback, true);

        let reply = Response::reply(&key("gain", 1), 3.0);
        assert_eq!(router.dispatch(&reply), DispatchOutcome::Delivered);
        assert_eq!(router.dispatch(&reply), DispatchOutcome::Unregistered);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(router.pending(&key("gain", 1)), 0);
    }

    #[test]
    fn subscription_persists_and_is_replaced() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (first_hits, first) = counter();
        let (second_hits, second) = counter();
        router.register(key("mute", 2), &owner, first, false);
        router.register(key("mute", 2), &owner, second, false);

        let push = Response::publish(&key("mute", 2), true);
        router.dispatch(&push);
        router.dispatch(&push);

        assert_eq!(first_hits.load(Ordering::SeqCst), 0);
        assert_eq!(second_hits.load(Ordering::SeqCst), 2);
        assert_eq!(router.subscriptions(), vec![key("mute", 2)]);
    }

    #[test]
    fn publish_skips_pending_requests() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (pending_hits, pending) = counter();
        router.register(key("gain", 1), &owner, pending, true);

        let push = Response::publish(&key("gain", 1), 1.0);
        assert_eq!(router.dispatch(&push), DispatchOutcome::Unregistered);
        assert_eq!(pending_hits.load(Ordering::SeqCst), 0);
        assert_eq!(router.pending(&key("gain", 1)), 1);
    }

    #[test]
    fn acknowledgement_consumes_without_invoking() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (hits, callback) = counter();
        router.register(key("gain", 1), &owner, callback, true);

        assert_eq!(router.dispatch(&Response::ack(&key("gain", 1))), DispatchOutcome::Acknowledged);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(router.pending(&key("gain", 1)), 0);
    }

    #[test]
    fn retired_owner_is_stale() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (hits, callback) = counter();
        router.register(key("gain", 4), &owner, callback, false);
        owner.retire();

        let push = Response::publish(&key("gain", 4), 0.0);
        assert_eq!(router.dispatch(&push), DispatchOutcome::Stale);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!router.is_subscribed(&key("gain", 4)));
    }

    #[test]
    fn remove_owner_leaves_others() {
        let router = ResponseRouter::new("dsp");
        let first = Owner::new();
        let second = Owner::new();
        let (_, callback) = counter();
        router.register(key("gain", 1), &first, callback.clone(), false);
        router.register(key("gain", 1), &first, callback.clone(), true);
        router.register(key("gain", 2), &second, callback, false);

        assert_eq!(router.remove_owner(first.id()), 2);
        assert_eq!(router.subscriptions(), vec![key("gain", 2)]);
    }

    #[test]
    fn prune_drops_only_old_requests() {
        let router = ResponseRouter::new("dsp");
        let owner = Owner::new();
        let (_, callback) = counter();
        router.register(key("gain", 1), &owner, callback.clone(), true);
        router.register(key("gain", 1), &owner, callback, false);

        assert_eq!(router.prune_expired(Duration::from_secs(60)), 0);
        assert_eq!(router.prune_expired(Duration::ZERO), 1);
        assert!(router.is_subscribed(&key("gain", 1)));
        assert_eq!(router.pending(&key("gain", 1)), 0);
    }

    #[test]
    fn callback_can_register_while_dispatching() {
        let router = Arc::new(ResponseRouter::new("dsp"));
        let owner = Owner::new();
        let (hits, follow_up) = counter();

        let reentrant = {
            let router = Arc::downgrade(&router);
            let owner = owner.clone();
            Arc::new(move |_: &str, _: &ControlValue| {
                if let Some(router) = router.upgrade() {
                    router.register(key("mute", 1), &owner, follow_up.clone(), true);
                }
            }) as ResponseCallback
        };
        router.register(key("gain", 1), &owner, reentrant, true);

        router.dispatch(&Response::reply(&key("gain", 1), 1.0));
        router.dispatch(&Response::reply(&key("mute", 1), false));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

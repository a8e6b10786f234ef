//! Subscriber registry and unsubscribe handles.

use crate::Path;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// What a subscriber callback returns. An `Err` is reported to the store's
/// diagnostic sink and does not stop delivery to other subscribers.
pub type CallbackResult = Result<(), Box<dyn std::error::Error>>;

/// Callbacks receive `(value, current_root)`.
pub(crate) type Callback = Rc<dyn Fn(&Value, &Value) -> CallbackResult>;

/// Where a callback is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Fires for writes to exactly this path (and cascades into it).
    Path(Path),
    /// Fires for every write.
    Wildcard,
}

impl SubscriptionKey {
    /// The root path maps to the wildcard tier.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        if path.is_root() {
            SubscriptionKey::Wildcard
        } else {
            SubscriptionKey::Path(path.clone())
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKey::Path(p) => write!(f, "{p}"),
            SubscriptionKey::Wildcard => f.write_str("*"),
        }
    }
}

struct Entry {
    id: u64,
    callback: Callback,
}

/// Callbacks per key, kept in subscription order.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    entries: HashMap<SubscriptionKey, Vec<Entry>>,
}

impl Registry {
    pub(crate) fn insert(&mut self, key: SubscriptionKey, callback: Callback) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries
            .entry(key)
            .or_default()
            .push(Entry { id, callback });
        id
    }

    pub(crate) fn remove(&mut self, key: &SubscriptionKey, id: u64) -> bool {
        let Some(list) = self.entries.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    pub(crate) fn contains(&self, key: &SubscriptionKey, id: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|list| list.iter().any(|e| e.id == id))
    }

    /// Copy of the callbacks for `key`, so delivery can run without holding
    /// a borrow of the registry.
    pub(crate) fn snapshot(&self, key: &SubscriptionKey) -> Vec<(u64, Callback)> {
        self.entries
            .get(key)
            .map(|list| {
                list.iter()
                    .map(|e| (e.id, Rc::clone(&e.callback)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &SubscriptionKey) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    key: SubscriptionKey,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn new(registry: &Rc<RefCell<Registry>>, key: SubscriptionKey, id: u64) -> Self {
        Self {
            registry: Rc::downgrade(registry),
            key,
            id,
            active: Cell::new(true),
        }
    }

    #[must_use]
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Remove exactly this registration. Calling it again is a no-op.
    ///
    /// Returns `true` only on the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.replace(false) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.borrow_mut().remove(&self.key, self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Rc::new(|_: &Value, _: &Value| -> CallbackResult { Ok(()) })
    }

    #[test]
    fn insert_preserves_order() {
        let mut reg = Registry::default();
        let key = SubscriptionKey::Wildcard;
        let a = reg.insert(key.clone(), noop());
        let b = reg.insert(key.clone(), noop());
        let ids: Vec<u64> = reg.snapshot(&key).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn remove_is_exact_and_repeatable() {
        let mut reg = Registry::default();
        let key = SubscriptionKey::Path(Path::parse("x").unwrap());
        let a = reg.insert(key.clone(), noop());
        let b = reg.insert(key.clone(), noop());
        assert!(reg.remove(&key, a));
        assert!(!reg.remove(&key, a));
        assert!(reg.contains(&key, b));
        assert_eq!(reg.count(&key), 1);
    }

    #[test]
    fn root_path_is_wildcard() {
        assert_eq!(SubscriptionKey::for_path(&Path::root()), SubscriptionKey::Wildcard);
    }
}

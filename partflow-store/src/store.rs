//! The path store itself.
//!
//! Values live in a `serde_json::Value` tree behind `Rc`, so a notification
//! pass can hand each callback a cheap snapshot of the root while nested
//! writes copy-on-write a fresh tree.
//!
//! # Re-entrancy
//!
//! No borrow of the tree or the registry is held while a callback runs, so
//! callbacks may freely `get`, `set`, `update` or `subscribe`. A nested `set`
//! finishes its own fan-out before control returns to the callback that
//! issued it. The root is re-read before every callback: a callback later in
//! a pass may observe writes made by an earlier callback's nested `set`.
//!
//! Callbacks registered during a pass first fire on the next write.
//! Callbacks unsubscribed during a pass are skipped for the rest of it.
//! A callback that panics is caught and reported like one returning `Err`.

use crate::cascade::{CascadeRule, StoreConfig};
use crate::diagnostics::{DiagnosticSink, SubscriberFailure, Tier, TracingSink};
use crate::subscription::{Callback, CallbackResult, Registry, Subscription, SubscriptionKey};
use crate::{Path, Result, StoreError};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

struct Inner {
    root: RefCell<Option<Rc<Value>>>,
    registry: Rc<RefCell<Registry>>,
    rules: Vec<CascadeRule>,
    sink: Box<dyn DiagnosticSink>,
}

/// Handle to a path store. Clones share the same tree and subscribers.
#[derive(Clone)]
pub struct PathStore {
    inner: Rc<Inner>,
}

/// Non-owning handle, for callbacks that should not keep the store alive.
#[derive(Clone)]
pub struct WeakPathStore {
    inner: Weak<Inner>,
}

impl WeakPathStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<PathStore> {
        self.inner.upgrade().map(|inner| PathStore { inner })
    }
}

/// Builder for [`PathStore`].
#[derive(Default)]
pub struct StoreBuilder {
    rules: Vec<CascadeRule>,
    sink: Option<Box<dyn DiagnosticSink>>,
}

impl StoreBuilder {
    /// Add one cascade rule.
    #[must_use]
    pub fn cascade_rule(mut self, rule: CascadeRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn cascade_rules(mut self, rules: impl IntoIterator<Item = CascadeRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Add every rule declared in `config`.
    pub fn config(self, config: &StoreConfig) -> Result<Self> {
        Ok(self.cascade_rules(config.rules()?))
    }

    /// Where subscriber failures go. Defaults to [`TracingSink`].
    #[must_use]
    pub fn diagnostic_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn build(self) -> PathStore {
        PathStore {
            inner: Rc::new(Inner {
                root: RefCell::new(None),
                registry: Rc::new(RefCell::new(Registry::default())),
                rules: self.rules,
                sink: self.sink.unwrap_or_else(|| Box::new(TracingSink)),
            }),
        }
    }
}

impl PathStore {
    /// A store with no cascade rules that logs subscriber failures.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakPathStore {
        WeakPathStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Install the root value. Calling it again replaces the root but keeps
    /// every subscription. Does not notify.
    ///
    /// Returns the installed root. It is shared with the store, not copied;
    /// holding it across a later write makes that write copy the tree.
    pub fn init(&self, root: Value) -> Rc<Value> {
        let root = Rc::new(root);
        *self.inner.root.borrow_mut() = Some(Rc::clone(&root));
        debug!("Store initialized");
        root
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.root.borrow().is_some()
    }

    #[must_use]
    pub fn cascade_rules(&self) -> &[CascadeRule] {
        &self.inner.rules
    }

    /// Read the value at a dotted path. `Ok(None)` if any segment is
    /// missing; the empty path returns the whole root.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.get_at(&Path::parse(path)?)
    }

    pub fn get_at(&self, path: &Path) -> Result<Option<Value>> {
        let root = self.root_snapshot()?;
        Ok(lookup(&root, path).cloned())
    }

    /// Write a literal value and notify subscribers. Returns the value
    /// written.
    ///
    /// Missing intermediate segments (or `null` ones) are created as empty
    /// objects. Any other non-container value on the way fails with
    /// [`StoreError::PathConflict`] and leaves the tree untouched.
    pub fn set(&self, path: &str, value: Value) -> Result<Value> {
        self.set_at(&Path::parse(path)?, value)
    }

    pub fn set_at(&self, path: &Path, value: Value) -> Result<Value> {
        self.write(path, value.clone())?;
        debug!(path = %path, "set");
        self.notify(path, &value);
        Ok(value)
    }

    /// Compute the new value from the current one, then `set` it.
    ///
    /// `updater` gets `None` when nothing is stored at `path`; for the root
    /// path it gets the whole root. It runs without any store borrow held.
    pub fn update<F>(&self, path: &str, updater: F) -> Result<Value>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        self.update_at(&Path::parse(path)?, updater)
    }

    pub fn update_at<F>(&self, path: &Path, updater: F) -> Result<Value>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let current = self.get_at(path)?;
        self.set_at(path, updater(current))
    }

    /// Register `callback` on `path`, or on the wildcard tier if `path` is
    /// empty.
    ///
    /// Direct and cascade callbacks receive `(value, root)`; wildcard
    /// callbacks receive `({"path": .., "value": ..}, root)`.
    pub fn subscribe<F>(&self, path: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&Value, &Value) -> CallbackResult + 'static,
    {
        Ok(self.subscribe_at(&Path::parse(path)?, callback))
    }

    pub fn subscribe_at<F>(&self, path: &Path, callback: F) -> Subscription
    where
        F: Fn(&Value, &Value) -> CallbackResult + 'static,
    {
        self.register(SubscriptionKey::for_path(path), Rc::new(callback))
    }

    /// Register on the wildcard tier.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value, &Value) -> CallbackResult + 'static,
    {
        self.register(SubscriptionKey::Wildcard, Rc::new(callback))
    }

    /// Number of callbacks registered on `path` (wildcard tier for "").
    pub fn subscriber_count(&self, path: &str) -> Result<usize> {
        let key = SubscriptionKey::for_path(&Path::parse(path)?);
        Ok(self.inner.registry.borrow().count(&key))
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn register(&self, key: SubscriptionKey, callback: Callback) -> Subscription {
        let id = self
            .inner
            .registry
            .borrow_mut()
            .insert(key.clone(), callback);
        trace!(key = %key, id, "subscribed");
        Subscription::new(&self.inner.registry, key, id)
    }

    fn root_snapshot(&self) -> Result<Rc<Value>> {
        self.inner
            .root
            .borrow()
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    fn write(&self, path: &Path, value: Value) -> Result<()> {
        let mut slot = self.inner.root.borrow_mut();
        let root = slot.as_mut().ok_or(StoreError::NotInitialized)?;
        if path.is_root() {
            *root = Rc::new(value);
            return Ok(());
        }
        // Check before make_mut so a rejected write never clones the tree.
        if let Some(blocked_at) = find_conflict(&**root, path) {
            return Err(StoreError::PathConflict {
                path: path.to_dotted(),
                blocked_at,
            });
        }
        assign(Rc::make_mut(root), path, value);
        Ok(())
    }

    fn notify(&self, path: &Path, value: &Value) {
        self.dispatch(&SubscriptionKey::Path(path.clone()), value, Tier::Direct, path);

        if let Value::Object(map) = value {
            for rule in self.inner.rules.iter().filter(|r| r.parent() == path) {
                for (child, child_value) in rule.targets(map) {
                    self.dispatch(&SubscriptionKey::Path(child), child_value, Tier::Cascade, path);
                }
            }
        }

        let change = json!({ "path": path.to_dotted(), "value": value });
        self.dispatch(&SubscriptionKey::Wildcard, &change, Tier::Wildcard, path);
    }

    fn dispatch(&self, key: &SubscriptionKey, value: &Value, tier: Tier, written: &Path) {
        let callbacks = self.inner.registry.borrow().snapshot(key);
        for (id, callback) in callbacks {
            if !self.inner.registry.borrow().contains(key, id) {
                continue;
            }
            let Ok(root) = self.root_snapshot() else {
                return;
            };
            let message = match panic::catch_unwind(AssertUnwindSafe(|| callback(value, &*root))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(&*payload)),
            };
            let failure = SubscriberFailure {
                path: match key {
                    SubscriptionKey::Path(p) => p.to_dotted(),
                    SubscriptionKey::Wildcard => String::new(),
                },
                written_path: written.to_dotted(),
                tier,
                message,
            };
            self.inner.sink.report(&failure);
        }
    }
}

impl Default for PathStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PathStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathStore")
            .field("initialized", &self.is_initialized())
            .field("cascade_rules", &self.inner.rules.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

fn lookup<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, seg| child(node, seg))
}

fn child<'a>(node: &'a Value, seg: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Dotted prefix of the first existing value that a write to `path` would
/// have to descend through or index into but cannot.
fn find_conflict(root: &Value, path: &Path) -> Option<String> {
    let segments = path.segments();
    let mut node = root;
    for (depth, seg) in segments.iter().enumerate() {
        let is_last = depth + 1 == segments.len();
        match node {
            Value::Null => return None,
            Value::Object(map) => match map.get(seg) {
                Some(next) if !is_last => node = next,
                _ => return None,
            },
            Value::Array(items) => {
                let in_range = seg
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < items.len() || (is_last && *i == items.len()));
                match in_range {
                    Some(i) if !is_last => node = &items[i],
                    Some(_) => return None,
                    None => return Some(segments[..depth].join(".")),
                }
            }
            _ => return Some(segments[..depth].join(".")),
        }
    }
    None
}

/// Write `value` at `path`, creating objects for missing or null segments.
/// Callers must have ruled out conflicts with [`find_conflict`].
fn assign(root: &mut Value, path: &Path, value: Value) {
    let Some((parent, last)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for seg in parent.segments() {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(seg.as_str())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match seg.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
        }
        Value::Array(items) => {
            if let Ok(i) = last.parse::<usize>() {
                if i < items.len() {
                    items[i] = value;
                } else if i == items.len() {
                    items.push(value);
                }
            }
        }
        _ => {}
    }
}

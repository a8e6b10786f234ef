use partflow_store::{PathStore, StoreError};
use pretty_assertions::assert_eq;
use serde_json::json;

fn store_with(root: serde_json::Value) -> PathStore {
    let store = PathStore::new();
    store.init(root);
    store
}

// ── Initialization ───────────────────────────────────────────────

#[test]
fn get_before_init_fails() {
    let store = PathStore::new();
    assert_eq!(store.get("a"), Err(StoreError::NotInitialized));
    assert_eq!(store.get(""), Err(StoreError::NotInitialized));
}

#[test]
fn set_before_init_fails() {
    let store = PathStore::new();
    assert_eq!(store.set("a", json!(1)), Err(StoreError::NotInitialized));
    assert!(!store.is_initialized());
}

#[test]
fn update_before_init_fails_without_calling_updater() {
    let store = PathStore::new();
    let result = store.update("a", |_| panic!("updater must not run"));
    assert_eq!(result, Err(StoreError::NotInitialized));
}

#[test]
fn init_returns_root() {
    let store = PathStore::new();
    let root = store.init(json!({"entities": {}}));
    assert_eq!(*root, json!({"entities": {}}));
    assert!(store.is_initialized());
}

#[test]
fn init_result_is_independent_of_later_writes() {
    let store = PathStore::new();
    let root = store.init(json!({"a": 1}));
    store.set("a", json!(2)).unwrap();
    assert_eq!(*root, json!({"a": 1}));
    assert_eq!(store.get("a").unwrap(), Some(json!(2)));
}

#[test]
fn subscribe_before_init_is_allowed_and_fires_after_init() {
    let store = PathStore::new();
    let calls = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = calls.clone();
    let sub = store.subscribe("a", move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    assert!(sub.is_ok());
    assert_eq!(store.subscriber_count("a").unwrap(), 1);

    // Reads and writes still require a root.
    assert_eq!(store.get("a"), Err(StoreError::NotInitialized));
    assert_eq!(store.set("a", json!(1)), Err(StoreError::NotInitialized));
    assert_eq!(calls.get(), 0);

    store.init(json!({}));
    assert_eq!(calls.get(), 0);

    store.set("a", json!(1)).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn reinit_replaces_root_and_keeps_subscriptions() {
    let store = store_with(json!({"a": 1}));
    let _sub = store.subscribe("b", |_, _| Ok(())).unwrap();
    store.init(json!({"b": 2}));
    assert_eq!(store.get("a").unwrap(), None);
    assert_eq!(store.get("b").unwrap(), Some(json!(2)));
    assert_eq!(store.subscriber_count("b").unwrap(), 1);
}

// ── get ──────────────────────────────────────────────────────────

#[test]
fn empty_path_returns_whole_root() {
    let store = store_with(json!({"a": {"b": 1}}));
    assert_eq!(store.get("").unwrap(), Some(json!({"a": {"b": 1}})));
}

#[test]
fn missing_segment_is_none() {
    let store = store_with(json!({"a": {"b": 1}}));
    assert_eq!(store.get("a.c").unwrap(), None);
    assert_eq!(store.get("x.y.z").unwrap(), None);
    assert_eq!(store.get("a.b.c").unwrap(), None);
}

#[test]
fn numeric_segment_indexes_arrays() {
    let store = store_with(json!({"entities": {"review": [{"id": 7}]}}));
    assert_eq!(store.get("entities.review.0.id").unwrap(), Some(json!(7)));
    assert_eq!(store.get("entities.review.1").unwrap(), None);
}

#[test]
fn invalid_path_is_rejected() {
    let store = store_with(json!({}));
    assert!(matches!(
        store.get("a..b"),
        Err(StoreError::InvalidPath { .. })
    ));
    assert!(matches!(
        store.set("a b", json!(1)),
        Err(StoreError::InvalidPath { .. })
    ));
}

// ── set ──────────────────────────────────────────────────────────

#[test]
fn set_then_get_round_trips() {
    let store = store_with(json!({}));
    let written = store.set("x", json!("hello")).unwrap();
    assert_eq!(written, json!("hello"));
    assert_eq!(store.get("x").unwrap(), Some(json!("hello")));
}

#[test]
fn set_auto_vivifies_intermediates() {
    let store = store_with(json!({}));
    store.set("a.b.c", json!(5)).unwrap();
    assert_eq!(store.get("a").unwrap(), Some(json!({"b": {"c": 5}})));
}

#[test]
fn auto_vivification_keeps_siblings() {
    let store = store_with(json!({"a": {"keep": true}}));
    store.set("a.b.c", json!(5)).unwrap();
    assert_eq!(
        store.get("a").unwrap(),
        Some(json!({"keep": true, "b": {"c": 5}}))
    );
}

#[test]
fn null_intermediate_is_filled_in() {
    let store = store_with(json!({"a": null}));
    store.set("a.b", json!(1)).unwrap();
    assert_eq!(store.get("a").unwrap(), Some(json!({"b": 1})));
}

#[test]
fn scalar_intermediate_is_not_overwritten() {
    let store = store_with(json!({"a": 5}));
    let err = store.set("a.b", json!(1)).unwrap_err();
    assert_eq!(
        err,
        StoreError::PathConflict {
            path: "a.b".to_string(),
            blocked_at: "a".to_string(),
        }
    );
    assert_eq!(store.get("a").unwrap(), Some(json!(5)));
}

#[test]
fn rejected_write_does_not_notify() {
    let store = store_with(json!({"a": 5}));
    let calls = std::rc::Rc::new(std::cell::Cell::new(0));
    let seen = calls.clone();
    let _sub = store.subscribe_all(move |_, _| {
        seen.set(seen.get() + 1);
        Ok(())
    });
    assert!(store.set("a.b", json!(1)).is_err());
    assert_eq!(calls.get(), 0);
}

#[test]
fn set_root_replaces_everything() {
    let store = store_with(json!({"a": 1}));
    store.set("", json!({"b": 2})).unwrap();
    assert_eq!(store.get("").unwrap(), Some(json!({"b": 2})));
}

#[test]
fn set_array_element_by_index() {
    let store = store_with(json!({"list": [1, 2, 3]}));
    store.set("list.1", json!(20)).unwrap();
    store.set("list.3", json!(4)).unwrap();
    assert_eq!(store.get("list").unwrap(), Some(json!([1, 20, 3, 4])));
}

// ── update ───────────────────────────────────────────────────────

#[test]
fn update_receives_current_value() {
    let store = store_with(json!({"count": 2}));
    let written = store
        .update("count", |cur| json!(cur.and_then(|v| v.as_i64()).unwrap_or(0) + 1))
        .unwrap();
    assert_eq!(written, json!(3));
    assert_eq!(store.get("count").unwrap(), Some(json!(3)));
}

#[test]
fn update_receives_none_for_missing_path() {
    let store = store_with(json!({}));
    store
        .update("fresh", |cur| {
            assert!(cur.is_none());
            json!([])
        })
        .unwrap();
    assert_eq!(store.get("fresh").unwrap(), Some(json!([])));
}

#[test]
fn update_on_root_receives_whole_tree() {
    let store = store_with(json!({"a": 1}));
    store
        .update("", |cur| {
            let mut root = cur.unwrap();
            root["b"] = json!(2);
            root
        })
        .unwrap();
    assert_eq!(store.get("").unwrap(), Some(json!({"a": 1, "b": 2})));
}

#[test]
fn updater_may_read_the_store() {
    let store = store_with(json!({"a": 10, "b": 0}));
    let reader = store.clone();
    store
        .update("b", move |_| reader.get("a").unwrap().unwrap())
        .unwrap();
    assert_eq!(store.get("b").unwrap(), Some(json!(10)));
}

// ── Independent instances ────────────────────────────────────────

#[test]
fn instances_do_not_share_state() {
    let a = store_with(json!({}));
    let b = store_with(json!({}));
    a.set("x", json!(1)).unwrap();
    assert_eq!(b.get("x").unwrap(), None);
}

#[test]
fn clones_share_state() {
    let a = store_with(json!({}));
    let b = a.clone();
    a.set("x", json!(1)).unwrap();
    assert_eq!(b.get("x").unwrap(), Some(json!(1)));
}

#[test]
fn weak_handle_does_not_keep_store_alive() {
    let store = store_with(json!({}));
    let weak = store.downgrade();
    assert!(weak.upgrade().is_some());
    drop(store);
    assert!(weak.upgrade().is_none());
}

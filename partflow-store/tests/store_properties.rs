//! Property-based tests for the path store.
//!
//! - Round-trip: `set(p, v)` then `get(p)` returns `v`
//! - Every write reaches each wildcard subscriber exactly once

use partflow_store::PathStore;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,6}").unwrap()
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(segment_strategy(), 1..5).prop_map(|segs| segs.join("."))
}

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .unwrap()
            .prop_map(Value::from),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map(segment_strategy(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// A write on a fresh tree is always readable back unchanged.
    #[test]
    fn set_then_get_round_trips(path in path_strategy(), value in value_strategy()) {
        let store = PathStore::new();
        store.init(json!({}));

        let written = store.set(&path, value.clone()).unwrap();

        prop_assert_eq!(&written, &value);
        prop_assert_eq!(store.get(&path).unwrap(), Some(value));
    }

    /// The wildcard tier sees each accepted write exactly once, in order.
    #[test]
    fn wildcard_sees_each_write_once(
        writes in prop::collection::vec((path_strategy(), leaf_strategy()), 1..8)
    ) {
        let store = PathStore::new();
        store.init(json!({}));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe_all(move |change, _| {
            sink.borrow_mut().push(change.clone());
            Ok(())
        });

        let mut expected = Vec::new();
        for (path, value) in &writes {
            // Writes blocked by an earlier scalar are rejected and must not notify.
            if store.set(path, value.clone()).is_ok() {
                expected.push(json!({"path": path, "value": value}));
            }
        }

        prop_assert_eq!(&*seen.borrow(), &expected);
    }
}

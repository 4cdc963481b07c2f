//! Property tests for the ordered mapping.
//!
//! The mapping must keep keys in first-insertion order through mutation and
//! through a YAML round trip, and `pop` followed by `set` must move a key to
//! the end.

use proptest::prelude::*;

use runbook::omap::{OrderedMap, Value};

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,12}"
}

fn keys_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(key_strategy(), 1..20).prop_map(|mut keys| {
        keys.sort();
        keys.dedup();
        keys
    })
}

proptest! {
    #[test]
    fn keys_come_back_in_insertion_order(keys in keys_strategy()) {
        let mut map = OrderedMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key.clone(), i as i64);
        }
        prop_assert_eq!(map.keys(), keys);
    }

    #[test]
    fn yaml_round_trip_preserves_order(keys in keys_strategy()) {
        let mut map = OrderedMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key.clone(), i as i64);
        }
        let yaml = map.to_yaml().unwrap();
        let back: OrderedMap = serde_yaml::from_str(&yaml).unwrap();
        prop_assert_eq!(back.keys(), keys);
    }

    #[test]
    fn pop_then_set_moves_key_to_the_end(keys in keys_strategy(), idx in any::<prop::sample::Index>()) {
        let mut map = OrderedMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key.clone(), i as i64);
        }
        let victim = keys[idx.index(keys.len())].clone();
        let value = map.pop(&victim).unwrap();
        map.set(victim.clone(), value);

        let mut expected: Vec<String> = keys.iter().filter(|k| **k != victim).cloned().collect();
        expected.push(victim);
        prop_assert_eq!(map.keys(), expected);
    }

    #[test]
    fn overwrite_keeps_the_original_position(keys in keys_strategy(), idx in any::<prop::sample::Index>()) {
        let mut map = OrderedMap::new();
        for (i, key) in keys.iter().enumerate() {
            map.set(key.clone(), i as i64);
        }
        let victim = keys[idx.index(keys.len())].clone();
        map.set(victim.clone(), Value::String("replaced".to_string()));

        prop_assert_eq!(map.keys(), keys);
        prop_assert_eq!(
            map.get(&victim).and_then(Value::as_str),
            Some("replaced")
        );
    }
}

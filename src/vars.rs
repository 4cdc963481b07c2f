//! Variable scope assembly.
//!
//! Precedence is strictly layered, lowest to highest: inventory host vars,
//! gathered facts, explicit extra-vars. Later layers overwrite colliding
//! keys. The ordering is user-observable behavior and must not change.

use indexmap::IndexMap;

use crate::omap::{OrderedMap, Value};

/// The variable scope a task executes against.
pub type VarMap = IndexMap<String, Value>;

/// Layers fact data on top of an existing scope.
pub fn apply_facts(vars: &mut VarMap, facts: &OrderedMap) {
    for (key, value) in facts.iter() {
        vars.insert(key.to_string(), value.clone());
    }
}

/// Builds the effective scope for one host.
///
/// `host_vars` is the lowest layer, `facts` sits above it, `extra_vars` wins.
pub fn assemble(
    host_vars: &VarMap,
    facts: Option<&OrderedMap>,
    extra_vars: &VarMap,
) -> VarMap {
    let mut vars = host_vars.clone();
    if let Some(facts) = facts {
        apply_facts(&mut vars, facts);
    }
    for (key, value) in extra_vars {
        vars.insert(key.clone(), value.clone());
    }
    vars
}

/// The scope as an ordered map, for serialization.
pub fn to_map(vars: &VarMap) -> OrderedMap {
    let mut out = OrderedMap::new();
    for (key, value) in vars {
        out.set(key.clone(), value.clone());
    }
    out
}

/// A scope built from an ordered map.
pub fn from_map(map: &OrderedMap) -> VarMap {
    map.iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Reads a string-valued variable.
pub fn get_str<'a>(vars: &'a VarMap, key: &str) -> Option<&'a str> {
    vars.get(key).and_then(Value::as_str)
}

/// Reads an integer variable, accepting string digits for inventory values.
pub fn get_int(vars: &VarMap, key: &str) -> Option<i64> {
    match vars.get(key) {
        Some(Value::Int(i)) => Some(*i),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn precedence_layers_in_order() {
        let mut host = VarMap::new();
        host.insert("a".into(), Value::String("host".into()));
        host.insert("b".into(), Value::String("host".into()));
        host.insert("c".into(), Value::String("host".into()));

        let mut facts = OrderedMap::new();
        facts.set("b", "fact");
        facts.set("c", "fact");

        let mut extra = VarMap::new();
        extra.insert("c".into(), Value::String("extra".into()));

        let vars = assemble(&host, Some(&facts), &extra);
        assert_eq!(get_str(&vars, "a"), Some("host"));
        assert_eq!(get_str(&vars, "b"), Some("fact"));
        assert_eq!(get_str(&vars, "c"), Some("extra"));
    }

    #[test]
    fn int_accepts_string_digits() {
        let mut vars = VarMap::new();
        vars.insert("port".into(), Value::String("2222".into()));
        assert_eq!(get_int(&vars, "port"), Some(2222));
    }
}

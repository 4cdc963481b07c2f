//! Insertion-order-preserving string-keyed map with YAML round-tripping.
//!
//! Playbook YAML is authored by humans and has to come back out in the same
//! key order it went in. [`OrderedMap`] keeps an explicit key order next to
//! the data and carries it through nested maps and lists. Plain native maps
//! are unrepresentable as values: nesting is expressed through [`Value::Map`]
//! holding another `OrderedMap`, which keeps the ordering guarantee recursive.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A YAML-compatible value: scalars, lists, or nested ordered maps.
///
/// There is intentionally no variant for a plain unordered map, so ordering
/// cannot be lost by accident somewhere down a nested structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(OrderedMap),
}

impl Value {
    /// Returns the string slice if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Coerces a scalar or a list of scalars into a list of strings.
    ///
    /// A single string becomes a one-element list, matching how playbooks
    /// allow `name: curl` and `name: [curl, wget]` interchangeably.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::String(s) => Some(vec![s.clone()]),
            Value::List(l) => {
                let mut out = Vec::with_capacity(l.len());
                for item in l {
                    out.push(item.to_display_string());
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Renders the scalar as a plain string, the way YAML would show it.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => to_yaml(self).unwrap_or_default(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<OrderedMap> for Value {
    fn from(v: OrderedMap) -> Self {
        Value::Map(v)
    }
}

/// String-keyed map that remembers first-insertion order of its keys.
///
/// Invariant: the key set of `data` and the contents of `order` are always
/// identical. `set` on an existing key updates the value but keeps its
/// position; `pop` removes from both sides atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedMap {
    data: HashMap<String, Value>,
    order: Vec<String>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a value. A new key is appended to the order; an existing key
    /// keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if !self.data.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.data.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Removes the key from the map and the order sequence.
    ///
    /// Panics if the key exists in the data but not in the order list: that
    /// is a broken invariant inside this type, not a user error, and must
    /// not be papered over.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        let value = self.data.remove(key)?;
        let pos = self
            .order
            .iter()
            .position(|k| k == key)
            .unwrap_or_else(|| {
                panic!("ordered map desync: key `{}` missing from order {:?}", key, self.order)
            });
        self.order.remove(pos);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a copy of the key order.
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .map(move |k| (k.as_str(), &self.data[k]))
    }

    /// Appends all entries of `other`, preserving its order.
    pub fn extend(&mut self, other: OrderedMap) {
        for key in other.order {
            if let Some(value) = other.data.get(&key) {
                self.set(key, value.clone());
            }
        }
    }

    /// Renders the map as a YAML document.
    pub fn to_yaml(&self) -> Result<String> {
        to_yaml(self)
    }
}

/// Encodes any serializable value as a YAML document with a `---` header.
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    let body = serde_yaml::to_string(value).map_err(Error::YamlParse)?;
    Ok(format!("---\n{}", body))
}

// ---------------------------------------------------------------------------
// serde integration
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(l) => {
                let mut seq = serializer.serialize_seq(Some(l.len()))?;
                for item in l {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a YAML scalar, sequence or mapping")
            }

            fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
                i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| E::custom(format!("integer {} does not fit in i64", v)))
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
                Ok(Value::Float(v))
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
                Ok(Value::String(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
                Ok(Value::String(v))
            }

            fn visit_unit<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut list = Vec::new();
                while let Some(item) = seq.next_element::<Value>()? {
                    list.push(item);
                }
                Ok(Value::List(list))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut om = OrderedMap::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    om.set(key, value);
                }
                Ok(Value::Map(om))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl Serialize for OrderedMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedMapVisitor;

        impl<'de> Visitor<'de> for OrderedMapVisitor {
            type Value = OrderedMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a YAML mapping")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<OrderedMap, A::Error> {
                let mut om = OrderedMap::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    om.set(key, value);
                }
                Ok(om)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_preserves_first_insertion_order() {
        let mut om = OrderedMap::new();
        om.set("b", 1i64);
        om.set("a", 2i64);
        om.set("c", 3i64);
        om.set("a", 4i64); // update must not move the key
        assert_eq!(om.keys(), vec!["b", "a", "c"]);
        assert_eq!(om.get("a"), Some(&Value::Int(4)));
    }

    #[test]
    fn pop_then_set_moves_key_to_end() {
        let mut om = OrderedMap::new();
        om.set("a", 1i64);
        om.set("b", 2i64);
        om.set("c", 3i64);
        assert_eq!(om.pop("a"), Some(Value::Int(1)));
        assert_eq!(om.keys(), vec!["b", "c"]);
        om.set("a", 1i64);
        assert_eq!(om.keys(), vec!["b", "c", "a"]);
    }

    #[test]
    fn pop_missing_key_returns_none() {
        let mut om = OrderedMap::new();
        om.set("a", 1i64);
        assert_eq!(om.pop("nope"), None);
        assert_eq!(om.len(), 1);
    }

    #[test]
    fn yaml_decode_keeps_document_order() {
        let yaml = "zeta: 1\nalpha: two\nmid:\n  inner_b: true\n  inner_a: 5\nlist:\n  - x: 1\n  - plain\n";
        let om: OrderedMap = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(om.keys(), vec!["zeta", "alpha", "mid", "list"]);

        let mid = om.get("mid").and_then(Value::as_map).unwrap();
        assert_eq!(mid.keys(), vec!["inner_b", "inner_a"]);

        let list = om.get("list").and_then(Value::as_list).unwrap();
        assert!(matches!(list[0], Value::Map(_)));
        assert_eq!(list[1], Value::String("plain".to_string()));
    }

    #[test]
    fn yaml_roundtrip_preserves_order() {
        let yaml = "zeta: 1\nalpha: two\nnested:\n  b: 1\n  a: 2\n";
        let om: OrderedMap = serde_yaml::from_str(yaml).unwrap();
        let encoded = om.to_yaml().unwrap();
        assert_eq!(encoded, format!("---\n{}", yaml));
    }

    #[test]
    fn extend_appends_in_other_order() {
        let mut a = OrderedMap::new();
        a.set("one", 1i64);
        let mut b = OrderedMap::new();
        b.set("three", 3i64);
        b.set("two", 2i64);
        a.extend(b);
        assert_eq!(a.keys(), vec!["one", "three", "two"]);
    }
}

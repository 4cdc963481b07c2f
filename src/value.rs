//! Typed values that are either concrete or an unresolved template.
//!
//! Module parameter fields hold a [`TValue`]: either a real value decoded
//! from YAML, or a template string whose resolution is deferred until the
//! variable scope has been assembled. Templates are resolved right before a
//! module runs, never during parsing.

use crate::omap::Value;
use crate::template;
use crate::vars::VarMap;
use crate::error::Result;

/// A value that may still be a template expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TValue {
    /// No value was provided.
    #[default]
    Unset,
    /// A concrete decoded value.
    Concrete(Value),
    /// A template string awaiting resolution by the template collaborator.
    Template(String),
}

impl TValue {
    /// Wraps a decoded value, routing template-looking strings into the
    /// deferred variant.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) if template::is_template(&s) => TValue::Template(s),
            v => TValue::Concrete(v),
        }
    }

    /// Empty means: no value, no template, or a concrete empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            TValue::Unset => true,
            TValue::Concrete(Value::Null) => true,
            TValue::Concrete(Value::String(s)) => s.is_empty(),
            TValue::Concrete(_) => false,
            TValue::Template(_) => false,
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, TValue::Template(_))
    }

    /// Converts back to a plain value for re-serialization. A pending
    /// template serializes as its original string.
    pub fn to_value(&self) -> Value {
        match self {
            TValue::Unset => Value::Null,
            TValue::Concrete(v) => v.clone(),
            TValue::Template(s) => Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TValue::Concrete(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TValue::Concrete(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TValue::Concrete(v) => v.as_int(),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            TValue::Concrete(v) => v.as_string_list(),
            _ => None,
        }
    }

    /// Resolves a pending template against the variable scope, in place.
    /// Concrete and unset values are left untouched.
    pub fn resolve(&mut self, vars: &VarMap) -> Result<()> {
        if let TValue::Template(tmpl) = self {
            let rendered = template::render(tmpl, vars)?;
            *self = TValue::Concrete(Value::String(rendered));
        }
        Ok(())
    }
}

impl From<Value> for TValue {
    fn from(value: Value) -> Self {
        TValue::from_value(value)
    }
}

impl std::fmt::Display for TValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TValue::Unset => Ok(()),
            TValue::Concrete(v) => f.write_str(&v.to_display_string()),
            TValue::Template(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn template_strings_defer_resolution() {
        let t = TValue::from_value(Value::String("{{ pkg_name }}".into()));
        assert!(t.is_template());
        assert!(!t.is_empty());
        assert_eq!(t.as_str(), None);
    }

    #[test]
    fn empty_semantics() {
        assert!(TValue::Unset.is_empty());
        assert!(TValue::Concrete(Value::String(String::new())).is_empty());
        assert!(!TValue::Concrete(Value::Bool(false)).is_empty());
        assert!(!TValue::Concrete(Value::Int(0)).is_empty());
        assert!(!TValue::Template("{{ x }}".into()).is_empty());
    }

    #[test]
    fn resolve_renders_template() {
        let mut vars = VarMap::new();
        vars.insert("pkg_name".into(), Value::String("curl".into()));
        let mut t = TValue::Template("{{ pkg_name }}".into());
        t.resolve(&vars).unwrap();
        assert_eq!(t.as_str(), Some("curl"));
    }

    #[test]
    fn concrete_values_pass_through() {
        let t = TValue::from_value(Value::Int(42));
        assert_eq!(t.as_int(), Some(42));
        assert_eq!(t.to_value(), Value::Int(42));
    }
}

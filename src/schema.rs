//! Field schema engine: generic conversion between ordered maps and typed
//! module parameters.
//!
//! Every task module describes its parameters with a static table of
//! [`FieldDef`] entries (key name, aliases, default, required flag, allowed
//! values, plus accessor functions into the parameter struct). [`set_data`]
//! and [`get_data`] consume that table generically, so module code never
//! re-implements lookup, alias fallback, default injection or validation.
//!
//! Per field, `set_data` resolves in this order: the declared key, then each
//! alias in declared order, then the declared default. A required field with
//! none of those fails. Consumed keys are removed from the source map, and
//! any keys left over afterwards are reported as unknown rather than being
//! silently dropped, which is the guard against playbook typos.

use thiserror::Error;

use crate::omap::{OrderedMap, Value};
use crate::value::TValue;

/// Violations of a module parameter schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A field marked `required` had no key, alias or default.
    #[error("Unable to find the required value for field '{field}'")]
    RequiredMissing {
        /// Schema key of the field
        field: String,
    },

    /// A value was not a member of the field's allowed-value list.
    #[error("The value '{value}' of field '{field}' is not in the defined list {choices:?}")]
    NotInList {
        /// Schema key of the field
        field: String,
        /// The rejected value
        value: String,
        /// The allowed values
        choices: Vec<String>,
    },

    /// A value could not be converted to the field's type.
    #[error("Unable to set field '{field}' to value of the wrong type: {message}")]
    InvalidType {
        /// Schema key of the field
        field: String,
        /// What was wrong
        message: String,
    },

    /// The module key's payload had the wrong shape, for example a scalar
    /// where a parameter map was expected.
    #[error("Unable to read the '{module}' data: {message}")]
    ModuleKey {
        /// Module name
        module: String,
        /// What was wrong with the payload
        message: String,
    },

    /// Keys remained after all schema fields were processed.
    #[error("Found {count} unknown fields - maybe not implemented?\n{yaml}")]
    UnknownFields {
        /// Number of residual keys
        count: usize,
        /// The residual keys in order
        fields: Vec<String>,
        /// YAML dump of the residual data
        yaml: String,
    },
}

/// Default value of a schema field. Only bool, int and string defaults are
/// supported, mirroring what YAML scalars can express losslessly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultVal {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultVal {
    fn to_value(self) -> Value {
        match self {
            DefaultVal::Bool(b) => Value::Bool(b),
            DefaultVal::Int(i) => Value::Int(i),
            DefaultVal::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// One field of a module parameter schema.
pub struct FieldDef<T> {
    /// Key looked up in the task data.
    pub key: &'static str,
    /// Fallback keys, checked in declared order when `key` is absent.
    pub aliases: &'static [&'static str],
    /// Value injected when neither key nor aliases are present.
    pub default: Option<DefaultVal>,
    /// Fail when no key, alias or default produced a value.
    pub required: bool,
    /// When non-empty, a concrete value must be one of these.
    pub choices: &'static [&'static str],
    /// Writes a decoded value into the parameter struct.
    pub set: fn(&mut T, TValue),
    /// Reads the current value back out of the parameter struct.
    pub get: fn(&T) -> TValue,
}

/// A module parameter struct with a static schema.
///
/// `Clone` is required so a run can resolve templates against the current
/// variable scope without losing the stored template text.
pub trait ParamSchema: Default + Clone + 'static {
    /// Fields in declaration order. The order is meaningful: `get_data`
    /// emits keys in this order.
    fn fields() -> &'static [FieldDef<Self>];
}

/// Convenience constructor for a plain optional field.
pub const fn field<T>(
    key: &'static str,
    set: fn(&mut T, TValue),
    get: fn(&T) -> TValue,
) -> FieldDef<T> {
    FieldDef {
        key,
        aliases: &[],
        default: None,
        required: false,
        choices: &[],
        set,
        get,
    }
}

impl<T> FieldDef<T> {
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    pub const fn default(mut self, default: DefaultVal) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }
}

/// Populates a parameter struct from task data according to its schema.
///
/// Consumed keys (the matched key or alias) are popped from `fmap`. Unknown
/// residual keys fail the whole conversion.
pub fn set_data<T: ParamSchema>(params: &mut T, fmap: &mut OrderedMap) -> Result<(), SchemaError> {
    for def in T::fields() {
        let mut matched_key: Option<String> = None;
        if fmap.contains_key(def.key) {
            matched_key = Some(def.key.to_string());
        } else {
            for alias in def.aliases {
                if fmap.contains_key(alias) {
                    matched_key = Some((*alias).to_string());
                    break;
                }
            }
        }

        let tvalue = match matched_key {
            Some(ref key) => {
                // pop cannot fail here: contains_key was just checked
                let raw = fmap.pop(key).unwrap_or(Value::Null);
                TValue::from_value(raw)
            }
            None => match def.default {
                Some(default) => TValue::Concrete(default.to_value()),
                None if def.required => {
                    return Err(SchemaError::RequiredMissing {
                        field: def.key.to_string(),
                    });
                }
                None => continue,
            },
        };

        // Allowed-value membership applies to concrete values only; a
        // pending template is validated after resolution by the module.
        if !def.choices.is_empty() {
            if let TValue::Concrete(ref v) = tvalue {
                let shown = v.to_display_string();
                if !def.choices.contains(&shown.as_str()) {
                    return Err(SchemaError::NotInList {
                        field: def.key.to_string(),
                        value: shown,
                        choices: def.choices.iter().map(|s| s.to_string()).collect(),
                    });
                }
            }
        }

        (def.set)(params, tvalue);
    }

    if !fmap.is_empty() {
        let yaml = fmap
            .to_yaml()
            .unwrap_or_else(|e| format!("(unencodable residual fields: {})", e));
        return Err(SchemaError::UnknownFields {
            count: fmap.len(),
            fields: fmap.keys(),
            yaml,
        });
    }

    Ok(())
}

/// Extracts a round-trippable ordered map from a parameter struct.
///
/// Fields that are empty, or that still equal their declared default, are
/// filtered out; the rest are emitted in declaration order.
pub fn get_data<T: ParamSchema>(params: &T) -> OrderedMap {
    let mut fmap = OrderedMap::new();
    for def in T::fields() {
        let tvalue = (def.get)(params);
        if tvalue.is_empty() {
            continue;
        }
        if let Some(default) = def.default {
            if tvalue == TValue::Concrete(default.to_value()) {
                continue;
            }
        }
        fmap.set(def.key, tvalue.to_value());
    }
    fmap
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default, PartialEq, Debug, Clone)]
    struct Sample {
        name: TValue,
        state: TValue,
        update: TValue,
        dest: TValue,
    }

    impl ParamSchema for Sample {
        fn fields() -> &'static [FieldDef<Self>] {
            static FIELDS: &[FieldDef<Sample>] = &[
                field::<Sample>("name", |p, v| p.name = v, |p| p.name.clone())
                    .aliases(&["package", "pkg"]),
                field::<Sample>("state", |p, v| p.state = v, |p| p.state.clone())
                    .default(DefaultVal::Str("present"))
                    .choices(&["absent", "latest", "present"]),
                field::<Sample>("update", |p, v| p.update = v, |p| p.update.clone())
                    .default(DefaultVal::Bool(false)),
                field::<Sample>("dest", |p, v| p.dest = v, |p| p.dest.clone()).required(),
            ];
            FIELDS
        }
    }

    fn fmap(entries: &[(&str, Value)]) -> OrderedMap {
        let mut om = OrderedMap::new();
        for (k, v) in entries {
            om.set(*k, v.clone());
        }
        om
    }

    #[test]
    fn alias_resolution_in_declared_order() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("pkg", Value::List(vec![Value::String("curl".into())])),
            ("dest", Value::String("/tmp/x".into())),
        ]);
        set_data(&mut p, &mut data).unwrap();
        assert_eq!(p.name.as_string_list(), Some(vec!["curl".to_string()]));
        assert!(data.is_empty());
    }

    #[test]
    fn defaults_injected_when_absent() {
        let mut p = Sample::default();
        let mut data = fmap(&[("dest", Value::String("/tmp/x".into()))]);
        set_data(&mut p, &mut data).unwrap();
        assert_eq!(p.state.as_str(), Some("present"));
        assert_eq!(p.update.as_bool(), Some(false));
    }

    #[test]
    fn required_field_missing_fails_with_field_name() {
        let mut p = Sample::default();
        let mut data = OrderedMap::new();
        let err = set_data(&mut p, &mut data).unwrap_err();
        match err {
            SchemaError::RequiredMissing { field } => assert_eq!(field, "dest"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn value_outside_choices_rejected() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("state", Value::String("sideways".into())),
            ("dest", Value::String("/tmp/x".into())),
        ]);
        let err = set_data(&mut p, &mut data).unwrap_err();
        match err {
            SchemaError::NotInList { field, value, .. } => {
                assert_eq!(field, "state");
                assert_eq!(value, "sideways");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn template_value_defers_choice_validation() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("state", Value::String("{{ desired_state }}".into())),
            ("dest", Value::String("/tmp/x".into())),
        ]);
        set_data(&mut p, &mut data).unwrap();
        assert!(p.state.is_template());
    }

    #[test]
    fn unknown_residual_fields_rejected_by_name() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("dest", Value::String("/tmp/x".into())),
            ("bogus_key", Value::Int(1)),
        ]);
        let err = set_data(&mut p, &mut data).unwrap_err();
        match err {
            SchemaError::UnknownFields { count, fields, .. } => {
                assert_eq!(count, 1);
                assert_eq!(fields, vec!["bogus_key"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn get_data_filters_defaults_and_keeps_declaration_order() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("dest", Value::String("/tmp/x".into())),
            ("name", Value::String("curl".into())),
            ("state", Value::String("latest".into())),
        ]);
        set_data(&mut p, &mut data).unwrap();
        let out = get_data(&p);
        // update stayed at its default and is filtered; order follows the
        // schema declaration, not the input document.
        assert_eq!(out.keys(), vec!["name", "state", "dest"]);
    }

    #[test]
    fn schema_roundtrip_reproduces_struct() {
        let mut p = Sample::default();
        let mut data = fmap(&[
            ("name", Value::String("curl".into())),
            ("state", Value::String("latest".into())),
            ("dest", Value::String("/tmp/x".into())),
        ]);
        set_data(&mut p, &mut data).unwrap();

        let mut again = Sample::default();
        let mut roundtrip = get_data(&p);
        set_data(&mut again, &mut roundtrip).unwrap();
        assert_eq!(p, again);
    }
}

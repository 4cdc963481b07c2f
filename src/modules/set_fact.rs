//! The `set_fact` task module: assigns host variables from the playbook.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::{OrderedMap, Value};
use crate::schema::SchemaError;
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct SetFact {
    // Raw key:value pairs, templates resolved during run.
    keyval: OrderedMap,
}

impl TaskModule for SetFact {
    fn name(&self) -> &'static str {
        "set_fact"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let fmap = modules::pop_module_map(data, "set_fact")?;
        if fmap.is_empty() {
            return Err(SchemaError::ModuleKey {
                module: "set_fact".to_string(),
                message: "no key:value pairs to set".to_string(),
            });
        }
        self.keyval = fmap;
        Ok(())
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("set_fact", self.keyval.clone());
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        // Templated values resolve against the current scope; the caller
        // merges the returned pairs into the host variables.
        let mut out = OrderedMap::new();
        for (key, value) in self.keyval.iter() {
            let mut tvalue = TValue::from_value(value.clone());
            tvalue.resolve(vars)?;
            out.set(key, tvalue.to_value());
        }
        let mut answer = OrderedMap::new();
        answer.set("ansible_facts", Value::Map(out));
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_payload_is_rejected() {
        let mut module = SetFact::default();
        let mut data: OrderedMap = serde_yaml::from_str("set_fact: {}").unwrap();
        assert!(module.set_data(&mut data).is_err());
    }

    #[test]
    fn templates_resolve_against_current_scope() {
        let mut module = SetFact::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("set_fact:\n  full_name: '{{ first }} {{ last }}'\n  port: 8080")
                .unwrap();
        module.set_data(&mut data).unwrap();

        let mut vars = VarMap::new();
        vars.insert("first".to_string(), Value::String("Ada".into()));
        vars.insert("last".to_string(), Value::String("Lovelace".into()));
        let out = module.run(&vars).unwrap();
        let facts = out.get("ansible_facts").unwrap().as_map().unwrap();
        assert_eq!(facts.get("full_name").unwrap().as_str(), Some("Ada Lovelace"));
        assert_eq!(facts.get("port"), Some(&Value::Int(8080)));
    }
}

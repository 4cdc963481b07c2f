//! The `setup` task module: gathers facts about the host it runs on.

use crate::error::Result;
use crate::modules::{facts, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::SchemaError;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Setup;

impl TaskModule for Setup {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        // Accepts any payload shape including a bare `setup:` with no map.
        data.pop("setup").ok_or_else(|| SchemaError::ModuleKey {
            module: "setup".to_string(),
            message: "key not found in task data".to_string(),
        })?;
        Ok(())
    }

    fn get_data(&self) -> OrderedMap {
        OrderedMap::new()
    }

    fn run(&mut self, _vars: &VarMap) -> Result<OrderedMap> {
        Ok(facts::collect_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_setup_key_parses() {
        let mut module = Setup::default();
        let mut data: OrderedMap = serde_yaml::from_str("setup:").unwrap();
        module.set_data(&mut data).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn run_returns_collected_facts() {
        let mut module = Setup::default();
        let out = module.run(&VarMap::new()).unwrap();
        assert!(out.contains_key("ansible_system"));
    }
}

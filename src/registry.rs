//! Module registry: name-based lookup for task and fact modules.
//!
//! The registry is built once at startup and passed explicitly to everything
//! that needs to resolve a module name. Lookup returns a fresh module
//! instance per call, so concurrent or repeated tasks never share parameter
//! state.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::modules::{self, FactModule, TaskModule};
use crate::omap::OrderedMap;

type TaskFactory = fn() -> Box<dyn TaskModule>;
type FactFactory = fn() -> Box<dyn FactModule>;

/// Name-indexed factories for task and fact modules.
pub struct Registry {
    tasks: HashMap<&'static str, TaskFactory>,
    facts: HashMap<&'static str, FactFactory>,
}

impl Registry {
    /// An empty registry with no modules.
    pub fn new() -> Self {
        Registry {
            tasks: HashMap::new(),
            facts: HashMap::new(),
        }
    }

    /// A registry preloaded with every built-in module.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        modules::register_builtins(&mut registry);
        registry
    }

    pub fn register_task(&mut self, name: &'static str, factory: TaskFactory) {
        self.tasks.insert(name, factory);
    }

    pub fn register_fact(&mut self, name: &'static str, factory: FactFactory) {
        self.facts.insert(name, factory);
    }

    /// Whether `name` resolves to a task module.
    pub fn is_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Whether `name` resolves to a fact module.
    pub fn is_fact(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    /// A fresh instance of the named task module.
    pub fn get_task(&self, name: &str) -> Result<Box<dyn TaskModule>> {
        match self.tasks.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(Error::ModuleNotFound(name.to_string())),
        }
    }

    /// Runs the named fact module and returns what it collected.
    pub fn collect_fact(&self, name: &str) -> Result<OrderedMap> {
        match self.facts.get(name) {
            Some(factory) => factory().collect(),
            None => Err(Error::ModuleNotFound(name.to_string())),
        }
    }

    /// Registered task module names, sorted.
    pub fn task_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tasks.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Registered fact module names, sorted.
    pub fn fact_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.facts.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::with_builtins();
        for name in ["command", "shell", "copy", "file", "stat", "apt", "set_fact"] {
            assert!(registry.is_task(name), "missing task module {}", name);
        }
        for name in ["system", "caps", "apparmor"] {
            assert!(registry.is_fact(name), "missing fact module {}", name);
        }
        assert!(!registry.is_task("no_such_module"));
    }

    #[test]
    fn get_task_returns_fresh_instances() {
        let registry = Registry::with_builtins();
        let a = registry.get_task("command").unwrap();
        let b = registry.get_task("command").unwrap();
        assert_eq!(a.name(), "command");
        assert_eq!(b.name(), "command");
    }

    #[test]
    fn unknown_module_is_an_error() {
        let registry = Registry::with_builtins();
        let err = registry.get_task("frobnicate").err().unwrap();
        assert!(err.to_string().contains("frobnicate"));
    }
}

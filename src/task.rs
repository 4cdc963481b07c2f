//! Task parsing: one YAML mapping node becomes either a leaf task bound to a
//! module or a container of sub-tasks.
//!
//! Control keys (name, when, vars and friends) are decoded first; every other
//! key is a candidate module key. The first key the registry recognizes as a
//! task module wins, its module instance is created and fed the remaining
//! fields, and anything left unconsumed fails the parse. A task is never
//! both a block and a leaf.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::modules::TaskModule;
use crate::omap::{OrderedMap, Value};
use crate::registry::Registry;

/// Keys with this prefix fall back to their unprefixed module name.
const LEGACY_PREFIX: &str = "win_";

#[derive(Default)]
pub struct Task {
    pub name: String,
    pub environment: Option<OrderedMap>,
    /// Condition deciding whether the task runs at all.
    pub when: Option<String>,
    /// Condition re-evaluating failure after the module ran.
    pub failed_when: Option<String>,
    pub r#become: bool,
    pub vars: Option<OrderedMap>,
    /// Variable name the task result is stored under.
    pub register: Option<String>,
    /// Explicit override of which host the task executes on.
    pub delegate_to: Option<String>,
    pub with_items: Vec<String>,
    pub with_dict: Option<OrderedMap>,

    /// Sub-tasks of a container task. Mutually exclusive with `module`.
    pub block: Vec<Task>,

    /// Resolved module key, empty for container tasks.
    pub module_name: String,
    /// The instantiated module, populated during parsing.
    pub module: Option<Box<dyn TaskModule>>,
}

impl Task {
    /// Parses one task mapping node.
    pub fn parse(node: OrderedMap, registry: &Registry) -> Result<Self> {
        let mut fields = node.clone();
        let mut task = Task::default();

        if let Some(v) = fields.pop("name") {
            task.name = v.to_display_string();
        }
        // A malformed control field is a parse error, never silently dropped.
        task.environment = pop_map(&mut fields, "environment", &task.name)?;
        if let Some(v) = fields.pop("when") {
            task.when = Some(v.to_display_string());
        }
        if let Some(v) = fields.pop("failed_when") {
            task.failed_when = Some(v.to_display_string());
        }
        if let Some(v) = fields.pop("become") {
            task.r#become = v
                .as_bool()
                .ok_or_else(|| field_error(&task.name, "become", "a boolean", &v))?;
        }
        task.vars = pop_map(&mut fields, "vars", &task.name)?;
        if let Some(v) = fields.pop("register") {
            task.register = Some(v.to_display_string());
        }
        if let Some(v) = fields.pop("delegate_to") {
            task.delegate_to = Some(v.to_display_string());
        }
        if let Some(v) = fields.pop("with_items") {
            task.with_items = v
                .as_string_list()
                .ok_or_else(|| field_error(&task.name, "with_items", "a list of scalars", &v))?;
        }
        task.with_dict = pop_map(&mut fields, "with_dict", &task.name)?;

        let block = match fields.pop("block") {
            None => None,
            Some(Value::List(children)) => Some(children),
            Some(other) => {
                return Err(field_error(&task.name, "block", "a list of tasks", &other));
            }
        };

        // The leftover keys are module candidates. Legacy platform-prefixed
        // keys are folded into their canonical name first.
        let mut task_fields = OrderedMap::new();
        for (key, value) in fields.iter() {
            let canonical = match key.strip_prefix(LEGACY_PREFIX) {
                Some(stripped) if registry.is_task(stripped) => {
                    tracing::warn!(
                        "task '{}': treating legacy key '{}' as '{}'",
                        task.name,
                        key,
                        stripped
                    );
                    stripped.to_string()
                }
                _ => key.to_string(),
            };
            if task.module_name.is_empty() && registry.is_task(&canonical) {
                task.module_name = canonical.clone();
            }
            task_fields.set(canonical, value.clone());
        }

        // A container task needs no module key.
        if let Some(children) = block {
            if !children.is_empty() {
                if !task_fields.is_empty() {
                    return Err(Error::UnknownTaskFields {
                        task: task.name.clone(),
                        count: task_fields.len(),
                        yaml: task_fields.to_yaml().unwrap_or_default(),
                    });
                }
                task.module_name.clear();
                for child in children {
                    match child {
                        Value::Map(map) => task.block.push(Task::parse(map, registry)?),
                        other => {
                            return Err(Error::PlaybookStructure(format!(
                                "block entry of task '{}' must be a mapping, got {}",
                                task.name,
                                other.to_display_string()
                            )));
                        }
                    }
                }
                return Ok(task);
            }
        }

        if task.module_name.is_empty() {
            return Err(Error::ModuleNotImplemented {
                task: task.name.clone(),
                yaml: node.to_yaml().unwrap_or_default(),
            });
        }

        let mut module = registry.get_task(&task.module_name)?;
        module
            .set_data(&mut task_fields)
            .map_err(|source| Error::module_data(task.module_name.clone(), source))?;

        // Keys not recognized by the parser nor consumed by the module are
        // playbook mistakes, never silently dropped.
        if !task_fields.is_empty() {
            return Err(Error::UnknownTaskFields {
                task: task.name.clone(),
                count: task_fields.len(),
                yaml: task_fields.to_yaml().unwrap_or_default(),
            });
        }

        task.module = Some(module);
        Ok(task)
    }

    /// Whether this task is a container of sub-tasks.
    pub fn is_block(&self) -> bool {
        !self.block.is_empty()
    }

    /// The task as an ordered mapping: control fields first, then the
    /// module's own fields as siblings.
    pub fn to_map(&self) -> OrderedMap {
        let mut out = OrderedMap::new();
        if !self.name.is_empty() {
            out.set("name", self.name.clone());
        }
        if let Some(ref env) = self.environment {
            out.set("environment", env.clone());
        }
        if let Some(ref when) = self.when {
            out.set("when", when.clone());
        }
        if let Some(ref failed_when) = self.failed_when {
            out.set("failed_when", failed_when.clone());
        }
        if self.r#become {
            out.set("become", true);
        }
        if let Some(ref vars) = self.vars {
            out.set("vars", vars.clone());
        }
        if let Some(ref register) = self.register {
            out.set("register", register.clone());
        }
        if let Some(ref delegate_to) = self.delegate_to {
            out.set("delegate_to", delegate_to.clone());
        }
        if !self.with_items.is_empty() {
            out.set(
                "with_items",
                Value::List(
                    self.with_items
                        .iter()
                        .map(|s| Value::String(s.clone()))
                        .collect(),
                ),
            );
        }
        if let Some(ref with_dict) = self.with_dict {
            out.set("with_dict", with_dict.clone());
        }
        if self.is_block() {
            out.set(
                "block",
                Value::List(self.block.iter().map(|t| Value::Map(t.to_map())).collect()),
            );
        } else if let Some(ref module) = self.module {
            out.extend(module.get_data());
        }
        out
    }

    /// YAML document of this task.
    pub fn to_yaml(&self) -> Result<String> {
        crate::omap::to_yaml(&self.to_map())
    }
}

fn pop_map(fields: &mut OrderedMap, field: &str, task: &str) -> Result<Option<OrderedMap>> {
    match fields.pop(field) {
        None => Ok(None),
        Some(Value::Map(m)) => Ok(Some(m)),
        Some(other) => Err(field_error(task, field, "a mapping", &other)),
    }
}

fn field_error(task: &str, field: &str, expected: &str, got: &Value) -> Error {
    Error::TaskField {
        task: task.to_string(),
        field: field.to_string(),
        message: format!("expected {}, got {}", expected, got.to_display_string()),
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let map = self.to_map();
        let mut state = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in map.iter() {
            state.serialize_entry(key, value)?;
        }
        state.end()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("module_name", &self.module_name)
            .field("block", &self.block.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_one(yaml: &str) -> Result<Task> {
        let registry = Registry::with_builtins();
        let node: OrderedMap = serde_yaml::from_str(yaml).unwrap();
        Task::parse(node, &registry)
    }

    #[test]
    fn leaf_task_resolves_module_by_key() {
        let task = parse_one("name: Say hi\ncommand: echo hi").unwrap();
        assert_eq!(task.name, "Say hi");
        assert_eq!(task.module_name, "command");
        assert!(task.module.is_some());
        assert!(!task.is_block());
    }

    #[test]
    fn first_module_key_wins() {
        // Both keys resolve to task modules; document order decides.
        let task = parse_one("name: Two keys\nshell: echo a\ncommand: echo b");
        // The second module key stays unconsumed, which is a parse error,
        // but the chosen module must be the first one in document order.
        match task {
            Err(Error::UnknownTaskFields { yaml, .. }) => {
                assert!(yaml.contains("command"), "{}", yaml);
            }
            other => panic!("expected unknown-fields error, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_module_key_is_explicit_error() {
        let err = parse_one("name: Nothing to do\nfrobnicate: yes").unwrap_err();
        match err {
            Error::ModuleNotImplemented { task, yaml } => {
                assert_eq!(task, "Nothing to do");
                assert!(yaml.contains("frobnicate"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn unknown_sibling_field_is_rejected() {
        let err = parse_one("name: Typo\ncommand: echo hi\nregster: out").unwrap_err();
        match err {
            Error::UnknownTaskFields { count, yaml, .. } => {
                assert_eq!(count, 1);
                assert!(yaml.contains("regster"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn malformed_control_fields_are_rejected() {
        for (yaml, field) in [
            ("name: Bad env\nenvironment: PATH=/bin\ncommand: echo hi", "environment"),
            ("name: Bad vars\nvars: word\ncommand: echo hi", "vars"),
            ("name: Bad dict\nwith_dict: word\ncommand: echo hi", "with_dict"),
            ("name: Bad become\nbecome: maybe\ncommand: echo hi", "become"),
            ("name: Bad block\nblock: echo hi", "block"),
        ] {
            match parse_one(yaml) {
                Err(Error::TaskField { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected a field error for '{}', got {:?}", field, other.err()),
            }
        }
    }

    #[test]
    fn legacy_prefixed_key_is_normalized() {
        let task = parse_one("name: Legacy\nwin_command: echo hi").unwrap();
        assert_eq!(task.module_name, "command");
    }

    #[test]
    fn block_task_parses_children_recursively() {
        let task = parse_one(
            "name: Grouped\nblock:\n  - name: One\n    command: echo one\n  - name: Two\n    shell: echo two",
        )
        .unwrap();
        assert!(task.is_block());
        assert_eq!(task.block.len(), 2);
        assert_eq!(task.block[0].module_name, "command");
        assert_eq!(task.block[1].module_name, "shell");
        assert!(task.module.is_none());
    }

    #[test]
    fn control_fields_survive_serialization() {
        let task = parse_one(
            "name: Careful\nwhen: ansible_system == 'Linux'\nregister: result\ncommand: echo hi",
        )
        .unwrap();
        let map = task.to_map();
        assert_eq!(
            map.keys(),
            vec!["name", "when", "register", "command"]
        );
    }

    #[test]
    fn serialization_appends_module_fields_as_siblings() {
        let task = parse_one("name: Map form\ncommand:\n  cmd: echo\n  argv:\n    - hi").unwrap();
        let yaml = task.to_yaml().unwrap();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("command:"));
        assert!(yaml.contains("cmd: echo"));
    }
}

//! Playbook loading and the sequential play loop.
//!
//! A playbook file is a YAML list of plays. Each play carries ordered
//! pre-task, task and post-task sections plus role references. Tasks run
//! strictly in order and the first error aborts the play.

use std::path::Path;

use crate::error::{Error, Result};
use crate::exec;
use crate::inventory::Host;
use crate::modules::facts;
use crate::omap::{OrderedMap, Value};
use crate::registry::Registry;
use crate::task::Task;
use crate::template;
use crate::vars::{self, VarMap};

/// A named reference to a role. Body resolution is not implemented yet.
#[derive(Debug, Default)]
pub struct Role {
    pub name: String,
    pub environment: Option<OrderedMap>,
    pub vars: Option<OrderedMap>,
}

impl Role {
    fn parse(value: Value) -> Result<Self> {
        match value {
            // Shorthand: `- rolename`
            Value::String(name) => Ok(Role {
                name,
                ..Role::default()
            }),
            Value::Map(mut map) => {
                let name = map
                    .pop("role")
                    .map(|v| v.to_display_string())
                    .ok_or_else(|| {
                        Error::PlaybookStructure("role entry without a 'role' key".to_string())
                    })?;
                let environment = match map.pop("environment") {
                    Some(Value::Map(m)) => Some(m),
                    _ => None,
                };
                let vars = match map.pop("vars") {
                    Some(Value::Map(m)) => Some(m),
                    _ => None,
                };
                Ok(Role {
                    name,
                    environment,
                    vars,
                })
            }
            other => Err(Error::PlaybookStructure(format!(
                "role entry must be a name or mapping, got {}",
                other.to_display_string()
            ))),
        }
    }
}

/// One play: ordered task sections applied to a host.
#[derive(Debug, Default)]
pub struct Playbook {
    pub name: String,
    pub environment: Option<OrderedMap>,
    pub gather_facts: bool,
    pub pre_tasks: Vec<Task>,
    pub tasks: Vec<Task>,
    pub roles: Vec<Role>,
    pub post_tasks: Vec<Task>,
}

impl Playbook {
    fn parse(mut node: OrderedMap, registry: &Registry) -> Result<Self> {
        let mut play = Playbook {
            gather_facts: true,
            ..Playbook::default()
        };
        if let Some(v) = node.pop("name") {
            play.name = v.to_display_string();
        }
        if let Some(Value::Map(m)) = node.pop("environment") {
            play.environment = Some(m);
        }
        if let Some(v) = node.pop("gather_facts") {
            play.gather_facts = v.as_bool().unwrap_or(true);
        }
        play.pre_tasks = parse_tasks(node.pop("pre_tasks"), registry)?;
        play.tasks = parse_tasks(node.pop("tasks"), registry)?;
        play.post_tasks = parse_tasks(node.pop("post_tasks"), registry)?;
        if let Some(Value::List(entries)) = node.pop("roles") {
            for entry in entries {
                play.roles.push(Role::parse(entry)?);
            }
        }
        if !node.is_empty() {
            return Err(Error::PlaybookStructure(format!(
                "unknown play fields: {:?}",
                node.keys()
            )));
        }
        Ok(play)
    }

    /// Runs the play against one host.
    ///
    /// Variable precedence, lowest to highest: host variables, gathered
    /// facts, extra vars.
    pub fn run(&mut self, host: &Host, extra_vars: &VarMap) -> Result<()> {
        tracing::info!("play '{}' on host '{}'", self.name, host.name);

        let facts = if self.gather_facts && exec::host_is_local(&host.vars) {
            Some(facts::collect_all())
        } else {
            None
        };
        let mut scope = vars::assemble(&host.vars, facts.as_ref(), extra_vars);

        run_tasks(&mut self.pre_tasks, &mut scope)?;
        for role in &self.roles {
            tracing::warn!("role '{}': body resolution is not implemented yet", role.name);
        }
        run_tasks(&mut self.tasks, &mut scope)?;
        run_tasks(&mut self.post_tasks, &mut scope)?;
        Ok(())
    }

    /// YAML document of this play.
    pub fn to_yaml(&self) -> Result<String> {
        crate::omap::to_yaml(&self.to_map())
    }

    fn to_map(&self) -> OrderedMap {
        let mut out = OrderedMap::new();
        if !self.name.is_empty() {
            out.set("name", self.name.clone());
        }
        if let Some(ref env) = self.environment {
            out.set("environment", env.clone());
        }
        if !self.gather_facts {
            out.set("gather_facts", false);
        }
        for (key, tasks) in [
            ("pre_tasks", &self.pre_tasks),
            ("tasks", &self.tasks),
        ] {
            if !tasks.is_empty() {
                out.set(
                    key,
                    Value::List(tasks.iter().map(|t| Value::Map(t.to_map())).collect()),
                );
            }
        }
        if !self.roles.is_empty() {
            out.set(
                "roles",
                Value::List(
                    self.roles
                        .iter()
                        .map(|r| {
                            let mut m = OrderedMap::new();
                            m.set("role", r.name.clone());
                            Value::Map(m)
                        })
                        .collect(),
                ),
            );
        }
        if !self.post_tasks.is_empty() {
            out.set(
                "post_tasks",
                Value::List(self.post_tasks.iter().map(|t| Value::Map(t.to_map())).collect()),
            );
        }
        out
    }
}

fn parse_tasks(section: Option<Value>, registry: &Registry) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    if let Some(Value::List(entries)) = section {
        for entry in entries {
            match entry {
                Value::Map(map) => tasks.push(Task::parse(map, registry)?),
                other => {
                    return Err(Error::PlaybookStructure(format!(
                        "task entry must be a mapping, got {}",
                        other.to_display_string()
                    )));
                }
            }
        }
    }
    Ok(tasks)
}

/// Runs one task section in order, fail-fast.
///
/// Handles the per-task scope: `when` skipping, task vars, loops, the
/// register variable and fact merging.
fn run_tasks(tasks: &mut [Task], scope: &mut VarMap) -> Result<()> {
    for task in tasks {
        run_one(task, scope)?;
    }
    Ok(())
}

fn run_one(task: &mut Task, scope: &mut VarMap) -> Result<()> {
    if let Some(ref when) = task.when {
        if !template::eval_condition(when, scope)? {
            tracing::debug!("task '{}' skipped by condition", task.name);
            return Ok(());
        }
    }

    // Task-level vars extend the scope for this task only.
    let mut task_scope = scope.clone();
    if let Some(ref vars) = task.vars {
        vars::apply_facts(&mut task_scope, vars);
    }

    // Children of a container see the container's vars. Registers and
    // facts they publish flow back out, the container vars do not.
    if task.is_block() {
        let shadowed: Vec<String> = task
            .vars
            .as_ref()
            .map(|vars| vars.keys())
            .unwrap_or_default();
        for child in &mut task.block {
            run_one(child, &mut task_scope)?;
        }
        for (key, value) in task_scope {
            if !shadowed.iter().any(|k| k == &key) {
                scope.insert(key, value);
            }
        }
        return Ok(());
    }

    tracing::info!("task '{}'", task.name);
    let out = if !task.with_items.is_empty() {
        // Loop runs sequentially, last result wins the register slot.
        let mut last = OrderedMap::new();
        for item in task.with_items.clone() {
            let mut item_scope = task_scope.clone();
            item_scope.insert("item".to_string(), Value::String(item));
            last = task.run(&item_scope)?;
        }
        last
    } else if let Some(with_dict) = task.with_dict.clone() {
        // Each entry is exposed as item.key / item.value.
        let mut last = OrderedMap::new();
        for (key, value) in with_dict.iter() {
            let mut entry = OrderedMap::new();
            entry.set("key", key);
            entry.set("value", value.clone());
            let mut item_scope = task_scope.clone();
            item_scope.insert("item".to_string(), Value::Map(entry));
            last = task.run(&item_scope)?;
        }
        last
    } else {
        task.run(&task_scope)?
    };

    // set_fact and setup publish variables through the shared scope.
    if let Some(Value::Map(facts)) = out.get("ansible_facts") {
        vars::apply_facts(scope, facts);
    } else if task.module_name == "setup" {
        vars::apply_facts(scope, &out);
    }

    if let Some(ref failed_when) = task.failed_when {
        if template::eval_condition(failed_when, &task_scope)? {
            return Err(Error::RemoteExecution {
                task: task.name.clone(),
                message: format!("failed_when condition '{}' was met", failed_when),
            });
        }
    }

    if let Some(ref register) = task.register {
        scope.insert(register.clone(), Value::Map(out));
    }
    Ok(())
}

/// Loads every play from a playbook file.
pub fn load(path: &Path, registry: &Registry) -> Result<Vec<Playbook>> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, registry)
}

/// Parses every play from playbook YAML text.
pub fn parse(text: &str, registry: &Registry) -> Result<Vec<Playbook>> {
    let nodes: Vec<OrderedMap> = serde_yaml::from_str(text)?;
    nodes
        .into_iter()
        .map(|node| Playbook::parse(node, registry))
        .collect()
}

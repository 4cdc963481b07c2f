//! Built-in task and fact modules.
//!
//! Task modules decode their parameters from task data through the schema
//! engine, resolve any pending templates against host variables, and execute.
//! Fact modules collect information about the host they run on.

use crate::error::Result;
use crate::omap::OrderedMap;
use crate::registry::Registry;
use crate::schema::SchemaError;
use crate::vars::VarMap;

pub mod apt;
pub mod command;
pub mod copy;
pub mod facts;
pub mod file;
pub mod include_role;
pub mod set_fact;
pub mod setup;
pub mod shell;
pub mod stat;
pub mod uri;

/// A task module: one unit of work a playbook task can run.
pub trait TaskModule {
    /// Module name as written in playbook YAML.
    fn name(&self) -> &'static str;

    /// Populates parameters from task data, consuming recognized keys.
    /// Keys left in `data` afterwards are unknown to this module.
    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError>;

    /// Emits the current parameters as an ordered map for serialization.
    fn get_data(&self) -> OrderedMap;

    /// Executes the module on the local host and returns its result map.
    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap>;
}

/// A fact module: gathers one group of facts about the local host.
pub trait FactModule {
    /// Fact name, used as the key under which collected data is stored.
    fn name(&self) -> &'static str;

    /// Collects this module's facts.
    fn collect(&self) -> Result<OrderedMap>;
}

/// Resolves every pending template field of a parameter struct against the
/// effective variables, returning a resolved copy for this run.
///
/// The stored parameters keep their template text untouched so a looped
/// task re-renders against each iteration's scope.
pub fn resolve_params<T: crate::schema::ParamSchema>(params: &T, vars: &VarMap) -> Result<T> {
    let mut resolved = params.clone();
    for def in T::fields() {
        let mut tvalue = (def.get)(&resolved);
        if tvalue.is_template() {
            tvalue.resolve(vars)?;
            (def.set)(&mut resolved, tvalue);
        }
    }
    Ok(resolved)
}

/// Pops the module's own key from task data and returns its parameter map.
pub(crate) fn pop_module_map(
    data: &mut OrderedMap,
    module: &'static str,
) -> std::result::Result<OrderedMap, SchemaError> {
    let payload = data.pop(module).ok_or_else(|| SchemaError::ModuleKey {
        module: module.to_string(),
        message: "key not found in task data".to_string(),
    })?;
    match payload {
        crate::omap::Value::Map(fmap) => Ok(fmap),
        other => Err(SchemaError::ModuleKey {
            module: module.to_string(),
            message: format!("expected a parameter map, got {}", other.to_display_string()),
        }),
    }
}

/// Runs a prepared subprocess, capturing output.
///
/// Returns trimmed-for-logging but otherwise untouched stdout and stderr,
/// with Windows line endings normalized, plus the exit code.
pub(crate) fn run_and_capture(
    command: &mut std::process::Command,
) -> std::io::Result<(String, String, i32)> {
    tracing::debug!("executing: {:?}", command);
    let output = command.output()?;

    let stdout = String::from_utf8_lossy(&output.stdout).replace("\r\n", "\n");
    let stderr = String::from_utf8_lossy(&output.stderr).replace("\r\n", "\n");

    if !stdout.trim().is_empty() {
        tracing::debug!("stdout: {}", stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        tracing::debug!("stderr: {}", stderr.trim_end());
    }

    let rc = output.status.code().unwrap_or(-1);
    Ok((stdout, stderr, rc))
}

/// Registers every built-in task and fact module.
pub fn register_builtins(registry: &mut Registry) {
    registry.register_task("command", || Box::new(command::Command::default()));
    registry.register_task("shell", || Box::new(shell::Shell::default()));
    registry.register_task("copy", || Box::new(copy::Copy::default()));
    registry.register_task("file", || Box::new(file::File::default()));
    registry.register_task("stat", || Box::new(stat::Stat::default()));
    registry.register_task("apt", || Box::new(apt::Apt::default()));
    registry.register_task("set_fact", || Box::new(set_fact::SetFact::default()));
    registry.register_task("uri", || Box::new(uri::Uri::default()));
    registry.register_task("include_role", || {
        Box::new(include_role::IncludeRole::default())
    });
    registry.register_task("setup", || Box::new(setup::Setup::default()));

    registry.register_fact("system", || Box::new(facts::system::System));
    registry.register_fact("caps", || Box::new(facts::caps::Caps));
    registry.register_fact("apparmor", || Box::new(facts::apparmor::AppArmor));
}

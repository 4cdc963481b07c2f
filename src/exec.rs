//! Execution routing: local module invocation or agent deployment over a
//! transport.
//!
//! A leaf task either runs its module in-process or, when the effective
//! target is remote, ships the embedded agent binary to the target and runs
//! the task there. There is no fallback from remote to local; every failure
//! on the remote path fails the task.

use crate::embedbin;
use crate::error::{Error, Result};
use crate::omap::OrderedMap;
use crate::task::Task;
use crate::transport;
use crate::vars::{self, VarMap};

/// Where the agent binary lands on a unix target.
const AGENT_PATH_UNIX: &str = "/tmp/runbook-agent";
/// Where the agent binary lands on a Windows target.
const AGENT_PATH_WINDOWS: &str = "C:\\Windows\\Temp\\runbook-agent.exe";

/// Decides whether a task must execute on a remote target.
///
/// Local iff delegated to localhost, or not delegated at all while the
/// connection variable is "local" or unset. An explicit delegation to any
/// other host is remote regardless of the connection variable.
pub fn is_remote(delegate_to: Option<&str>, vars: &VarMap) -> bool {
    match delegate_to {
        Some("localhost") => false,
        Some("") | None => !matches!(
            vars::get_str(vars, "ansible_connection"),
            None | Some("local")
        ),
        Some(_) => true,
    }
}

/// Whether a host's own variables point at the local machine.
pub fn host_is_local(host_vars: &VarMap) -> bool {
    matches!(
        vars::get_str(host_vars, "ansible_connection"),
        None | Some("local")
    )
}

impl Task {
    /// Executes this task with the given effective variables.
    pub fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        if self.is_block() {
            // Children run in declaration order, first failure aborts.
            for child in &mut self.block {
                child.run(vars)?;
            }
            return Ok(OrderedMap::new());
        }

        if is_remote(self.delegate_to.as_deref(), vars) {
            self.run_remote(vars)
        } else {
            let module = self
                .module
                .as_mut()
                .ok_or_else(|| Error::ModuleNotFound(self.module_name.clone()))?;
            module.run(vars)
        }
    }

    fn run_remote(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        let connection = vars::get_str(vars, "ansible_connection").unwrap_or("ssh");
        tracing::debug!(
            "task '{}' routed to remote target over {}",
            self.name,
            connection
        );
        let mut transport = transport::connect(connection, vars)?;

        let (kernel, arch) = transport.check()?;
        let binary = embedbin::get_embedded_binary(&kernel, &arch)?;
        let agent_path = if kernel == "windows" {
            AGENT_PATH_WINDOWS
        } else {
            AGENT_PATH_UNIX
        };
        transport.copy(&mut binary.as_slice(), agent_path, 0o750)?;

        // The agent reads a task+vars envelope on stdin and answers with
        // the result document on stdout.
        let mut envelope = OrderedMap::new();
        envelope.set("task", self.to_map());
        envelope.set("vars", vars::to_map(vars));
        let payload = crate::omap::to_yaml(&envelope)?;

        let output = transport.execute_input(&format!("{} agent", agent_path), payload.as_bytes())?;
        if output.exit_code != 0 {
            return Err(Error::RemoteExecution {
                task: self.name.clone(),
                message: format!(
                    "agent exited with code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        let text = output.stdout.trim_start_matches("---\n");
        if text.trim().is_empty() {
            return Ok(OrderedMap::new());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

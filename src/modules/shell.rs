//! The `shell` task module: runs a command line through the system shell.

use std::process::Stdio;

use crate::error::{Error, Result};
use crate::modules::{self, TaskModule};
use crate::omap::{OrderedMap, Value};
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Shell {
    params: Params,
    // Free-form string input, round-tripped as a string on output.
    shell_is_string: bool,
}

#[derive(Default, Clone)]
struct Params {
    /// Command line to pass to the shell.
    cmd: TValue,
    /// Change into this directory before running the command.
    chdir: TValue,
    /// Set the stdin of the command directly to the specified value.
    stdin: TValue,
    /// If true, append a newline to stdin data.
    stdin_add_newline: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("cmd", |p, v| p.cmd = v, |p| p.cmd.clone()).required(),
            field::<Params>("chdir", |p, v| p.chdir = v, |p| p.chdir.clone()),
            field::<Params>("stdin", |p, v| p.stdin = v, |p| p.stdin.clone()),
            field::<Params>(
                "stdin_add_newline",
                |p, v| p.stdin_add_newline = v,
                |p| p.stdin_add_newline.clone(),
            )
            .default(DefaultVal::Bool(true)),
        ];
        FIELDS
    }
}

impl TaskModule for Shell {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let payload = data.pop("shell").ok_or_else(|| SchemaError::ModuleKey {
            module: "shell".to_string(),
            message: "key not found in task data".to_string(),
        })?;
        let mut fmap = match payload {
            Value::Map(fmap) => fmap,
            other @ (Value::Null | Value::List(_)) => {
                return Err(SchemaError::ModuleKey {
                    module: "shell".to_string(),
                    message: format!(
                        "expected a string or parameter map, got {}",
                        other.to_display_string()
                    ),
                });
            }
            scalar => {
                // Any scalar is one command line, bare YAML words included.
                self.shell_is_string = true;
                let mut fmap = OrderedMap::new();
                fmap.set("cmd", scalar.to_display_string());
                fmap
            }
        };
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        if self.shell_is_string {
            data.set("shell", self.params.cmd.to_value());
        } else {
            data.set("shell", schema::get_data(&self.params));
        }
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        let params = modules::resolve_params(&self.params, vars)?;

        let cmdline = params
            .cmd
            .as_str()
            .ok_or_else(|| Error::module_execution("shell", "no command line to execute"))?;

        let shell = if cfg!(windows) { "cmd" } else { "/bin/sh" };
        let flag = if cfg!(windows) { "/C" } else { "-c" };
        let mut command = std::process::Command::new(shell);
        command.arg(flag).arg(cmdline);
        if let Some(chdir) = params.chdir.as_str() {
            command.current_dir(chdir);
        }

        let (mut stdout, mut stderr, rc) = match params.stdin.as_str() {
            Some(input) => {
                use std::io::Write;
                let mut input = input.to_string();
                if params.stdin_add_newline.as_bool().unwrap_or(true) {
                    input.push('\n');
                }
                command.stdin(Stdio::piped());
                command.stdout(Stdio::piped());
                command.stderr(Stdio::piped());
                tracing::debug!("executing: {:?}", command);
                let mut child = command.spawn()?;
                if let Some(mut pipe) = child.stdin.take() {
                    pipe.write_all(input.as_bytes())?;
                }
                let output = child.wait_with_output()?;
                (
                    String::from_utf8_lossy(&output.stdout).replace("\r\n", "\n"),
                    String::from_utf8_lossy(&output.stderr).replace("\r\n", "\n"),
                    output.status.code().unwrap_or(-1),
                )
            }
            None => modules::run_and_capture(&mut command)?,
        };

        stdout.truncate(stdout.trim_end_matches('\n').len());
        stderr.truncate(stderr.trim_end_matches('\n').len());
        if rc != 0 {
            let message = if stderr.is_empty() { &stdout } else { &stderr };
            return Err(Error::module_execution(
                "shell",
                format!("exit code {}: {}", rc, message),
            ));
        }

        let mut out = OrderedMap::new();
        out.set("stdout", stdout);
        out.set("stderr", stderr);
        out.set("rc", rc as i64);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_form_keeps_whole_line_as_cmd() {
        let mut module = Shell::default();
        let mut data: OrderedMap = serde_yaml::from_str("shell: echo $HOME > /tmp/out").unwrap();
        module.set_data(&mut data).unwrap();
        assert_eq!(module.params.cmd.as_str(), Some("echo $HOME > /tmp/out"));
        assert!(module.shell_is_string);
    }

    #[test]
    fn run_goes_through_the_shell() {
        let mut module = Shell::default();
        let mut data: OrderedMap = serde_yaml::from_str("shell: echo one && echo two").unwrap();
        module.set_data(&mut data).unwrap();
        let out = module.run(&VarMap::new()).unwrap();
        assert_eq!(out.get("stdout").unwrap().as_str(), Some("one\ntwo"));
    }

    #[test]
    fn template_cmd_resolves_before_execution() {
        let mut module = Shell::default();
        let mut data: OrderedMap = serde_yaml::from_str("shell: 'echo {{ greeting }}'").unwrap();
        module.set_data(&mut data).unwrap();
        assert!(module.params.cmd.is_template());

        let mut vars = VarMap::new();
        vars.insert("greeting".to_string(), Value::String("hello".into()));
        let out = module.run(&vars).unwrap();
        assert_eq!(out.get("stdout").unwrap().as_str(), Some("hello"));
    }

    #[test]
    fn template_cmd_rerenders_on_every_run() {
        let mut module = Shell::default();
        let mut data: OrderedMap = serde_yaml::from_str("shell: 'echo {{ item }}'").unwrap();
        module.set_data(&mut data).unwrap();

        for item in ["alpha", "beta"] {
            let mut vars = VarMap::new();
            vars.insert("item".to_string(), Value::String(item.to_string()));
            let out = module.run(&vars).unwrap();
            assert_eq!(out.get("stdout").unwrap().as_str(), Some(item));
        }
        // the stored command line is still the template
        assert!(module.params.cmd.is_template());
    }
}

//! The `command` task module: runs an executable without a shell.
//!
//! Accepts either the map form (`cmd`, `argv`, ...) or the free-form string
//! form, where the whole line is split into `cmd` plus `argv`. The string
//! form is remembered so the task serializes back the way it was written.

use std::process::Stdio;

use crate::error::{Error, Result};
use crate::modules::{self, TaskModule};
use crate::omap::{OrderedMap, Value};
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::template;
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Command {
    params: Params,
    // Free-form string input, round-tripped as a string on output.
    command_is_string: bool,
}

#[derive(Default, Clone)]
struct Params {
    /// Executable to run.
    cmd: TValue,
    /// Arguments of the executable.
    argv: TValue,
    /// Change into this directory before running the command.
    chdir: TValue,
    /// Set the stdin of the command directly to the specified value.
    stdin: TValue,
    /// If true, append a newline to stdin data.
    stdin_add_newline: TValue,
    /// Strip empty lines from the end of stdout/stderr in the result.
    strip_empty_ends: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("cmd", |p, v| p.cmd = v, |p| p.cmd.clone()).required(),
            field::<Params>("argv", |p, v| p.argv = v, |p| p.argv.clone()),
            field::<Params>("chdir", |p, v| p.chdir = v, |p| p.chdir.clone()),
            field::<Params>("stdin", |p, v| p.stdin = v, |p| p.stdin.clone()),
            field::<Params>(
                "stdin_add_newline",
                |p, v| p.stdin_add_newline = v,
                |p| p.stdin_add_newline.clone(),
            )
            .default(DefaultVal::Bool(true)),
            field::<Params>(
                "strip_empty_ends",
                |p, v| p.strip_empty_ends = v,
                |p| p.strip_empty_ends.clone(),
            )
            .default(DefaultVal::Bool(true)),
        ];
        FIELDS
    }
}

impl TaskModule for Command {
    fn name(&self) -> &'static str {
        "command"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let payload = data.pop("command").ok_or_else(|| SchemaError::ModuleKey {
            module: "command".to_string(),
            message: "key not found in task data".to_string(),
        })?;
        let mut fmap = match payload {
            Value::Map(fmap) => fmap,
            other @ (Value::Null | Value::List(_)) => {
                return Err(SchemaError::ModuleKey {
                    module: "command".to_string(),
                    message: format!(
                        "expected a string or parameter map, got {}",
                        other.to_display_string()
                    ),
                });
            }
            scalar => {
                // Free-form: any scalar is one command line. Bare words like
                // `false` or `1` arrive as non-string YAML scalars.
                let cmdline = scalar.to_display_string();
                self.command_is_string = true;
                let mut fmap = OrderedMap::new();
                if template::is_template(&cmdline) {
                    // The whole line renders against run variables first;
                    // splitting happens after resolution.
                    fmap.set("cmd", cmdline);
                } else {
                    let mut words =
                        shell_words::split(&cmdline).map_err(|e| SchemaError::ModuleKey {
                            module: "command".to_string(),
                            message: format!("unable to split command line: {}", e),
                        })?;
                    if !words.is_empty() {
                        fmap.set("cmd", words.remove(0));
                    }
                    if !words.is_empty() {
                        fmap.set(
                            "argv",
                            Value::List(words.into_iter().map(Value::String).collect()),
                        );
                    }
                }
                fmap
            }
        };
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        if self.command_is_string {
            let mut line = self.params.cmd.to_value().to_display_string();
            if let Some(argv) = self.params.argv.as_string_list() {
                if !argv.is_empty() {
                    line.push(' ');
                    line.push_str(&shell_words::join(argv.iter().map(String::as_str)));
                }
            }
            data.set("command", line);
        } else {
            data.set("command", schema::get_data(&self.params));
        }
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        let pending_split = self.command_is_string && self.params.cmd.is_template();
        let mut params = modules::resolve_params(&self.params, vars)?;
        if pending_split {
            // A templated command line only becomes splittable once rendered.
            let line = params.cmd.as_str().unwrap_or_default().to_string();
            let mut words = shell_words::split(&line).map_err(|e| {
                Error::module_execution("command", format!("unable to split command line: {}", e))
            })?;
            if words.is_empty() {
                return Err(Error::module_execution("command", "nothing to execute"));
            }
            params.cmd = TValue::Concrete(Value::String(words.remove(0)));
            if !words.is_empty() {
                params.argv = TValue::Concrete(Value::List(
                    words.into_iter().map(Value::String).collect(),
                ));
            }
        }

        let argv = params.argv.as_string_list().unwrap_or_default();
        let mut command = match params.cmd.as_str() {
            Some(cmd) => {
                let mut c = std::process::Command::new(cmd);
                c.args(&argv);
                c
            }
            None => {
                // Plain argv form: first item is the executable.
                let (head, tail) = argv
                    .split_first()
                    .ok_or_else(|| Error::module_execution("command", "nothing to execute"))?;
                let mut c = std::process::Command::new(head);
                c.args(tail);
                c
            }
        };
        if let Some(chdir) = params.chdir.as_str() {
            command.current_dir(chdir);
        }

        let strip = params.strip_empty_ends.as_bool().unwrap_or(true);
        match params.stdin.as_str() {
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
                let stdout = String::from_utf8_lossy(&output.stdout).replace("\r\n", "\n");
                let stderr = String::from_utf8_lossy(&output.stderr).replace("\r\n", "\n");
                let rc = output.status.code().unwrap_or(-1);
                result(strip, stdout, stderr, rc)
            }
            None => {
                let (stdout, stderr, rc) = modules::run_and_capture(&mut command)?;
                result(strip, stdout, stderr, rc)
            }
        }
    }
}

fn result(strip: bool, mut stdout: String, mut stderr: String, rc: i32) -> Result<OrderedMap> {
    if strip {
        stdout.truncate(stdout.trim_end_matches('\n').len());
        stderr.truncate(stderr.trim_end_matches('\n').len());
    }
    if rc != 0 {
        let message = if stderr.is_empty() { &stdout } else { &stderr };
        return Err(Error::module_execution(
            "command",
            format!("exit code {}: {}", rc, message),
        ));
    }
    let mut out = OrderedMap::new();
    out.set("stdout", stdout);
    out.set("stderr", stderr);
    out.set("rc", rc as i64);
    Ok(out)
}

//! Command line interface.
//!
//! Two run modes share one binary: `playbook` applies playbook files to the
//! inventory hosts, and `agent` is what the remote side of a transport runs
//! to execute a single shipped task.

use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, trace};

use crate::config::{self, PlaybookConfig};
use crate::error::{Error, Result};
use crate::inventory::{Host, Inventory};
use crate::omap::{OrderedMap, Value};
use crate::registry::Registry;
use crate::task::Task;
use crate::vars::{self, VarMap};
use crate::playbook;

/// Lightweight configuration management through YAML playbooks.
#[derive(Parser, Debug)]
#[command(name = "runbook")]
#[command(version)]
#[command(about = "Applies YAML playbooks locally or over SSH/WinRM", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML configuration file
    #[arg(short = 'c', long = "cfg", global = true, env = "RUNBOOK_CONFIG")]
    pub cfg: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run playbooks against the inventory hosts
    Playbook(PlaybookArgs),

    /// Execute a shipped task envelope (the remote end of a transport)
    Agent(AgentArgs),
}

#[derive(Args, Debug)]
pub struct PlaybookArgs {
    /// Playbook files to apply, in order
    #[arg(required = true)]
    pub playbooks: Vec<PathBuf>,

    /// Additional variables as key=value, or @file.yml to load a YAML file
    #[arg(short = 'e', long = "extra-vars", action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,

    /// Skip plays and tasks tagged with these values
    #[arg(long = "skip-tags", value_delimiter = ',')]
    pub skip_tags: Vec<String>,

    /// Inventory file path or comma separated host list
    #[arg(short = 'i', long = "inventory", action = clap::ArgAction::Append)]
    pub inventory: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Task envelope YAML files, or "-" for stdin (the default)
    pub inputs: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

pub fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Playbook(args) => run_playbooks(cli, args),
        Commands::Agent(args) => run_agent(args),
    }
}

fn run_playbooks(cli: &Cli, args: &PlaybookArgs) -> Result<i32> {
    let mut cfg = PlaybookConfig::default();
    config::read_config_file(&mut cfg, cli.cfg.as_deref())?;
    if !args.extra_vars.is_empty() {
        cfg.extra_vars = config::parse_extra_vars(&args.extra_vars)?;
    }
    if !args.skip_tags.is_empty() {
        cfg.skip_tags = args.skip_tags.clone();
    }
    if !args.inventory.is_empty() {
        cfg.inventory = Some(Inventory::new(&args.inventory)?);
    }

    let registry = Registry::with_builtins();

    let mut to_apply = Vec::new();
    for path in &args.playbooks {
        debug!("Loading playbook: {}", path.display());
        let plays = playbook::load(path, &registry)?;
        for play in &plays {
            trace!("Playbook {}:\n{}", path.display(), play.to_yaml()?);
        }
        to_apply.extend(plays);
    }

    // Without an inventory everything applies to the local host.
    let local = [Host::local()];
    let hosts: Vec<&Host> = match &cfg.inventory {
        Some(inv) if !inv.hosts.is_empty() => inv.hosts.iter().collect(),
        _ => local.iter().collect(),
    };

    for host in hosts {
        for play in &mut to_apply {
            println!(
                "\n{} [{}] on {} {}",
                "PLAY".bold(),
                play.name,
                host.name.cyan(),
                "*".repeat(30)
            );
            match play.run(host, &cfg.extra_vars) {
                Ok(()) => println!("{}: play '{}' complete", "ok".green(), play.name),
                Err(err) => {
                    println!("{}: {}", "failed".red().bold(), err);
                    return Err(err);
                }
            }
        }
    }
    Ok(0)
}

fn run_agent(args: &AgentArgs) -> Result<i32> {
    let inputs = if args.inputs.is_empty() {
        vec!["-".to_string()]
    } else {
        args.inputs.clone()
    };

    for input in &inputs {
        let text = if input == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(Error::Io)?;
            buf
        } else {
            std::fs::read_to_string(input).map_err(Error::Io)?
        };
        let result = run_envelope(&text)?;
        print!("---\n{}", crate::omap::to_yaml(&result)?);
    }
    Ok(0)
}

/// Executes one task envelope and returns the result document.
///
/// The envelope is a mapping with `task` and `vars` keys; a bare task
/// mapping is also accepted with an empty variable scope. The connection
/// is forced to local so a shipped task never hops further.
pub fn run_envelope(text: &str) -> Result<OrderedMap> {
    let mut doc: OrderedMap = serde_yaml::from_str(text).map_err(Error::YamlParse)?;
    let is_envelope = matches!(doc.get("task"), Some(Value::Map(_)));
    let (task_map, mut scope) = if is_envelope {
        let Some(Value::Map(task_map)) = doc.pop("task") else {
            unreachable!()
        };
        let scope = match doc.pop("vars") {
            Some(Value::Map(map)) => vars::from_map(&map),
            _ => VarMap::new(),
        };
        (task_map, scope)
    } else {
        (doc, VarMap::new())
    };
    scope.insert(
        "ansible_connection".to_string(),
        Value::String("local".to_string()),
    );

    let registry = Registry::with_builtins();
    let mut task = Task::parse(task_map, &registry)?;
    task.run(&scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_runs_task_with_vars() {
        let out = run_envelope(
            "task:\n  name: greet\n  command: echo {{ word }}\nvars:\n  word: hi\n",
        )
        .unwrap();
        assert_eq!(out.get("stdout").and_then(Value::as_str), Some("hi"));
        assert_eq!(out.get("rc").and_then(Value::as_int), Some(0));
    }

    #[test]
    fn bare_task_mapping_is_accepted() {
        let out = run_envelope("name: greet\ncommand: echo bare\n").unwrap();
        assert_eq!(out.get("stdout").and_then(Value::as_str), Some("bare"));
    }

    #[test]
    fn envelope_forces_local_connection() {
        // ansible_connection=ssh in the shipped vars must not cause a hop
        let out = run_envelope(
            "task:\n  command: echo once\nvars:\n  ansible_connection: ssh\n",
        )
        .unwrap();
        assert_eq!(out.get("stdout").and_then(Value::as_str), Some("once"));
    }

    #[test]
    fn cli_parses_playbook_flags() {
        let cli = Cli::parse_from([
            "runbook",
            "-vv",
            "playbook",
            "site.yml",
            "-e",
            "env=prod",
            "--skip-tags",
            "slow,manual",
            "-i",
            "hosts.ini",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Playbook(args) = &cli.command else {
            panic!("expected playbook subcommand");
        };
        assert_eq!(args.playbooks, vec![PathBuf::from("site.yml")]);
        assert_eq!(args.extra_vars, vec!["env=prod"]);
        assert_eq!(args.skip_tags, vec!["slow", "manual"]);
        assert_eq!(args.inventory, vec!["hosts.ini"]);
    }
}

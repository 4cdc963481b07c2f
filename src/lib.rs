//! # Runbook - A Lightweight Configuration Management Agent
//!
//! Runbook applies declarative YAML playbooks to the local machine or to
//! remote hosts. Playbooks are parsed with field order preserved, tasks are
//! resolved to typed modules through a schema engine, and remote execution
//! ships an embedded agent binary over SSH or WinRM instead of requiring
//! anything preinstalled on the target.
//!
//! ## Core Concepts
//!
//! - **Playbooks**: YAML documents of plays, each with pre_tasks, roles,
//!   tasks and post_tasks sections
//! - **Tasks**: one module invocation plus control fields (`when`,
//!   `register`, `with_items`, `block`, ...)
//! - **Modules**: units of work registered by name, parameterized through
//!   declarative field schemas
//! - **Facts**: system information gathered before a play runs
//! - **Transports**: SSH and WinRM plumbing that probes the target platform,
//!   copies the matching embedded agent binary over and feeds it the task
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use runbook::inventory::Host;
//! use runbook::registry::Registry;
//! use runbook::vars::VarMap;
//!
//! let registry = Registry::with_builtins();
//! let mut plays = runbook::playbook::parse(yaml_text, &registry)?;
//! for play in &mut plays {
//!     play.run(&Host::local(), &VarMap::new())?;
//! }
//! ```

#![warn(clippy::all)]

pub mod cli;
pub mod config;
pub mod embedbin;
pub mod error;
pub mod exec;
pub mod inventory;
pub mod modules;
pub mod omap;
pub mod playbook;
pub mod registry;
pub mod schema;
pub mod task;
pub mod template;
pub mod transport;
pub mod value;
pub mod vars;

pub use error::{Error, Result};

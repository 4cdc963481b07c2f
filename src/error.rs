//! Error types for Runbook.
//!
//! Errors fall into four families: schema errors (playbook authoring
//! mistakes, reported with enough context to fix the YAML), module lookup
//! and instantiation errors, runtime/transport errors, and internal
//! invariant violations. The last family panics instead of returning; a
//! desynced ordered map is a bug here, not in the playbook.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::SchemaError;
use crate::transport::TransportError;

/// Result type alias for Runbook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Runbook.
#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------
    // Schema / parse errors (user-facing, fixable in the playbook)
    // ------------------------------------------------------------------
    /// The parameter data of a module did not match its schema.
    #[error("Invalid data for module '{module}': {source}")]
    ModuleData {
        /// Module name
        module: String,
        /// Underlying schema violation
        #[source]
        source: SchemaError,
    },

    /// No key of the task mapping resolved to a known module.
    #[error("Task module for task '{task}' is not implemented:\n{yaml}")]
    ModuleNotImplemented {
        /// Task name (may be empty for anonymous tasks)
        task: String,
        /// Dump of the offending task YAML for diagnosis
        yaml: String,
    },

    /// Keys were left in the task mapping after module consumption.
    #[error("Found {count} unknown fields in task '{task}' - maybe not implemented?\n{yaml}")]
    UnknownTaskFields {
        /// Task name
        task: String,
        /// Number of residual keys
        count: usize,
        /// Dump of the residual fields
        yaml: String,
    },

    /// A control field held a value of the wrong shape.
    #[error("Task '{task}' field '{field}' has an unexpected type: {message}")]
    TaskField {
        /// Task name
        task: String,
        /// Control field name
        field: String,
        /// What was wrong
        message: String,
    },

    /// The playbook document structure was not what was expected.
    #[error("Invalid playbook structure: {0}")]
    PlaybookStructure(String),

    // ------------------------------------------------------------------
    // Module registry errors
    // ------------------------------------------------------------------
    /// The registry has no module under this name.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    /// A module failed while executing.
    #[error("Module '{module}' execution failed: {message}")]
    ModuleExecution {
        /// Module name
        module: String,
        /// Error message
        message: String,
    },

    // ------------------------------------------------------------------
    // Runtime / transport errors
    // ------------------------------------------------------------------
    /// Transport-level failure (connect, execute, copy, probe).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A remote routing decision could not be completed.
    #[error("Remote execution failed for task '{task}': {message}")]
    RemoteExecution {
        /// Task name
        task: String,
        /// Error message
        message: String,
    },

    /// No embedded agent binary matched the probed platform.
    #[error("No embedded agent binary for {kernel}-{arch}: {message}")]
    AgentBinary {
        /// Probed kernel
        kernel: String,
        /// Probed architecture
        arch: String,
        /// Error message
        message: String,
    },

    // ------------------------------------------------------------------
    // Inventory / config errors
    // ------------------------------------------------------------------
    /// Error loading inventory.
    #[error("Failed to load inventory from '{path}': {message}")]
    InventoryLoad {
        /// Path to the inventory source
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ------------------------------------------------------------------
    // Serialization and collaborator errors
    // ------------------------------------------------------------------
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Template error from the rendering collaborator.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a module data error, attaching the module name to a schema
    /// violation.
    pub fn module_data(module: impl Into<String>, source: SchemaError) -> Self {
        Self::ModuleData {
            module: module.into(),
            source,
        }
    }

    /// Creates a module execution error.
    pub fn module_execution(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleExecution {
            module: module.into(),
            message: message.into(),
        }
    }

    /// True for errors a playbook author can fix by editing YAML.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Error::ModuleData { .. }
                | Error::ModuleNotImplemented { .. }
                | Error::UnknownTaskFields { .. }
                | Error::TaskField { .. }
                | Error::PlaybookStructure(_)
                | Error::YamlParse(_)
        )
    }

    /// Exit status for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_schema_error() => 4,
            Error::ModuleNotFound(_) | Error::ModuleExecution { .. } => 2,
            Error::Transport(_) | Error::RemoteExecution { .. } => 3,
            Error::InventoryLoad { .. } => 5,
            _ => 1,
        }
    }
}

//! Remote transports.
//!
//! Transports carry the agent binary to the target and run it there. They
//! are never used to execute task commands directly; the deployed agent
//! does that on the target side.

use std::io::Read;

use thiserror::Error;

use crate::vars::{self, VarMap};

pub mod ssh;
pub mod winrm;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default WinRM HTTPS port.
pub const DEFAULT_WINRM_PORT: u16 = 5986;

/// Failures in the remote plumbing.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Authentication failed for user '{user}': {message}")]
    AuthenticationFailed { user: String, message: String },

    #[error("Failed to run remote command '{cmd}': {message}")]
    ExecutionFailed { cmd: String, message: String },

    #[error("Unable to identify the remote system: {0}")]
    IdentificationFailed(String),

    #[error("Failed to copy to '{dest}': {message}")]
    CopyFailed { dest: String, message: String },

    #[error("Unsupported connection type '{0}'")]
    UnsupportedConnection(String),

    #[error("Connection variable '{0}' is missing")]
    MissingVariable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Output of one remote command.
#[derive(Debug, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A connection to a remote target.
pub trait Transport {
    /// Runs a command and captures its output.
    fn execute(&mut self, cmd: &str) -> Result<Output>;

    /// Runs a command with the given bytes on its stdin.
    fn execute_input(&mut self, cmd: &str, stdin: &[u8]) -> Result<Output>;

    /// Identifies the remote system as a (kernel, arch) pair, normalized
    /// to the naming the embedded binary collection uses.
    fn check(&mut self) -> Result<(String, String)>;

    /// Copies a stream to the remote path with the given mode.
    fn copy(&mut self, content: &mut dyn Read, dest: &str, mode: u32) -> Result<()>;
}

/// Canonical architecture naming shared by both transports.
pub(crate) fn normalize_arch(arch: &str) -> String {
    match arch.trim() {
        "x86_64" | "x64" | "amd64" => "amd64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        other => other.to_lowercase(),
    }
}

/// Connection parameters extracted from host variables.
#[derive(Debug)]
pub struct ConnectParams {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub key_file: Option<String>,
}

impl ConnectParams {
    /// Reads the connection parameters a transport needs from host vars.
    /// `password_required` reflects WinRM, where key auth does not exist.
    pub fn from_vars(vars: &VarMap, default_port: u16, password_required: bool) -> Result<Self> {
        let user = vars::get_str(vars, "ansible_user")
            .ok_or_else(|| TransportError::MissingVariable("ansible_user".to_string()))?
            .to_string();
        let host = vars::get_str(vars, "ansible_host")
            .ok_or_else(|| TransportError::MissingVariable("ansible_host".to_string()))?
            .to_string();
        let port = vars::get_int(vars, "ansible_port").unwrap_or(default_port as i64) as u16;
        let password = vars::get_str(vars, "ansible_password").map(str::to_string);
        let key_file = vars::get_str(vars, "ansible_ssh_private_key_file").map(str::to_string);

        if password.is_none() && (password_required || key_file.is_none()) {
            return Err(TransportError::MissingVariable(
                "ansible_password".to_string(),
            ));
        }
        Ok(ConnectParams {
            user,
            host,
            port,
            password,
            key_file,
        })
    }
}

/// Opens a transport for the connection type named in host vars.
pub fn connect(connection: &str, vars: &VarMap) -> Result<Box<dyn Transport>> {
    match connection {
        "ssh" => {
            let params = ConnectParams::from_vars(vars, DEFAULT_SSH_PORT, false)?;
            Ok(Box::new(ssh::SshTransport::connect(params)?))
        }
        "winrm" => {
            let params = ConnectParams::from_vars(vars, DEFAULT_WINRM_PORT, true)?;
            Ok(Box::new(winrm::WinRmTransport::connect(params)?))
        }
        other => Err(TransportError::UnsupportedConnection(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omap::Value;

    fn vars(entries: &[(&str, &str)]) -> VarMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn arch_names_are_normalized() {
        assert_eq!(normalize_arch("x86_64"), "amd64");
        assert_eq!(normalize_arch("x64"), "amd64");
        assert_eq!(normalize_arch("aarch64"), "arm64");
        assert_eq!(normalize_arch("riscv64"), "riscv64");
    }

    #[test]
    fn ssh_params_accept_key_file_in_place_of_password() {
        let v = vars(&[
            ("ansible_user", "admin"),
            ("ansible_host", "10.0.0.5"),
            ("ansible_ssh_private_key_file", "/home/admin/.ssh/id_ed25519"),
        ]);
        let params = ConnectParams::from_vars(&v, DEFAULT_SSH_PORT, false).unwrap();
        assert_eq!(params.port, 22);
        assert!(params.password.is_none());
        assert!(params.key_file.is_some());
    }

    #[test]
    fn winrm_params_require_a_password() {
        let v = vars(&[("ansible_user", "admin"), ("ansible_host", "10.0.0.5")]);
        let err = ConnectParams::from_vars(&v, DEFAULT_WINRM_PORT, true).unwrap_err();
        assert!(err.to_string().contains("ansible_password"));
    }

    #[test]
    fn unknown_connection_type_is_an_error() {
        let err = connect("telnet", &VarMap::new()).err().unwrap();
        assert!(matches!(err, TransportError::UnsupportedConnection(_)));
    }
}

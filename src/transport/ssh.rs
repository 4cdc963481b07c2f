//! SSH transport over libssh2 sessions.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use ssh2::Session;

use super::{normalize_arch, ConnectParams, Output, Result, Transport, TransportError};

pub struct SshTransport {
    session: Session,
    host: String,
}

impl SshTransport {
    /// Connects and authenticates with a password or a private key file.
    pub fn connect(params: ConnectParams) -> Result<Self> {
        let addr = format!("{}:{}", params.host, params.port);
        tracing::debug!("connecting to ssh://{}@{}", params.user, addr);
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::ConnectionFailed {
            host: params.host.clone(),
            port: params.port,
            message: e.to_string(),
        })?;

        let mut session = Session::new().map_err(|e| TransportError::ConnectionFailed {
            host: params.host.clone(),
            port: params.port,
            message: e.to_string(),
        })?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| TransportError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port,
                message: e.to_string(),
            })?;

        let auth_result = match (&params.password, &params.key_file) {
            (Some(password), _) => session.userauth_password(&params.user, password),
            (None, Some(key_file)) => {
                session.userauth_pubkey_file(&params.user, None, Path::new(key_file), None)
            }
            (None, None) => {
                return Err(TransportError::MissingVariable(
                    "ansible_password".to_string(),
                ));
            }
        };
        auth_result.map_err(|e| TransportError::AuthenticationFailed {
            user: params.user.clone(),
            message: e.to_string(),
        })?;

        Ok(SshTransport {
            session,
            host: params.host,
        })
    }

    fn run(&mut self, cmd: &str, stdin: Option<&[u8]>) -> Result<Output> {
        let mut channel =
            self.session
                .channel_session()
                .map_err(|e| TransportError::ExecutionFailed {
                    cmd: cmd.to_string(),
                    message: e.to_string(),
                })?;
        channel.exec(cmd).map_err(|e| TransportError::ExecutionFailed {
            cmd: cmd.to_string(),
            message: e.to_string(),
        })?;

        if let Some(input) = stdin {
            channel.write_all(input)?;
            channel.send_eof().map_err(|e| TransportError::ExecutionFailed {
                cmd: cmd.to_string(),
                message: e.to_string(),
            })?;
        }

        let mut output = Output::default();
        channel.read_to_string(&mut output.stdout)?;
        channel.stderr().read_to_string(&mut output.stderr)?;
        channel
            .wait_close()
            .map_err(|e| TransportError::ExecutionFailed {
                cmd: cmd.to_string(),
                message: e.to_string(),
            })?;
        output.exit_code = channel
            .exit_status()
            .map_err(|e| TransportError::ExecutionFailed {
                cmd: cmd.to_string(),
                message: e.to_string(),
            })?;
        Ok(output)
    }
}

impl Transport for SshTransport {
    fn execute(&mut self, cmd: &str) -> Result<Output> {
        tracing::debug!(host = %self.host, "ssh execute: {}", cmd);
        self.run(cmd, None)
    }

    fn execute_input(&mut self, cmd: &str, stdin: &[u8]) -> Result<Output> {
        tracing::debug!(host = %self.host, "ssh execute with input: {}", cmd);
        self.run(cmd, Some(stdin))
    }

    fn check(&mut self) -> Result<(String, String)> {
        let kernel_out = self.execute("uname -s")?;
        if kernel_out.exit_code != 0 {
            return Err(TransportError::IdentificationFailed(format!(
                "uname -s failed: {}",
                kernel_out.stderr.trim()
            )));
        }
        let arch_out = self.execute("uname -m")?;
        if arch_out.exit_code != 0 {
            return Err(TransportError::IdentificationFailed(format!(
                "uname -m failed: {}",
                arch_out.stderr.trim()
            )));
        }

        let kernel = kernel_out.stdout.trim().to_lowercase();
        let arch = normalize_arch(arch_out.stdout.trim());
        tracing::debug!(host = %self.host, %kernel, %arch, "identified remote system");
        Ok((kernel, arch))
    }

    fn copy(&mut self, content: &mut dyn Read, dest: &str, mode: u32) -> Result<()> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        let mut remote = self
            .session
            .scp_send(Path::new(dest), mode as i32, data.len() as u64, None)
            .map_err(|e| TransportError::CopyFailed {
                dest: dest.to_string(),
                message: e.to_string(),
            })?;
        remote.write_all(&data)?;
        remote.send_eof().map_err(|e| TransportError::CopyFailed {
            dest: dest.to_string(),
            message: e.to_string(),
        })?;
        remote.wait_eof().map_err(|e| TransportError::CopyFailed {
            dest: dest.to_string(),
            message: e.to_string(),
        })?;
        remote.wait_close().map_err(|e| TransportError::CopyFailed {
            dest: dest.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(host = %self.host, %dest, bytes = data.len(), "copied file");
        Ok(())
    }
}

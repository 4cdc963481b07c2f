//! WinRM transport: WS-Management SOAP over HTTPS with basic auth.
//!
//! Envelopes are built as plain strings and responses are scanned for the
//! few tags of interest; the protocol subset used here (create shell, run
//! command, receive streams, signal, delete shell) does not warrant a full
//! XML stack.

use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use uuid::Uuid;

use super::{normalize_arch, ConnectParams, Output, Result, Transport, TransportError};

const SHELL_RESOURCE_URI: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";
const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
const ACTION_SIGNAL: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";
const SIGNAL_TERMINATE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";

/// Base64 payload bytes per upload command, kept under the cmd.exe line limit.
const COPY_CHUNK: usize = 4000;

pub struct WinRmTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    user: String,
    password: String,
}

impl WinRmTransport {
    pub fn connect(params: ConnectParams) -> Result<Self> {
        let password = params.password.clone().ok_or_else(|| {
            TransportError::MissingVariable("ansible_password".to_string())
        })?;
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port,
                message: e.to_string(),
            })?;
        let mut transport = WinRmTransport {
            client,
            endpoint: format!("https://{}:{}/wsman", params.host, params.port),
            user: params.user,
            password,
        };

        // Probe the endpoint so connection problems surface here, not at
        // first task execution.
        transport.check()?;
        Ok(transport)
    }

    fn post(&self, action: &str, shell_id: Option<&str>, body: &str) -> Result<String> {
        let message_id = Uuid::new_v4();
        let selector = match shell_id {
            Some(id) => format!(
                r#"<w:SelectorSet><w:Selector Name="ShellId">{id}</w:Selector></w:SelectorSet>"#
            ),
            None => String::new(),
        };
        let envelope = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:w="http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd" xmlns:rsp="http://schemas.microsoft.com/wbem/wsman/1/windows/shell">
  <s:Header>
    <a:To>{endpoint}</a:To>
    <a:ReplyTo><a:Address mustUnderstand="true">http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>
    <w:MaxEnvelopeSize mustUnderstand="true">153600</w:MaxEnvelopeSize>
    <a:MessageID>uuid:{message_id}</a:MessageID>
    <w:ResourceURI mustUnderstand="true">{resource}</w:ResourceURI>
    <a:Action mustUnderstand="true">{action}</a:Action>
    <w:OperationTimeout>PT60S</w:OperationTimeout>
    {selector}
  </s:Header>
  <s:Body>{body}</s:Body>
</s:Envelope>"#,
            endpoint = self.endpoint,
            resource = SHELL_RESOURCE_URI,
        );

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .body(envelope)
            .send()
            .map_err(|e| TransportError::ExecutionFailed {
                cmd: action.to_string(),
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthenticationFailed {
                user: self.user.clone(),
                message: "basic auth rejected".to_string(),
            });
        }
        let status = response.status();
        let text = response.text().map_err(|e| TransportError::ExecutionFailed {
            cmd: action.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(TransportError::ExecutionFailed {
                cmd: action.to_string(),
                message: format!("HTTP {}: {}", status, fault_reason(&text)),
            });
        }
        Ok(text)
    }

    fn create_shell(&self) -> Result<String> {
        let body = r#"<rsp:Shell><rsp:InputStreams>stdin</rsp:InputStreams><rsp:OutputStreams>stdout stderr</rsp:OutputStreams></rsp:Shell>"#;
        let response = self.post(ACTION_CREATE, None, body)?;
        tag_value(&response, "ShellId").ok_or_else(|| TransportError::ExecutionFailed {
            cmd: "create shell".to_string(),
            message: "no ShellId in response".to_string(),
        })
    }

    fn delete_shell(&self, shell_id: &str) {
        if let Err(err) = self.post(ACTION_DELETE, Some(shell_id), "") {
            tracing::debug!("failed to delete remote shell {}: {}", shell_id, err);
        }
    }

    fn run_in_shell(&self, shell_id: &str, cmd: &str) -> Result<Output> {
        let body = format!(
            "<rsp:CommandLine><rsp:Command>{}</rsp:Command></rsp:CommandLine>",
            xml_escape(cmd)
        );
        let response = self.post(ACTION_COMMAND, Some(shell_id), &body)?;
        let command_id =
            tag_value(&response, "CommandId").ok_or_else(|| TransportError::ExecutionFailed {
                cmd: cmd.to_string(),
                message: "no CommandId in response".to_string(),
            })?;

        let mut output = Output::default();
        loop {
            let body = format!(
                r#"<rsp:Receive><rsp:DesiredStream CommandId="{command_id}">stdout stderr</rsp:DesiredStream></rsp:Receive>"#
            );
            let response = self.post(ACTION_RECEIVE, Some(shell_id), &body)?;
            collect_streams(&response, &command_id, &mut output)?;
            if response.contains("CommandState/Done") {
                if let Some(code) = tag_value(&response, "ExitCode") {
                    output.exit_code = code.trim().parse().unwrap_or(-1);
                }
                break;
            }
        }

        let body = format!(
            r#"<rsp:Signal CommandId="{command_id}"><rsp:Code>{SIGNAL_TERMINATE}</rsp:Code></rsp:Signal>"#
        );
        self.post(ACTION_SIGNAL, Some(shell_id), &body)?;
        Ok(output)
    }
}

impl Transport for WinRmTransport {
    fn execute(&mut self, cmd: &str) -> Result<Output> {
        tracing::debug!(endpoint = %self.endpoint, "winrm execute: {}", cmd);
        let shell_id = self.create_shell()?;
        let result = self.run_in_shell(&shell_id, cmd);
        self.delete_shell(&shell_id);
        result
    }

    fn execute_input(&mut self, cmd: &str, stdin: &[u8]) -> Result<Output> {
        // Stdin travels as a base64 temp file decoded on the target before
        // the command runs; the Send message is not implemented.
        let token = Uuid::new_v4().simple().to_string();
        let b64_path = format!("C:\\Windows\\Temp\\rb-in-{}.b64", token);
        let raw_path = format!("C:\\Windows\\Temp\\rb-in-{}.bin", token);
        self.upload_base64(stdin, &b64_path)?;
        let decode = format!(
            "powershell -NonInteractive -Command \"[IO.File]::WriteAllBytes('{raw}',[Convert]::FromBase64String((Get-Content '{b64}') -join ''))\"",
            raw = raw_path,
            b64 = b64_path,
        );
        let decoded = self.execute(&decode)?;
        if decoded.exit_code != 0 {
            return Err(TransportError::ExecutionFailed {
                cmd: cmd.to_string(),
                message: format!("stdin staging failed: {}", decoded.stderr.trim()),
            });
        }
        let result = self.execute(&format!("{} < {}", cmd, raw_path));
        let _ = self.execute(&format!("del {} {}", b64_path, raw_path));
        result
    }

    fn check(&mut self) -> Result<(String, String)> {
        // WinRM targets are Windows; only the architecture needs probing.
        let output = self.execute("set processor")?;
        let mut arch = String::new();
        for line in output.stdout.lines() {
            if let Some(value) = line.trim().strip_prefix("PROCESSOR_ARCHITECTURE=") {
                arch = normalize_arch(value);
            }
        }
        if arch.is_empty() {
            return Err(TransportError::IdentificationFailed(format!(
                "no PROCESSOR_ARCHITECTURE in: {}",
                output.stdout.trim()
            )));
        }
        Ok(("windows".to_string(), arch))
    }

    fn copy(&mut self, content: &mut dyn Read, dest: &str, _mode: u32) -> Result<()> {
        let mut data = Vec::new();
        content.read_to_end(&mut data)?;

        let token = Uuid::new_v4().simple().to_string();
        let b64_path = format!("C:\\Windows\\Temp\\rb-cp-{}.b64", token);
        self.upload_base64(&data, &b64_path)?;

        let decode = format!(
            "powershell -NonInteractive -Command \"[IO.File]::WriteAllBytes('{dest}',[Convert]::FromBase64String((Get-Content '{b64}') -join '')); Remove-Item '{b64}'\"",
            dest = dest,
            b64 = b64_path,
        );
        let output = self.execute(&decode)?;
        if output.exit_code != 0 {
            return Err(TransportError::CopyFailed {
                dest: dest.to_string(),
                message: output.stderr.trim().to_string(),
            });
        }
        tracing::debug!(%dest, bytes = data.len(), "copied file");
        Ok(())
    }
}

impl WinRmTransport {
    /// Appends the content as base64 lines to a remote staging file.
    fn upload_base64(&mut self, data: &[u8], remote_path: &str) -> Result<()> {
        for chunk in data.chunks(COPY_CHUNK) {
            let encoded = BASE64.encode(chunk);
            let output = self.execute(&format!("echo {} >> {}", encoded, remote_path))?;
            if output.exit_code != 0 {
                return Err(TransportError::CopyFailed {
                    dest: remote_path.to_string(),
                    message: output.stderr.trim().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Content of the first tag with the given local name, namespace-agnostic.
fn tag_value(xml: &str, name: &str) -> Option<String> {
    let open_a = format!("<{}>", name);
    let open_b = format!(":{}>", name);
    let start = match xml.find(&open_a) {
        Some(pos) => pos + open_a.len(),
        None => {
            let pos = xml.find(&open_b)?;
            pos + open_b.len()
        }
    };
    let rest = &xml[start..];
    let end = rest.find("</")?;
    Some(rest[..end].to_string())
}

/// Decodes every matching base64 output stream chunk into the output.
fn collect_streams(xml: &str, command_id: &str, output: &mut Output) -> Result<()> {
    let mut cursor = xml;
    while let Some(pos) = cursor.find("<rsp:Stream ") {
        let rest = &cursor[pos..];
        let tag_end = match rest.find('>') {
            Some(e) => e,
            None => break,
        };
        let attrs = &rest[..tag_end];
        let body_and_rest = &rest[tag_end + 1..];
        let close = match body_and_rest.find("</rsp:Stream>") {
            Some(c) => c,
            None => {
                // Self-closing end-of-stream marker
                cursor = body_and_rest;
                continue;
            }
        };
        let body = &body_and_rest[..close];
        if attrs.contains(command_id) && !body.is_empty() {
            let decoded =
                BASE64
                    .decode(body.trim())
                    .map_err(|e| TransportError::ExecutionFailed {
                        cmd: "receive".to_string(),
                        message: format!("bad stream encoding: {}", e),
                    })?;
            let text = String::from_utf8_lossy(&decoded).replace("\r\n", "\n");
            if attrs.contains(r#"Name="stderr""#) {
                output.stderr.push_str(&text);
            } else {
                output.stdout.push_str(&text);
            }
        }
        cursor = &body_and_rest[close..];
    }
    Ok(())
}

/// Reason text of a SOAP fault, or a truncated body when none is found.
fn fault_reason(xml: &str) -> String {
    tag_value(xml, "Text").unwrap_or_else(|| xml.chars().take(200).collect())
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tag_value_ignores_namespace_prefix() {
        let xml = "<x:Shell><x:ShellId>ABC-123</x:ShellId></x:Shell>";
        assert_eq!(tag_value(xml, "ShellId"), Some("ABC-123".to_string()));
    }

    #[test]
    fn stream_chunks_decode_into_the_right_sinks() {
        let xml = format!(
            r#"<rsp:Receive><rsp:Stream Name="stdout" CommandId="CID">{}</rsp:Stream><rsp:Stream Name="stderr" CommandId="CID">{}</rsp:Stream></rsp:Receive>"#,
            BASE64.encode("hello\r\n"),
            BASE64.encode("oops"),
        );
        let mut output = Output::default();
        collect_streams(&xml, "CID", &mut output).unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops");
    }

    #[test]
    fn command_is_escaped_for_xml() {
        assert_eq!(xml_escape("a < b && c"), "a &lt; b &amp;&amp; c");
    }
}

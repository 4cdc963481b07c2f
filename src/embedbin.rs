//! Embedded agent binary lookup.
//!
//! Pre-built agent executables for other platforms are appended to the
//! running binary, each introduced by a token header:
//!
//! `\n--- EMBEDDED_BINARY <kernel>-<arch> <pack> ---\n`
//!
//! where pack is one of raw, upx, gz or xz. When the requested platform is
//! the one currently running, the current executable itself (up to the
//! first token) is the answer.

use std::io::Read;

use crate::error::{Error, Result};

// Token split in two parts so this file does not contain it verbatim.
const TOKEN_PT1: &str = "\n--- ";
const TOKEN_PT2: &str = "EMBEDDED_BINARY ";
const TOKEN_END: &str = " ---\n";
const HEADER_MAX_LENGTH: usize = 128;

/// Kernel and architecture of the running process, in the naming the
/// embedded sections use.
pub fn current_platform() -> (String, String) {
    let kernel = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    (kernel.to_string(), arch.to_string())
}

/// Returns the agent binary for the given target platform.
pub fn get_embedded_binary(kernel: &str, arch: &str) -> Result<Vec<u8>> {
    let exe_path = std::env::current_exe()?;
    let data = std::fs::read(&exe_path)?;
    extract(&data, kernel, arch).map_err(|message| Error::AgentBinary {
        kernel: kernel.to_string(),
        arch: arch.to_string(),
        message,
    })
}

fn extract(data: &[u8], kernel: &str, arch: &str) -> std::result::Result<Vec<u8>, String> {
    let token = format!("{}{}", TOKEN_PT1, TOKEN_PT2);
    let token = token.as_bytes();

    let (own_kernel, own_arch) = current_platform();
    if own_kernel == kernel && own_arch == arch {
        // The running binary itself, cut at the first embedded section.
        let end = find(data, token, 0).unwrap_or(data.len());
        return Ok(data[..end].to_vec());
    }

    let wanted = format!("{}-{}", kernel, arch);
    let mut pos = 0;
    while let Some(token_pos) = find(data, token, pos) {
        let header_start = token_pos + token.len();
        let header_window = &data[header_start..data.len().min(header_start + HEADER_MAX_LENGTH)];
        let Some(header_end) = find(header_window, TOKEN_END.as_bytes(), 0) else {
            pos = header_start;
            continue;
        };
        let header = String::from_utf8_lossy(&header_window[..header_end]);
        let mut fields = header.split(' ');
        let platform = fields.next().unwrap_or_default();
        let pack = fields.next().unwrap_or_default();

        let body_start = header_start + header_end + TOKEN_END.len();
        let body_end = find(data, token, body_start).unwrap_or(data.len());

        if platform == wanted {
            return unpack(&data[body_start..body_end], pack);
        }
        pos = body_start;
    }

    Err(format!("no embedded binary for {}", wanted))
}

fn unpack(body: &[u8], pack: &str) -> std::result::Result<Vec<u8>, String> {
    match pack {
        // upx payloads unpack themselves at execution time
        "raw" | "upx" => Ok(body.to_vec()),
        "gz" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| format!("gzip unpack failed: {}", e))?;
            Ok(out)
        }
        "xz" => {
            let mut out = Vec::new();
            xz2::read::XzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| format!("xz unpack failed: {}", e))?;
            Ok(out)
        }
        other => Err(format!("unsupported packer '{}'", other)),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

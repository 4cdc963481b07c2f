//! Process capability facts, read from `capsh --print`.

use crate::error::Result;
use crate::modules::FactModule;
use crate::omap::{OrderedMap, Value};

pub struct Caps;

impl FactModule for Caps {
    fn name(&self) -> &'static str {
        "caps"
    }

    fn collect(&self) -> Result<OrderedMap> {
        let mut enforced = "N/A".to_string();
        let mut caps: Vec<Value> = Vec::new();

        let mut data = OrderedMap::new();
        let output = match std::process::Command::new("capsh").arg("--print").output() {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!("skipping caps facts: unable to run capsh: {}", err);
                return Ok(data);
            }
        };

        // The "Current:" line lists the effective capability set.
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let Some(rest) = line.strip_prefix("Current:") else {
                continue;
            };
            if rest.trim() == "=ep" {
                enforced = "False".to_string();
            } else {
                enforced = "True".to_string();
                if let Some((_, list)) = rest.split_once('=') {
                    caps = list
                        .split(',')
                        .map(|c| Value::String(c.trim().to_string()))
                        .collect();
                }
            }
            break;
        }

        data.set("system_capabilities", Value::List(caps));
        data.set("system_capabilities_enforced", enforced);
        Ok(data)
    }
}

//! Basic system identity facts: OS, architecture, hostname.

use crate::error::Result;
use crate::modules::FactModule;
use crate::omap::OrderedMap;

pub struct System;

impl FactModule for System {
    fn name(&self) -> &'static str {
        "system"
    }

    fn collect(&self) -> Result<OrderedMap> {
        let mut data = OrderedMap::new();
        data.set("ansible_system", capitalize(std::env::consts::OS));
        data.set("ansible_architecture", std::env::consts::ARCH);
        if let Ok(name) = hostname::get() {
            data.set("ansible_hostname", name.to_string_lossy().to_string());
        }
        Ok(data)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_os_and_arch() {
        let data = System.collect().unwrap();
        assert!(!data
            .get("ansible_system")
            .unwrap()
            .as_str()
            .unwrap()
            .is_empty());
        assert!(data.contains_key("ansible_architecture"));
    }
}

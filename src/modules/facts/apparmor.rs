//! AppArmor status fact, detected through securityfs.

use crate::error::Result;
use crate::modules::FactModule;
use crate::omap::{OrderedMap, Value};

pub struct AppArmor;

impl FactModule for AppArmor {
    fn name(&self) -> &'static str {
        "apparmor"
    }

    fn collect(&self) -> Result<OrderedMap> {
        let status = if std::path::Path::new("/sys/kernel/security/apparmor").exists() {
            "enabled"
        } else {
            "disabled"
        };

        let mut apparmor = OrderedMap::new();
        apparmor.set("status", status);
        let mut data = OrderedMap::new();
        data.set("apparmor", Value::Map(apparmor));
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_enabled_or_disabled() {
        let data = AppArmor.collect().unwrap();
        let status = data
            .get("apparmor")
            .and_then(|v| v.as_map())
            .and_then(|m| m.get("status"))
            .and_then(|v| v.as_str())
            .unwrap();
        assert!(status == "enabled" || status == "disabled");
    }
}

//! Fact collectors for the local host.

use crate::modules::FactModule;
use crate::omap::OrderedMap;

pub mod apparmor;
pub mod caps;
pub mod system;

/// All built-in fact collectors, in collection order.
pub fn builtin() -> Vec<Box<dyn FactModule>> {
    vec![
        Box::new(system::System),
        Box::new(caps::Caps),
        Box::new(apparmor::AppArmor),
    ]
}

/// Runs every built-in fact collector and merges the results.
///
/// A failing collector is logged and skipped; partial facts are better
/// than none.
pub fn collect_all() -> OrderedMap {
    let mut out = OrderedMap::new();
    for module in builtin() {
        tracing::trace!("running fact collector '{}'", module.name());
        match module.collect() {
            Ok(collected) => {
                for (key, value) in collected.iter() {
                    if out.contains_key(key) {
                        tracing::warn!(
                            "fact module '{}' overrides existing fact '{}'",
                            module.name(),
                            key
                        );
                    }
                    out.set(key, value.clone());
                }
            }
            Err(err) => {
                tracing::warn!("error while collecting facts from '{}': {}", module.name(), err);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_all_always_yields_system_facts() {
        let facts = collect_all();
        assert!(facts.contains_key("ansible_system"));
        assert!(facts.contains_key("ansible_architecture"));
    }
}

//! The `apt` task module: manages Debian-family packages.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Apt {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// Package names, like foo, or specifiers with version, like foo=1.0.
    name: TValue,
    /// Run the equivalent of apt-get update before the operation.
    update_cache: TValue,
    /// Desired package state.
    state: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("name", |p, v| p.name = v, |p| p.name.clone())
                .aliases(&["package", "pkg"]),
            field::<Params>(
                "update_cache",
                |p, v| p.update_cache = v,
                |p| p.update_cache.clone(),
            ),
            field::<Params>("state", |p, v| p.state = v, |p| p.state.clone())
                .default(DefaultVal::Str("present"))
                .choices(&["absent", "build-dep", "latest", "present", "fixed"]),
        ];
        FIELDS
    }
}

impl TaskModule for Apt {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "apt")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("apt", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        modules::resolve_params(&self.params, vars)?;
        tracing::warn!("apt: execution is not implemented yet");
        Ok(OrderedMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pkg_alias_feeds_name_list() {
        let mut module = Apt::default();
        let mut data: OrderedMap = serde_yaml::from_str("apt:\n  pkg:\n    - curl").unwrap();
        module.set_data(&mut data).unwrap();
        assert_eq!(
            module.params.name.as_string_list(),
            Some(vec!["curl".to_string()])
        );
    }

    #[test]
    fn scalar_name_coerces_to_single_item_list() {
        let mut module = Apt::default();
        let mut data: OrderedMap = serde_yaml::from_str("apt:\n  name: htop").unwrap();
        module.set_data(&mut data).unwrap();
        assert_eq!(
            module.params.name.as_string_list(),
            Some(vec!["htop".to_string()])
        );
    }
}

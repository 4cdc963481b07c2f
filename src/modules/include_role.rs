//! The `include_role` task module: loads and runs another role in place.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::{self, field, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct IncludeRole {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// The name of the role to be executed.
    name: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] =
            &[field::<Params>("name", |p, v| p.name = v, |p| p.name.clone()).required()];
        FIELDS
    }
}

impl TaskModule for IncludeRole {
    fn name(&self) -> &'static str {
        "include_role"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "include_role")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("include_role", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        modules::resolve_params(&self.params, vars)?;
        tracing::warn!(
            "include_role: role body resolution is not implemented yet, skipping '{}'",
            self.params.name
        );
        Ok(OrderedMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_is_required() {
        let mut module = IncludeRole::default();
        let mut data: OrderedMap = serde_yaml::from_str("include_role: {}").unwrap();
        assert!(module.set_data(&mut data).is_err());
    }
}

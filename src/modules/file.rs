//! The `file` task module: manages file and directory attributes.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct File {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// Path of the file to link to.
    src: TValue,
    /// Path to the file being managed.
    path: TValue,
    /// State of the file in the end.
    state: TValue,
    /// Name of the user that should own the file, as would be fed to chown.
    owner: TValue,
    /// Name of the group that should own the file, as would be fed to chown.
    group: TValue,
    /// The permissions the resulting file or directory should have.
    mode: TValue,
    /// Recursively set the specified attributes on directory contents.
    recurse: TValue,
    /// Follow filesystem links if they exist.
    follow: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("src", |p, v| p.src = v, |p| p.src.clone()),
            field::<Params>("path", |p, v| p.path = v, |p| p.path.clone())
                .required()
                .aliases(&["dest", "name"]),
            field::<Params>("state", |p, v| p.state = v, |p| p.state.clone())
                .default(DefaultVal::Str("file"))
                .choices(&["absent", "directory", "file", "hard", "link", "touch"]),
            field::<Params>("owner", |p, v| p.owner = v, |p| p.owner.clone()),
            field::<Params>("group", |p, v| p.group = v, |p| p.group.clone()),
            field::<Params>("mode", |p, v| p.mode = v, |p| p.mode.clone()),
            field::<Params>("recurse", |p, v| p.recurse = v, |p| p.recurse.clone()),
            field::<Params>("follow", |p, v| p.follow = v, |p| p.follow.clone())
                .default(DefaultVal::Bool(true)),
        ];
        FIELDS
    }
}

impl TaskModule for File {
    fn name(&self) -> &'static str {
        "file"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "file")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("file", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        modules::resolve_params(&self.params, vars)?;
        tracing::warn!("file: execution is not implemented yet");
        Ok(OrderedMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dest_alias_feeds_path() {
        let mut module = File::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("file:\n  dest: /tmp/dir\n  state: directory").unwrap();
        module.set_data(&mut data).unwrap();
        assert_eq!(module.params.path.as_str(), Some("/tmp/dir"));
    }

    #[test]
    fn state_outside_list_is_rejected() {
        let mut module = File::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("file:\n  path: /tmp/x\n  state: melted").unwrap();
        let err = module.set_data(&mut data).unwrap_err();
        assert!(err.to_string().contains("melted"), "{}", err);
    }
}

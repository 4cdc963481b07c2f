//! The `copy` task module: places a file on the managed host.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::{self, field, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Copy {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// Local path to a file to copy to the remote server.
    src: TValue,
    /// Influence whether src needs to be transferred or already is present remotely.
    remote_src: TValue,
    /// Remote absolute path where the file should be copied to.
    dest: TValue,
    /// When used instead of src, sets the contents of a file directly to the specified value.
    content: TValue,
    /// Name of the user that should own the file, as would be fed to chown.
    owner: TValue,
    /// Name of the group that should own the file, as would be fed to chown.
    group: TValue,
    /// The permissions of the destination file or directory.
    mode: TValue,
    /// When doing a recursive copy set the mode for the directories.
    directory_mode: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("src", |p, v| p.src = v, |p| p.src.clone()),
            field::<Params>(
                "remote_src",
                |p, v| p.remote_src = v,
                |p| p.remote_src.clone(),
            ),
            field::<Params>("dest", |p, v| p.dest = v, |p| p.dest.clone()).required(),
            field::<Params>("content", |p, v| p.content = v, |p| p.content.clone()),
            field::<Params>("owner", |p, v| p.owner = v, |p| p.owner.clone()),
            field::<Params>("group", |p, v| p.group = v, |p| p.group.clone()),
            field::<Params>("mode", |p, v| p.mode = v, |p| p.mode.clone()),
            field::<Params>(
                "directory_mode",
                |p, v| p.directory_mode = v,
                |p| p.directory_mode.clone(),
            ),
        ];
        FIELDS
    }
}

impl TaskModule for Copy {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "copy")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("copy", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        modules::resolve_params(&self.params, vars)?;
        tracing::warn!("copy: execution is not implemented yet");
        Ok(OrderedMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dest_is_rejected() {
        let mut module = Copy::default();
        let mut data: OrderedMap = serde_yaml::from_str("copy: {}").unwrap();
        let err = module.set_data(&mut data).unwrap_err();
        assert!(err.to_string().contains("dest"), "{}", err);
    }

    #[test]
    fn parameters_roundtrip() {
        let mut module = Copy::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("copy:\n  src: ./motd\n  dest: /etc/motd\n  mode: '0644'")
                .unwrap();
        module.set_data(&mut data).unwrap();
        let out = module.get_data();
        let fmap = out.get("copy").unwrap().as_map().unwrap();
        assert_eq!(fmap.keys(), vec!["src", "dest", "mode"]);
    }
}

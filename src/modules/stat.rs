//! The `stat` task module: retrieves file status.

use crate::error::Result;
use crate::modules::{self, TaskModule};
use crate::omap::OrderedMap;
use crate::schema::{self, field, DefaultVal, FieldDef, ParamSchema, SchemaError};
use crate::value::TValue;
use crate::vars::VarMap;

#[derive(Default)]
pub struct Stat {
    params: Params,
}

#[derive(Default, Clone)]
struct Params {
    /// Path to the file being inspected.
    path: TValue,
    /// Algorithm to determine the checksum of the file.
    checksum_algorithm: TValue,
}

impl ParamSchema for Params {
    fn fields() -> &'static [FieldDef<Self>] {
        static FIELDS: &[FieldDef<Params>] = &[
            field::<Params>("path", |p, v| p.path = v, |p| p.path.clone())
                .required()
                .aliases(&["dest", "name"]),
            field::<Params>(
                "checksum_algorithm",
                |p, v| p.checksum_algorithm = v,
                |p| p.checksum_algorithm.clone(),
            )
            .aliases(&["checksum", "checksum_algo"])
            .default(DefaultVal::Str("sha1"))
            .choices(&["md5", "sha1", "sha224", "sha256", "sha384", "sha512"]),
        ];
        FIELDS
    }
}

impl TaskModule for Stat {
    fn name(&self) -> &'static str {
        "stat"
    }

    fn set_data(&mut self, data: &mut OrderedMap) -> std::result::Result<(), SchemaError> {
        let mut fmap = modules::pop_module_map(data, "stat")?;
        schema::set_data(&mut self.params, &mut fmap)
    }

    fn get_data(&self) -> OrderedMap {
        let mut data = OrderedMap::new();
        data.set("stat", schema::get_data(&self.params));
        data
    }

    fn run(&mut self, vars: &VarMap) -> Result<OrderedMap> {
        let params = modules::resolve_params(&self.params, vars)?;

        // Existence and basic attributes only; checksums are not computed yet.
        let path = params.path.as_str().unwrap_or_default().to_string();
        let mut stat = OrderedMap::new();
        match std::fs::symlink_metadata(&path) {
            Ok(meta) => {
                stat.set("exists", true);
                stat.set("isdir", meta.is_dir());
                stat.set("islnk", meta.file_type().is_symlink());
                stat.set("size", meta.len() as i64);
            }
            Err(_) => {
                stat.set("exists", false);
            }
        }
        let mut out = OrderedMap::new();
        out.set("stat", stat);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omap::Value;

    #[test]
    fn checksum_alias_and_default() {
        let mut module = Stat::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("stat:\n  path: /etc/hosts\n  checksum: sha256").unwrap();
        module.set_data(&mut data).unwrap();
        assert_eq!(module.params.checksum_algorithm.as_str(), Some("sha256"));
    }

    #[test]
    fn missing_path_reports_exists_false() {
        let mut module = Stat::default();
        let mut data: OrderedMap =
            serde_yaml::from_str("stat:\n  path: /definitely/not/here").unwrap();
        module.set_data(&mut data).unwrap();
        let out = module.run(&VarMap::new()).unwrap();
        let stat = out.get("stat").unwrap().as_map().unwrap();
        assert_eq!(stat.get("exists"), Some(&Value::Bool(false)));
    }
}

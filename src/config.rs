//! Configuration for the playbook and agent entry points.
//!
//! A YAML config file can preset anything the command line accepts; flags
//! given on the command line win over the file.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::omap::Value;
use crate::vars::VarMap;

/// Settings shared by every run mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    /// Logging verbosity level.
    pub verbosity: u8,
}

/// Settings for playbook execution.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlaybookConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// Additional variables with the highest precedence.
    pub extra_vars: VarMap,

    /// Tasks tagged with any of these are skipped.
    pub skip_tags: Vec<String>,

    /// Hosts the playbooks apply to.
    #[serde(skip)]
    pub inventory: Option<Inventory>,
}

/// Fills `obj` from a YAML config file. A missing path is not an error, a
/// present but unreadable or malformed file is.
pub fn read_config_file<T: for<'de> Deserialize<'de>>(obj: &mut T, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else { return Ok(()) };
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("unable to read {}: {e}", path.display())))?;
    *obj = serde_yaml::from_str(&data)
        .map_err(|e| Error::Config(format!("unable to parse {}: {e}", path.display())))?;
    Ok(())
}

/// Parses `-e`/`--extra-vars` arguments into a variable map.
///
/// Accepts `key=value` pairs and `@file.yml` references to YAML files whose
/// top level mapping is merged in. Later arguments override earlier ones.
pub fn parse_extra_vars(args: &[String]) -> Result<VarMap> {
    let mut out = VarMap::new();
    for keyval in args {
        if let Some(path) = keyval.strip_prefix('@') {
            debug!("Loading extra vars file: {path}");
            let data = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("unable to read {path}: {e}")))?;
            let map: VarMap = serde_yaml::from_str(&data)
                .map_err(|e| Error::Config(format!("unable to parse {path}: {e}")))?;
            for (key, val) in map {
                debug!("Provided extra var from file: {key:?}");
                out.insert(key, val);
            }
            continue;
        }
        let Some((key, val)) = keyval.split_once('=') else {
            return Err(Error::Config(format!(
                "no value provided for extra var: {keyval}"
            )));
        };
        debug!("Provided extra var: {key:?}={val:?}");
        out.insert(key.to_string(), Value::String(val.to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn extra_vars_key_value_pairs() {
        let args = vec!["env=prod".to_string(), "port=8080".to_string()];
        let out = parse_extra_vars(&args).unwrap();
        assert_eq!(vars::get_str(&out, "env"), Some("prod"));
        assert_eq!(vars::get_str(&out, "port"), Some("8080"));
    }

    #[test]
    fn extra_vars_missing_value_is_an_error() {
        let args = vec!["dangling".to_string()];
        assert!(parse_extra_vars(&args).is_err());
    }

    #[test]
    fn extra_vars_file_reference() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"region: eu-west\nreplicas: 3\n").unwrap();
        let args = vec![
            format!("@{}", file.path().display()),
            "region=us-east".to_string(),
        ];
        let out = parse_extra_vars(&args).unwrap();
        // later key=value overrides the file
        assert_eq!(vars::get_str(&out, "region"), Some("us-east"));
        assert_eq!(vars::get_int(&out, "replicas"), Some(3));
    }

    #[test]
    fn config_file_sets_verbosity_and_skip_tags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"verbosity: 2\nskip_tags: [slow, manual]\n")
            .unwrap();
        let mut cfg = PlaybookConfig::default();
        read_config_file(&mut cfg, Some(file.path())).unwrap();
        assert_eq!(cfg.common.verbosity, 2);
        assert_eq!(cfg.skip_tags, vec!["slow", "manual"]);
    }

    #[test]
    fn common_config_reads_verbosity_from_full_file() {
        // Logging setup reads only the shared settings, other keys are
        // ignored rather than rejected.
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"verbosity: 3\nskip_tags: [slow]\n").unwrap();
        let mut common = CommonConfig::default();
        read_config_file(&mut common, Some(file.path())).unwrap();
        assert_eq!(common.verbosity, 3);
    }
}

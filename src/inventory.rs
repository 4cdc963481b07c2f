//! Inventory: the hosts a playbook applies to and their variables.
//!
//! Accepts either a path to an INI inventory file or a comma separated host
//! list. INI sections follow the usual conventions: `[group]` lists hosts,
//! `[group:vars]` sets variables for every host of a group, and
//! `[group:children]` nests groups.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::omap::Value;
use crate::vars::VarMap;

/// One target host with its effective variables.
#[derive(Debug, Clone, Default)]
pub struct Host {
    pub name: String,
    pub vars: VarMap,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Host {
            name: name.into(),
            vars: VarMap::new(),
        }
    }

    /// The implicit local host.
    pub fn local() -> Self {
        let mut host = Host::new("localhost");
        host.vars.insert(
            "ansible_connection".to_string(),
            Value::String("local".to_string()),
        );
        host
    }
}

#[derive(Debug, Default)]
pub struct Inventory {
    pub hosts: Vec<Host>,
    groups: HashMap<String, Vec<String>>,
}

impl Inventory {
    /// Builds an inventory from paths or comma separated host lists.
    pub fn new(inputs: &[String]) -> Result<Self> {
        let mut inventory = Inventory::default();
        for input in inputs {
            let path = Path::new(input);
            if path.is_file() {
                inventory.load_ini(path)?;
            } else {
                for name in input.split(',').filter(|s| !s.trim().is_empty()) {
                    inventory.add_host(Host::new(name.trim()));
                }
            }
        }
        Ok(inventory)
    }

    /// Host names that belong to a group, following children one level deep
    /// per iteration until the set stops growing.
    pub fn group(&self, name: &str) -> Vec<&Host> {
        let mut names: Vec<String> = Vec::new();
        let mut queue = vec![name.to_string()];
        while let Some(group) = queue.pop() {
            if let Some(members) = self.groups.get(&group) {
                for member in members {
                    if self.groups.contains_key(member) {
                        queue.push(member.clone());
                    } else if !names.contains(member) {
                        names.push(member.clone());
                    }
                }
            }
        }
        self.hosts
            .iter()
            .filter(|h| names.contains(&h.name))
            .collect()
    }

    fn add_host(&mut self, host: Host) {
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.name == host.name) {
            for (key, value) in host.vars {
                existing.vars.insert(key, value);
            }
        } else {
            self.hosts.push(host);
        }
    }

    fn load_ini(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::InventoryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        enum Section {
            Hosts(String),
            Vars(String),
            Children(String),
        }
        let mut section = Section::Hosts("ungrouped".to_string());
        let mut group_vars: HashMap<String, VarMap> = HashMap::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match header.split_once(':') {
                    None => Section::Hosts(header.to_string()),
                    Some((group, "vars")) => Section::Vars(group.to_string()),
                    Some((group, "children")) => Section::Children(group.to_string()),
                    Some((_, kind)) => {
                        return Err(Error::InventoryLoad {
                            path: path.to_path_buf(),
                            message: format!(
                                "line {}: unknown section kind '{}'",
                                lineno + 1,
                                kind
                            ),
                        });
                    }
                };
                continue;
            }

            match section {
                Section::Hosts(ref group) => {
                    let mut parts = line.split_whitespace();
                    // First token is the host name, the rest are key=value
                    let name = parts.next().unwrap_or_default();
                    let mut host = Host::new(name);
                    for pair in parts {
                        let (key, value) = pair.split_once('=').ok_or_else(|| {
                            Error::InventoryLoad {
                                path: path.to_path_buf(),
                                message: format!(
                                    "line {}: expected key=value, got '{}'",
                                    lineno + 1,
                                    pair
                                ),
                            }
                        })?;
                        host.vars
                            .insert(key.to_string(), Value::String(value.to_string()));
                    }
                    self.groups
                        .entry(group.clone())
                        .or_default()
                        .push(name.to_string());
                    self.add_host(host);
                }
                Section::Vars(ref group) => {
                    let (key, value) = line.split_once('=').ok_or_else(|| {
                        Error::InventoryLoad {
                            path: path.to_path_buf(),
                            message: format!("line {}: expected key=value", lineno + 1),
                        }
                    })?;
                    group_vars
                        .entry(group.clone())
                        .or_default()
                        .insert(
                            key.trim().to_string(),
                            Value::String(value.trim().to_string()),
                        );
                }
                Section::Children(ref group) => {
                    self.groups
                        .entry(group.clone())
                        .or_default()
                        .push(line.to_string());
                }
            }
        }

        // Group vars apply to every member, with host lines winning.
        for (group, vars) in group_vars {
            let members: Vec<String> = self
                .group(&group)
                .iter()
                .map(|h| h.name.clone())
                .collect();
            for host in self.hosts.iter_mut().filter(|h| members.contains(&h.name)) {
                for (key, value) in &vars {
                    if !host.vars.contains_key(key) {
                        host.vars.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const INI: &str = "\
web1 ansible_host=10.0.0.1 ansible_user=deploy

[web]
web1
web2 ansible_host=10.0.0.2

[db]
db1 ansible_host=10.0.1.1

[site:children]
web
db

[web:vars]
ansible_port=2222
ansible_user=www
";

    fn write_ini() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(INI.as_bytes()).unwrap();
        file
    }

    #[test]
    fn host_list_input_without_file() {
        let inv = Inventory::new(&["alpha,beta".to_string()]).unwrap();
        let names: Vec<_> = inv.hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn ini_hosts_carry_inline_vars() {
        let file = write_ini();
        let inv = Inventory::new(&[file.path().display().to_string()]).unwrap();
        let web2 = inv.hosts.iter().find(|h| h.name == "web2").unwrap();
        assert_eq!(vars::get_str(&web2.vars, "ansible_host"), Some("10.0.0.2"));
    }

    #[test]
    fn group_vars_lose_to_host_vars() {
        let file = write_ini();
        let inv = Inventory::new(&[file.path().display().to_string()]).unwrap();
        let web1 = inv.hosts.iter().find(|h| h.name == "web1").unwrap();
        // host line said deploy, group vars say www
        assert_eq!(vars::get_str(&web1.vars, "ansible_user"), Some("deploy"));
        assert_eq!(vars::get_int(&web1.vars, "ansible_port"), Some(2222));
    }

    #[test]
    fn children_groups_resolve_transitively() {
        let file = write_ini();
        let inv = Inventory::new(&[file.path().display().to_string()]).unwrap();
        let mut names: Vec<_> = inv.group("site").iter().map(|h| h.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["db1", "web1", "web2"]);
    }
}

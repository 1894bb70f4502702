use crate::config::BundleConfig;
use crate::emit::EmittedModule;
use crate::error::ConfigError;
use crate::error::Result;
use crate::stmt::print_statements;
use crate::stmt::Statement;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;

/// Printed declaration source for one output group. Writing it anywhere is
/// left to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutput {
  pub path: PathBuf,
  pub code: String,
  /// Packages referenced with `/// <reference types="..." />`, sorted.
  pub type_reference_paths: Vec<String>,
}

struct Group {
  path: PathBuf,
  statements: Vec<Statement>,
  type_references: BTreeSet<String>,
}

/// Partitions modules into output groups and prints each group once. Groups
/// are ordered by their first module; modules keep entry order within a group.
pub fn group_modules(config: &BundleConfig, modules: Vec<EmittedModule>) -> Result<Vec<BundleOutput>> {
  let mut groups: Vec<Group> = Vec::new();
  for module in modules {
    let path = config
      .output_path_for(&module.name)
      .ok_or_else(|| ConfigError::NoOutputGroup {
        entry: module.name.clone(),
      })?;
    debug!(module = %module.name, path = %path.display(), "assigned output group");
    let idx = match groups.iter().position(|group| group.path == path) {
      Some(idx) => idx,
      None => {
        groups.push(Group {
          path: path.to_path_buf(),
          statements: Vec::new(),
          type_references: BTreeSet::new(),
        });
        groups.len() - 1
      }
    };
    groups[idx].statements.extend(module.statements);
    groups[idx].type_references.extend(module.type_references);
  }

  groups
    .into_iter()
    .map(|group| -> Result<BundleOutput> {
      let mut code = String::new();
      for package in &group.type_references {
        writeln!(code, "/// <reference types=\"{package}\" />")?;
      }
      print_statements(&mut code, &group.statements)?;
      info!(path = %group.path.display(), bytes = code.len(), "emitted output group");
      Ok(BundleOutput {
        path: group.path,
        code,
        type_reference_paths: group.type_references.into_iter().collect(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GroupRule;
  use crate::error::BundleError;

  fn module(name: &str, types: &[&str]) -> EmittedModule {
    EmittedModule {
      name: name.into(),
      statements: vec![Statement::Module {
        name: name.into(),
        body: vec![],
      }],
      type_references: types.iter().map(|t| t.to_string()).collect(),
    }
  }

  #[test]
  fn groups_concatenate_in_entry_order() {
    let config = BundleConfig {
      output: Some("index.d.ts".into()),
      groups: vec![GroupRule::new("^web", "web.d.ts").unwrap()],
      ..Default::default()
    };
    let outputs = group_modules(
      &config,
      vec![
        module("web-dom", &["node"]),
        module("core", &[]),
        module("web-worker", &["node", "dom-events"]),
      ],
    )
    .unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].path, PathBuf::from("web.d.ts"));
    assert_eq!(
      outputs[0].code,
      concat!(
        "/// <reference types=\"dom-events\" />\n",
        "/// <reference types=\"node\" />\n",
        "declare module \"web-dom\" {}\n",
        "declare module \"web-worker\" {}\n",
      )
    );
    assert_eq!(outputs[0].type_reference_paths, vec!["dom-events", "node"]);
    assert_eq!(outputs[1].code, "declare module \"core\" {}\n");
  }

  #[test]
  fn ungrouped_module_without_default_output_is_fatal() {
    let config = BundleConfig {
      groups: vec![GroupRule::new("^a$", "a.d.ts").unwrap()],
      ..Default::default()
    };
    let err = group_modules(&config, vec![module("a", &[]), module("b", &[])]).unwrap_err();
    assert!(matches!(
      err,
      BundleError::Config(ConfigError::NoOutputGroup { ref entry }) if entry == "b"
    ));
  }

  #[test]
  fn outputs_serialize_with_camel_case_keys() {
    let output = BundleOutput {
      path: "a.d.ts".into(),
      code: String::new(),
      type_reference_paths: vec!["node".into()],
    };
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["typeReferencePaths"][0], "node");
    assert_eq!(json["path"], "a.d.ts");
  }
}

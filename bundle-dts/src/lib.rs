//! Bundles TypeScript declaration modules.
//!
//! Given the symbol graph of a project and a set of entry modules, produces a
//! small number of self-contained declaration files. The public export surface
//! of every entry becomes a tree of namespaces; every non-exported declaration
//! that a bundled declaration refers to is hoisted into a private `__NE`
//! namespace under a generated, collision-free name.
//!
//! ```
//! use bundle_dts::program::{DeclKind, Fragment, ProgramBuilder};
//! use bundle_dts::{bundle, BundleConfig};
//!
//! let mut builder = ProgramBuilder::new();
//! let index = builder.file("src/index.ts");
//! let bar = builder.declare(index, DeclKind::Interface, "Bar", vec![Fragment::text(" {}")]);
//! let foo = builder.declare(
//!   index,
//!   DeclKind::Interface,
//!   "Foo",
//!   vec![Fragment::text(" { bar: "), Fragment::reference(bar), Fragment::text("; }")],
//! );
//! builder.export(index, "Foo", foo);
//! let program = builder.build();
//!
//! let config = BundleConfig::from_json(
//!   r#"{ "input": ["src/index.ts"], "entries": { "lib": "./src/index.ts" }, "output": "index.d.ts" }"#,
//! )
//! .unwrap();
//! let outputs = bundle(&program, &config).unwrap();
//! assert!(outputs[0].code.contains("export interface Foo { bar: __NE._src_index_Bar; }"));
//! ```

use std::collections::BTreeSet;
use tracing::debug;
use tracing::info;
use tracing::info_span;

pub mod builder;
pub mod config;
pub mod distribution;
pub mod emit;
pub mod entity;
pub mod error;
pub mod group;
pub mod naming;
pub mod placement;
pub mod program;
pub mod recast;
pub mod scope;
pub mod stmt;

pub use config::BundleConfig;
pub use config::Entry;
pub use config::GroupRule;
pub use config::RoutingRule;
pub use error::BundleError;
pub use error::ConfigError;
pub use error::Result;
pub use group::BundleOutput;
pub use naming::generate_unique_name;
pub use program::Program;
pub use program::ProgramError;

use builder::add_alias_exports;
use builder::create_entities;
use distribution::distribute_exports;
use emit::emit_modules;
use entity::EntityGraph;
use group::group_modules;
use placement::Placer;
use recast::Recaster;
use scope::collect_referencing_symbols;

/// Runs the whole pipeline. Any error aborts the run; no partial output is
/// returned.
pub fn bundle(program: &Program, config: &BundleConfig) -> Result<Vec<BundleOutput>> {
  let _span = info_span!("bundle").entered();
  let entries = config.resolve(program)?;
  if config.verbose {
    log_configuration(config, &entries);
  }

  let mut entry_scope = BTreeSet::new();
  for entry in &entries {
    let scope = collect_referencing_symbols(program, entry.symbol);
    debug!(entry = %entry.name, symbols = scope.len(), "collected entry scope");
    entry_scope.extend(scope);
  }
  if config.verbose {
    info!(symbols = entry_scope.len(), "entry scope collected");
  }

  let forest = distribute_exports(
    program,
    &entries,
    &config.priority,
    config.private_js_doc_tag.as_deref(),
  );

  let mut graph = EntityGraph::new();
  for (entry, &meta) in entries.iter().zip(forest.roots()) {
    let root = graph.create_root(&entry.name, entry.symbol)?;
    create_entities(&mut graph, &forest, meta, root)?;
  }
  for &meta in forest.roots() {
    add_alias_exports(&mut graph, &forest, meta)?;
  }

  let placer = Placer::new(program, config, &entry_scope);
  let type_references = Recaster::new(program, placer).run(&mut graph)?;
  let modules = emit_modules(&graph, &type_references)?;
  group_modules(config, modules)
}

fn log_configuration(config: &BundleConfig, entries: &[Entry]) {
  info!(
    version = env!("CARGO_PKG_VERSION"),
    root_dir = %config.root_dir().display(),
    inputs = config.input.len(),
    "bundling declarations"
  );
  for entry in entries {
    info!(entry = %entry.name, module = %entry.module, "entry");
  }
  for group in &config.groups {
    info!(test = %group.test, path = %group.path.display(), "output group");
  }
  if let Some(output) = &config.output {
    info!(path = %output.display(), "default output");
  }
  for rule in &config.non_exported_symbol_distribution {
    info!(source = %rule.source_module, target = %rule.target_module, "routing rule");
  }
  if !config.priority.is_empty() {
    info!(priority = ?config.priority, "export priority");
  }
  if let Some(tag) = &config.private_js_doc_tag {
    info!(tag = %tag, "private tag");
  }
}

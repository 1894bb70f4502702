//! Default export distribution.
//!
//! Computes, for every entry, the forest of modules it exposes: which original
//! symbols each module exports directly ("main" exports, possibly nested
//! namespaces) and which of its exports merely re-export a symbol already
//! claimed elsewhere ("alias" exports). Each original symbol is claimed by
//! exactly one main export across the whole forest; the claim goes to the
//! first export visited, with entries visited in priority order and each
//! entry's exports in pre-order. Entry modules are never claimed: exporting
//! one re-exports that entry as a whole.

use crate::config::Entry;
use crate::program::Program;
use crate::program::SymbolId;
use ahash::AHashMap;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetaId(pub u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainExport {
  pub export_name: String,
  pub original: SymbolId,
  /// Set when the export is itself a namespace.
  pub children: Option<MetaId>,
}

/// Re-export of `main_exports[export_index]` of `target` under `export_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasDescriptor {
  pub target: MetaId,
  pub export_index: usize,
  pub export_name: String,
}

/// Re-export of the whole module of `entries[entry]` under `export_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryAlias {
  pub entry: usize,
  pub export_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleMeta {
  pub main_exports: Vec<MainExport>,
  pub alias_exports: Vec<AliasDescriptor>,
  pub entry_aliases: Vec<EntryAlias>,
}

#[derive(Clone, Debug, Default)]
pub struct ExportForest {
  metas: Vec<ModuleMeta>,
  roots: Vec<MetaId>,
}

impl ExportForest {
  pub fn meta(&self, id: MetaId) -> &ModuleMeta {
    &self.metas[id.0 as usize]
  }

  /// One root module per entry, in entry declaration order.
  pub fn roots(&self) -> &[MetaId] {
    &self.roots
  }

  pub fn push(&mut self, meta: ModuleMeta) -> MetaId {
    let id = MetaId(self.metas.len() as u32);
    self.metas.push(meta);
    id
  }

  pub fn push_root(&mut self, meta: MetaId) {
    self.roots.push(meta);
  }

  fn meta_mut(&mut self, id: MetaId) -> &mut ModuleMeta {
    &mut self.metas[id.0 as usize]
  }
}

/// Entries named in `priority` come first, in that order; the rest keep their
/// declaration order.
fn priority_order(entries: &[Entry], priority: &[String]) -> Vec<usize> {
  let mut order = Vec::with_capacity(entries.len());
  let preferred = priority
    .iter()
    .filter_map(|name| entries.iter().position(|entry| &entry.name == name));
  for idx in preferred.chain(0..entries.len()) {
    if !order.contains(&idx) {
      order.push(idx);
    }
  }
  order
}

pub fn distribute_exports(
  program: &Program,
  entries: &[Entry],
  priority: &[String],
  private_tag: Option<&str>,
) -> ExportForest {
  let entry_modules: Vec<SymbolId> = entries.iter().map(|entry| entry.symbol).collect();
  let mut distributor = Distributor {
    program,
    private_tag,
    entry_modules: &entry_modules,
    forest: ExportForest::default(),
    claims: AHashMap::new(),
  };
  let mut roots = vec![None; entries.len()];
  for idx in priority_order(entries, priority) {
    roots[idx] = Some(distributor.build_meta(entries[idx].symbol));
  }
  let mut forest = distributor.forest;
  for root in roots.into_iter().flatten() {
    forest.push_root(root);
  }
  forest
}

struct Distributor<'a> {
  program: &'a Program,
  private_tag: Option<&'a str>,
  entry_modules: &'a [SymbolId],
  forest: ExportForest,
  claims: AHashMap<SymbolId, (MetaId, usize)>,
}

impl<'a> Distributor<'a> {
  fn build_meta(&mut self, module: SymbolId) -> MetaId {
    let program = self.program;
    let id = self.forest.push(ModuleMeta::default());
    for export in &program.symbol(module).exports {
      let Some(original) = program.resolve_alias(export.symbol) else {
        debug!(export = %export.name, "skipping export with cyclic import binding");
        continue;
      };
      if self
        .private_tag
        .is_some_and(|tag| program.has_tag(original, tag))
      {
        debug!(export = %export.name, "skipping export tagged private");
        continue;
      }
      if let Some(entry) = self.entry_modules.iter().position(|&m| m == original) {
        debug!(export = %export.name, entry, "re-exporting an entry module");
        self.forest.meta_mut(id).entry_aliases.push(EntryAlias {
          entry,
          export_name: export.name.clone(),
        });
        continue;
      }
      if let Some(&(target, export_index)) = self.claims.get(&original) {
        self.forest.meta_mut(id).alias_exports.push(AliasDescriptor {
          target,
          export_index,
          export_name: export.name.clone(),
        });
        continue;
      }

      let index = self.forest.meta(id).main_exports.len();
      self.claims.insert(original, (id, index));
      self.forest.meta_mut(id).main_exports.push(MainExport {
        export_name: export.name.clone(),
        original,
        children: None,
      });
      // Claimed before recursing, so a module reached again further down
      // becomes an alias instead of another copy.
      if program.is_container(original) {
        let children = self.build_meta(original);
        self.forest.meta_mut(id).main_exports[index].children = Some(children);
      }
    }
    id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::program::DeclKind;
  use crate::program::ProgramBuilder;

  fn entry(name: &str, symbol: SymbolId) -> Entry {
    Entry {
      name: name.to_string(),
      module: name.to_string(),
      symbol,
    }
  }

  #[test]
  fn shared_symbol_is_claimed_once() {
    let mut builder = ProgramBuilder::new();
    let shared = builder.file("src/shared.ts");
    let a = builder.file("src/a.ts");
    let b = builder.file("src/b.ts");
    let thing = builder.declare(shared, DeclKind::Interface, "Thing", vec![]);
    let in_a = builder.import(a, "Thing", thing);
    let in_b = builder.import(b, "Thing", thing);
    builder.export(a, "Thing", in_a);
    builder.export(b, "Renamed", in_b);
    let program = builder.build();

    let entries = [entry("a", a.symbol), entry("b", b.symbol)];
    let forest = distribute_exports(&program, &entries, &[], None);
    let root_a = forest.meta(forest.roots()[0]);
    let root_b = forest.meta(forest.roots()[1]);
    assert_eq!(root_a.main_exports[0].original, thing);
    assert!(root_a.alias_exports.is_empty());
    assert!(root_b.main_exports.is_empty());
    assert_eq!(
      root_b.alias_exports,
      vec![AliasDescriptor {
        target: forest.roots()[0],
        export_index: 0,
        export_name: "Renamed".into(),
      }]
    );
  }

  #[test]
  fn priority_decides_the_owner() {
    let mut builder = ProgramBuilder::new();
    let a = builder.file("src/a.ts");
    let b = builder.file("src/b.ts");
    let thing = builder.declare(a, DeclKind::Interface, "Thing", vec![]);
    builder.export(a, "Thing", thing);
    let imported = builder.import(b, "Thing", thing);
    builder.export(b, "Thing", imported);
    let program = builder.build();

    let entries = [entry("a", a.symbol), entry("b", b.symbol)];
    let forest = distribute_exports(&program, &entries, &["b".to_string()], None);
    // Roots stay in entry order even though `b` claimed first.
    assert_eq!(forest.meta(forest.roots()[1]).main_exports[0].original, thing);
    assert_eq!(forest.meta(forest.roots()[0]).alias_exports.len(), 1);
  }

  #[test]
  fn namespaces_nest_and_private_exports_are_skipped() {
    let mut builder = ProgramBuilder::new();
    let index = builder.file("src/index.ts");
    let util = builder.file("src/util.ts");
    let helper = builder.declare(util, DeclKind::Function, "helper", vec![]);
    let hidden = builder.declare(util, DeclKind::Function, "hidden", vec![]);
    builder.tag(hidden, "internal");
    builder.export(util, "helper", helper);
    builder.export(util, "hidden", hidden);
    // A module that re-exports itself must not recurse forever.
    builder.export(util, "self", util.symbol);
    let ns = builder.import(index, "util", util.symbol);
    builder.export(index, "util", ns);
    let program = builder.build();

    let entries = [entry("lib", index.symbol)];
    let forest = distribute_exports(&program, &entries, &[], Some("internal"));
    let root = forest.meta(forest.roots()[0]);
    let children = root.main_exports[0].children.expect("namespace export");
    let nested = forest.meta(children);
    let names: Vec<_> = nested.main_exports.iter().map(|e| e.export_name.as_str()).collect();
    assert_eq!(names, vec!["helper"]);
    assert_eq!(
      nested.alias_exports,
      vec![AliasDescriptor {
        target: forest.roots()[0],
        export_index: 0,
        export_name: "self".into(),
      }]
    );
  }

  #[test]
  fn exporting_an_entry_module_re_exports_the_entry() {
    // a.ts: export * as b from "./b"; b.ts: export interface X; export * as a from "./a"
    let mut builder = ProgramBuilder::new();
    let a = builder.file("src/a.ts");
    let b = builder.file("src/b.ts");
    let x = builder.declare(b, DeclKind::Interface, "X", vec![]);
    builder.export(b, "X", x);
    let a_in_b = builder.import(b, "a", a.symbol);
    builder.export(b, "a", a_in_b);
    let b_in_a = builder.import(a, "b", b.symbol);
    builder.export(a, "b", b_in_a);
    let program = builder.build();

    let entries = [entry("lib", a.symbol)];
    let forest = distribute_exports(&program, &entries, &[], None);
    let root = forest.meta(forest.roots()[0]);
    assert_eq!(root.main_exports.len(), 1);
    assert_eq!(root.main_exports[0].original, b.symbol);
    let nested = forest.meta(root.main_exports[0].children.expect("namespace export"));
    assert_eq!(nested.main_exports[0].original, x);
    assert_eq!(
      nested.entry_aliases,
      vec![EntryAlias {
        entry: 0,
        export_name: "a".into(),
      }]
    );
    assert!(nested.main_exports.iter().all(|e| e.original != a.symbol));
  }
}

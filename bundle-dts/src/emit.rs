//! Turns the finished entity tree into printable statements.
//!
//! Runs in two passes. The first spells out every deferred reference and alias
//! and records which NE namespaces must be exported and which root modules
//! each root imports. The second assembles each root's statement tree.

use crate::entity::EntityGraph;
use crate::entity::EntityId;
use crate::entity::NamespaceId;
use crate::entity::NE_NAMESPACE_NAME;
use crate::error::Result;
use crate::naming::import_alias_name;
use crate::recast::TypeReferences;
use crate::stmt::Piece;
use crate::stmt::Statement;
use ahash::AHashMap;
use ahash::AHashSet;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write;
use tracing::warn;

/// One root module, ready for grouping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedModule {
  /// The entry name.
  pub name: String,
  /// A single `declare module` statement.
  pub statements: Vec<Statement>,
  pub type_references: BTreeSet<String>,
}

pub fn emit_modules(graph: &EntityGraph, type_references: &TypeReferences) -> Result<Vec<EmittedModule>> {
  let mut emitter = Emitter {
    graph,
    exported_ne: AHashSet::new(),
    imports: AHashMap::new(),
    declarations: AHashMap::new(),
    aliases: AHashMap::new(),
  };
  for ns in graph.namespace_ids() {
    emitter.resolve_namespace(ns)?;
  }

  let mut modules = Vec::with_capacity(graph.roots().len());
  for root in graph.roots() {
    let mut body: Vec<Statement> = emitter
      .imports
      .get(&root.namespace)
      .into_iter()
      .flatten()
      .map(|(specifier, local)| Statement::ImportNamespace {
        local: local.clone(),
        specifier: specifier.clone(),
      })
      .collect();
    body.extend(emitter.assemble(root.namespace));
    // A module body without export declarations exports all of its members,
    // the NE namespace included.
    if let Some(ne) = graph.namespace(root.namespace).ne() {
      if !emitter.exported_ne.contains(&ne) {
        body.push(Statement::EmptyExport);
      }
    }
    modules.push(EmittedModule {
      name: root.name.clone(),
      statements: vec![Statement::Module {
        name: root.name.clone(),
        body,
      }],
      type_references: type_references
        .get(&root.namespace)
        .cloned()
        .unwrap_or_default(),
    });
  }
  Ok(modules)
}

struct Emitter<'a> {
  graph: &'a EntityGraph,
  exported_ne: AHashSet<NamespaceId>,
  /// Root module to the roots it imports as namespaces, by name, with the
  /// local each import is bound to.
  imports: AHashMap<NamespaceId, BTreeMap<String, String>>,
  declarations: AHashMap<NamespaceId, Vec<Statement>>,
  aliases: AHashMap<NamespaceId, Vec<Statement>>,
}

impl<'a> Emitter<'a> {
  fn resolve_namespace(&mut self, ns: NamespaceId) -> Result<()> {
    let graph = self.graph;
    let mut declarations = Vec::with_capacity(graph.namespace(ns).statements().len());
    for decl in graph.namespace(ns).statements() {
      let mut body = String::new();
      for piece in &decl.body {
        match piece {
          Piece::Text(text) => body.push_str(text),
          Piece::Entity(entity) => body.push_str(&self.reference(ns, *entity)),
          Piece::Root(root) => write!(body, "import(\"{}\")", graph.root_name(*root))?,
          Piece::External {
            module: Some(module),
            name,
          } => write!(body, "import(\"{module}\").{name}")?,
          Piece::External { module: None, name } => body.push_str(name),
        }
      }
      declarations.push(Statement::Declaration {
        exported: true,
        keyword: decl.keyword,
        name: decl.name.clone(),
        body,
      });
    }
    self.declarations.insert(ns, declarations);

    let mut aliases = Vec::with_capacity(graph.namespace(ns).aliases().len());
    for alias in graph.namespace(ns).aliases() {
      let Some(import_name) = &alias.import_name else {
        aliases.push(self.module_alias(ns, alias.module, &alias.export_name));
        continue;
      };
      if graph.is_root(ns) && graph.is_root(alias.module) && alias.module != ns {
        aliases.push(Statement::ReExport {
          specifier: graph.root_name(alias.module).to_string(),
          import_name: import_name.clone(),
          export_name: alias.export_name.clone(),
        });
        continue;
      }
      let Some(target) = graph.child_named(alias.module, import_name) else {
        warn!(
          export = %alias.export_name,
          import = %import_name,
          "alias export points at a missing member"
        );
        continue;
      };
      aliases.push(Statement::ImportEquals {
        exported: true,
        name: alias.export_name.clone(),
        target: self.reference(ns, target),
      });
    }
    self.aliases.insert(ns, aliases);
    Ok(())
  }

  /// How a declaration in `from` spells `target`.
  fn reference(&mut self, from: NamespaceId, target: EntityId) -> String {
    let graph = self.graph;
    let (target_root, chain) = graph.path_from_root(target);
    let from_root = graph.root_of(from);

    if from_root == target_root {
      if let Some(path) = self.local_path(from, &chain) {
        return path;
      }
    }

    for &entity in &chain {
      if let Some(ns) = graph.entity(entity).namespace {
        if graph.is_ne(ns) {
          self.exported_ne.insert(ns);
        }
      }
    }
    let mut path = self.import_local(from_root, target_root);
    for &entity in &chain {
      path.push('.');
      path.push_str(&graph.entity(entity).name);
    }
    path
  }

  /// Re-export of a whole module under `export_name` from `host`.
  fn module_alias(&mut self, host: NamespaceId, module: NamespaceId, export_name: &str) -> Statement {
    let graph = self.graph;
    if !graph.is_root(module) {
      return Statement::ImportEquals {
        exported: true,
        name: export_name.to_string(),
        target: self.reference(host, graph.namespace(module).entity),
      };
    }
    if graph.is_root(host) {
      return Statement::ReExportNamespace {
        specifier: graph.root_name(module).to_string(),
        export_name: export_name.to_string(),
      };
    }
    Statement::ImportEquals {
      exported: true,
      name: export_name.to_string(),
      target: self.import_local(graph.root_of(host), module),
    }
  }

  /// Local name under which `from_root` imports `target_root`. Locals never
  /// clash with `__NE`, with members of `from_root` or with each other.
  fn import_local(&mut self, from_root: NamespaceId, target_root: NamespaceId) -> String {
    let graph = self.graph;
    let specifier = graph.root_name(target_root);
    let imports = self.imports.entry(from_root).or_default();
    if let Some(local) = imports.get(specifier) {
      return local.clone();
    }
    let base = import_alias_name(specifier);
    let mut local = base.clone();
    let mut suffix = 1;
    while local == NE_NAMESPACE_NAME
      || graph.has_name(from_root, &local)
      || imports.values().any(|taken| *taken == local)
    {
      local = format!("{base}_{suffix}");
      suffix += 1;
    }
    imports.insert(specifier.to_string(), local.clone());
    local
  }

  /// Path from the nearest common ancestor of `from` and the target, unless an
  /// intermediate namespace declares a member with the path's first name.
  fn local_path(&self, from: NamespaceId, chain: &[EntityId]) -> Option<String> {
    let graph = self.graph;
    let ancestors = graph.ancestors(from);
    let target_parents: Vec<Option<NamespaceId>> =
      chain.iter().map(|&entity| graph.entity(entity).parent).collect();
    let (depth, start) = ancestors.iter().enumerate().find_map(|(depth, ns)| {
      target_parents
        .iter()
        .position(|parent| *parent == Some(*ns))
        .map(|start| (depth, start))
    })?;

    let first = &graph.entity(chain[start]).name;
    let shadowed = ancestors[..depth].iter().any(|&ns| {
      graph.child_named(ns, first).is_some()
        || graph
          .namespace(ns)
          .aliases()
          .iter()
          .any(|alias| &alias.export_name == first)
    });
    if shadowed {
      return None;
    }
    Some(
      chain[start..]
        .iter()
        .map(|&entity| graph.entity(entity).name.as_str())
        .collect::<Vec<_>>()
        .join("."),
    )
  }

  fn assemble(&mut self, ns: NamespaceId) -> Vec<Statement> {
    let graph = self.graph;
    let mut body = self.declarations.remove(&ns).unwrap_or_default();
    for &child in graph.namespace(ns).children() {
      let entity = graph.entity(child);
      let Some(child_ns) = entity.namespace else {
        continue;
      };
      if graph.is_ne(child_ns) {
        continue;
      }
      body.push(Statement::Namespace {
        exported: true,
        name: entity.name.clone(),
        body: self.assemble(child_ns),
      });
    }
    body.extend(self.aliases.remove(&ns).unwrap_or_default());
    if let Some(ne) = graph.namespace(ns).ne() {
      body.push(Statement::Namespace {
        exported: self.exported_ne.contains(&ne),
        name: NE_NAMESPACE_NAME.to_string(),
        body: self.assemble(ne),
      });
    }
    body
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::AliasExport;
  use crate::entity::Origin;
  use crate::program::SymbolId;
  use crate::stmt::print_statements;
  use crate::stmt::Declaration;

  fn print(modules: &[EmittedModule]) -> String {
    let mut out = String::new();
    for module in modules {
      print_statements(&mut out, &module.statements).unwrap();
    }
    out
  }

  fn leaf(graph: &mut EntityGraph, ns: NamespaceId, name: &str, symbol: u32) -> EntityId {
    graph
      .add_entity(ns, name.into(), Origin::Symbol(SymbolId(symbol)))
      .unwrap()
  }

  fn type_alias(name: &str, body: Vec<Piece>) -> Declaration {
    Declaration {
      keyword: "type",
      name: name.into(),
      body,
    }
  }

  #[test]
  fn same_root_references_use_the_common_ancestor() {
    let mut graph = EntityGraph::new();
    let root = graph.create_root("lib", SymbolId(0)).unwrap();
    let ne = graph.get_or_create_ne(root).unwrap();
    let hidden = leaf(&mut graph, ne, "_src_index_Bar", 1);
    let foo = leaf(&mut graph, root, "Foo", 2);
    graph.push_statements(ne, [type_alias("_src_index_Bar", vec![Piece::Text(" = 1;".into())])]);
    graph.push_statements(
      root,
      [type_alias(
        "Foo",
        vec![
          Piece::Text(" = ".into()),
          Piece::Entity(hidden),
          Piece::Text(";".into()),
        ],
      )],
    );
    let _ = foo;

    let modules = emit_modules(&graph, &TypeReferences::new()).unwrap();
    assert_eq!(
      print(&modules),
      concat!(
        "declare module \"lib\" {\n",
        "  export type Foo = __NE._src_index_Bar;\n",
        "  namespace __NE {\n",
        "    export type _src_index_Bar = 1;\n",
        "  }\n",
        "  export {};\n",
        "}\n",
      )
    );
  }

  #[test]
  fn shadowed_paths_fall_back_to_a_root_import() {
    let mut graph = EntityGraph::new();
    let root = graph.create_root("lib", SymbolId(0)).unwrap();
    let root_ne = graph.get_or_create_ne(root).unwrap();
    let hidden = leaf(&mut graph, root_ne, "_a_X", 1);
    let ns_entity = leaf(&mut graph, root, "ns", 2);
    let ns = graph.attach_namespace(ns_entity);
    let inner_ne = graph.get_or_create_ne(ns).unwrap();
    leaf(&mut graph, inner_ne, "_a_Y", 3);
    leaf(&mut graph, ns, "Z", 4);
    graph.push_statements(root_ne, [type_alias("_a_X", vec![Piece::Text(" = 1;".into())])]);
    graph.push_statements(inner_ne, [type_alias("_a_Y", vec![Piece::Text(" = 2;".into())])]);
    graph.push_statements(
      ns,
      [type_alias(
        "Z",
        vec![Piece::Text(" = ".into()), Piece::Entity(hidden), Piece::Text(";".into())],
      )],
    );

    let modules = emit_modules(&graph, &TypeReferences::new()).unwrap();
    assert_eq!(
      print(&modules),
      concat!(
        "declare module \"lib\" {\n",
        "  import * as __lib from \"lib\";\n",
        "  export namespace ns {\n",
        "    export type Z = __lib.__NE._a_X;\n",
        "    namespace __NE {\n",
        "      export type _a_Y = 2;\n",
        "    }\n",
        "  }\n",
        "  export namespace __NE {\n",
        "    export type _a_X = 1;\n",
        "  }\n",
        "}\n",
      )
    );
  }

  #[test]
  fn cross_root_references_and_aliases() {
    let mut graph = EntityGraph::new();
    let a = graph.create_root("a", SymbolId(0)).unwrap();
    let b = graph.create_root("b", SymbolId(1)).unwrap();
    let thing = leaf(&mut graph, a, "Thing", 2);
    let a_ne = graph.get_or_create_ne(a).unwrap();
    let secret = leaf(&mut graph, a_ne, "_x_Secret", 3);
    let ns_entity = leaf(&mut graph, b, "inner", 4);
    let inner = graph.attach_namespace(ns_entity);
    graph.push_statements(a, [type_alias("Thing", vec![Piece::Text(" = 1;".into())])]);
    graph.push_statements(a_ne, [type_alias("_x_Secret", vec![Piece::Text(" = 2;".into())])]);
    graph.push_statements(
      b,
      [type_alias(
        "Uses",
        vec![
          Piece::Text(" = ".into()),
          Piece::Entity(secret),
          Piece::Text(" | ".into()),
          Piece::Root(a),
          Piece::Text(";".into()),
        ],
      )],
    );
    leaf(&mut graph, b, "Uses", 5);
    graph
      .add_alias(
        b,
        AliasExport {
          module: a,
          import_name: Some("Thing".into()),
          export_name: "Renamed".into(),
        },
      )
      .unwrap();
    graph
      .add_alias(
        inner,
        AliasExport {
          module: a,
          import_name: Some("Thing".into()),
          export_name: "Thing".into(),
        },
      )
      .unwrap();
    let _ = thing;

    let mut refs = TypeReferences::new();
    refs.entry(b).or_default().insert("node".into());
    let modules = emit_modules(&graph, &refs).unwrap();
    assert_eq!(modules[1].type_references.len(), 1);
    assert_eq!(
      print(&modules),
      concat!(
        "declare module \"a\" {\n",
        "  export type Thing = 1;\n",
        "  export namespace __NE {\n",
        "    export type _x_Secret = 2;\n",
        "  }\n",
        "}\n",
        "declare module \"b\" {\n",
        "  import * as __a from \"a\";\n",
        "  export type Uses = __a.__NE._x_Secret | import(\"a\");\n",
        "  export namespace inner {\n",
        "    export import Thing = __a.Thing;\n",
        "  }\n",
        "  export { Thing as Renamed } from \"a\";\n",
        "}\n",
      )
    );
  }

  #[test]
  fn import_locals_avoid_the_ne_namespace() {
    let mut graph = EntityGraph::new();
    let ne_entry = graph.create_root("NE", SymbolId(0)).unwrap();
    let lib = graph.create_root("lib", SymbolId(1)).unwrap();
    let thing = leaf(&mut graph, ne_entry, "Thing", 2);
    let lib_ne = graph.get_or_create_ne(lib).unwrap();
    let hidden = leaf(&mut graph, lib_ne, "_x_Y", 3);
    leaf(&mut graph, lib, "Foo", 4);
    graph.push_statements(ne_entry, [type_alias("Thing", vec![Piece::Text(" = 1;".into())])]);
    graph.push_statements(lib_ne, [type_alias("_x_Y", vec![Piece::Text(" = 2;".into())])]);
    graph.push_statements(
      lib,
      [type_alias(
        "Foo",
        vec![
          Piece::Text(" = ".into()),
          Piece::Entity(thing),
          Piece::Text(" | ".into()),
          Piece::Entity(hidden),
          Piece::Text(";".into()),
        ],
      )],
    );

    let modules = emit_modules(&graph, &TypeReferences::new()).unwrap();
    assert_eq!(
      print(&modules),
      concat!(
        "declare module \"NE\" {\n",
        "  export type Thing = 1;\n",
        "}\n",
        "declare module \"lib\" {\n",
        "  import * as __NE_1 from \"NE\";\n",
        "  export type Foo = __NE_1.Thing | __NE._x_Y;\n",
        "  namespace __NE {\n",
        "    export type _x_Y = 2;\n",
        "  }\n",
        "  export {};\n",
        "}\n",
      )
    );
  }

  #[test]
  fn whole_entry_re_exports() {
    let mut graph = EntityGraph::new();
    let a = graph.create_root("a", SymbolId(0)).unwrap();
    let b = graph.create_root("b", SymbolId(1)).unwrap();
    let ns_entity = leaf(&mut graph, a, "inner", 2);
    let inner = graph.attach_namespace(ns_entity);
    let entry_alias = |export_name: &str, module| AliasExport {
      module,
      import_name: None,
      export_name: export_name.into(),
    };
    graph.add_alias(inner, entry_alias("self", a)).unwrap();
    graph.add_alias(b, entry_alias("a", a)).unwrap();

    let modules = emit_modules(&graph, &TypeReferences::new()).unwrap();
    assert_eq!(
      print(&modules),
      concat!(
        "declare module \"a\" {\n",
        "  import * as __a from \"a\";\n",
        "  export namespace inner {\n",
        "    export import self = __a;\n",
        "  }\n",
        "}\n",
        "declare module \"b\" {\n",
        "  export * as a from \"a\";\n",
        "}\n",
      )
    );
  }
}

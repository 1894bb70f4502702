//! Hosting of non-exported symbols.
//!
//! A private symbol that a bundled declaration refers to gets an entity in an
//! NE namespace, named by [`generate_unique_name`]. By default it lands in the
//! NE namespace of the nearest concrete namespace of the declaration that
//! referred to it. Routing rules can send symbols from matching modules to the
//! NE namespace of a specific entry instead.

use crate::config::BundleConfig;
use crate::config::RoutingRule;
use crate::entity::AliasExport;
use crate::entity::EntityGraph;
use crate::entity::EntityId;
use crate::entity::NamespaceId;
use crate::entity::Origin;
use crate::error::BundleError;
use crate::error::Result;
use crate::naming::generate_unique_name;
use crate::program::Program;
use crate::program::SymbolId;
use crate::recast::Registrar;
use crate::stmt::Declaration;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Where a placed symbol ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
  pub entity: EntityId,
  /// The NE namespace hosting the entity.
  pub namespace: NamespaceId,
}

impl Placement {
  /// Appends rewritten declarations of the placed symbol to its host.
  pub fn add_statements(&self, graph: &mut EntityGraph, statements: impl IntoIterator<Item = Declaration>) {
    graph.push_statements(self.namespace, statements);
  }
}

pub struct Placer<'a> {
  program: &'a Program,
  root_dir: &'a Path,
  rules: &'a [RoutingRule],
  private_tag: Option<&'a str>,
  entry_scope: &'a BTreeSet<SymbolId>,
}

impl<'a> Placer<'a> {
  pub fn new(program: &'a Program, config: &'a BundleConfig, entry_scope: &'a BTreeSet<SymbolId>) -> Self {
    Self {
      program,
      root_dir: config.root_dir(),
      rules: &config.non_exported_symbol_distribution,
      private_tag: config.private_js_doc_tag.as_deref(),
      entry_scope,
    }
  }

  /// Places `symbol`, referenced from a declaration in `referencing`.
  /// Returns `None` when a routing rule matched but names an entry that does
  /// not exist.
  pub fn register_non_exported_symbol(
    &self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Option<Placement>> {
    let module = self
      .program
      .first_decl(symbol)
      .map(|decl| self.program.enclosing_module_name(decl, self.root_dir));
    let rule = module.as_deref().and_then(|module| {
      self
        .rules
        .iter()
        .find(|rule| rule.source_module.is_match(module))
    });
    let host = match rule {
      Some(rule) => match graph.root_by_name(&rule.target_module) {
        Some(root) => graph.get_or_create_ne(root)?,
        None => {
          debug!(
            symbol = %self.program.symbol(symbol).name,
            target = %rule.target_module,
            "routing rule names an unknown entry"
          );
          return Ok(None);
        }
      },
      None => graph.get_or_create_ne(anchor(graph, referencing))?,
    };
    self.place(graph, symbol, host).map(Some)
  }

  /// Places `symbol` in the NE namespace of the anchor of `referencing`,
  /// ignoring routing rules.
  pub fn register_default(
    &self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Placement> {
    let host = graph.get_or_create_ne(anchor(graph, referencing))?;
    self.place(graph, symbol, host)
  }

  fn place(&self, graph: &mut EntityGraph, symbol: SymbolId, host: NamespaceId) -> Result<Placement> {
    if let Some(existing) = graph.entity_for_symbol(symbol) {
      return Err(BundleError::DuplicateEntity {
        symbol,
        name: self.program.symbol(symbol).name.clone(),
        existing: graph.display_path(existing),
      });
    }
    let name = generate_unique_name(self.program, symbol, self.root_dir);
    let entity = graph.add_entity(host, name, Origin::Symbol(symbol))?;
    graph.register_symbol(symbol, entity)?;
    if self.program.is_container(symbol) {
      let ns = graph.attach_namespace(entity);
      self.copy_members(graph, symbol, ns)?;
    }
    debug!(
      path = %graph.display_path(entity),
      in_entry_scope = self.entry_scope.contains(&symbol),
      "placed non-exported symbol"
    );
    Ok(Placement {
      entity,
      namespace: host,
    })
  }

  /// Fills the namespace copy of `container` with its exports. Members that
  /// already have an entity are re-exported from wherever they live.
  fn copy_members(&self, graph: &mut EntityGraph, container: SymbolId, ns: NamespaceId) -> Result<()> {
    let program = self.program;
    for export in &program.symbol(container).exports {
      let Some(original) = program.resolve_alias(export.symbol) else {
        continue;
      };
      if self
        .private_tag
        .is_some_and(|tag| program.has_tag(original, tag))
      {
        continue;
      }
      if let Some(existing) = graph.entity_for_symbol(original) {
        if let Some(module) = graph.entity(existing).parent {
          let import_name = graph.entity(existing).name.clone();
          graph.add_alias(
            ns,
            AliasExport {
              module,
              import_name: Some(import_name),
              export_name: export.name.clone(),
            },
          )?;
        }
        continue;
      }
      if let Some(root) = graph.root_for_symbol(original) {
        debug!(export = %export.name, "re-exporting an entry module from a namespace copy");
        graph.add_alias(
          ns,
          AliasExport {
            module: root,
            import_name: None,
            export_name: export.name.clone(),
          },
        )?;
        continue;
      }
      let child = graph.add_entity(ns, export.name.clone(), Origin::Symbol(original))?;
      graph.register_symbol(original, child)?;
      if program.is_container(original) {
        let child_ns = graph.attach_namespace(child);
        self.copy_members(graph, original, child_ns)?;
      }
    }
    Ok(())
  }
}

/// Nearest namespace at or above `ns` that stands for a source symbol, i.e.
/// the first one that is not an NE namespace.
fn anchor(graph: &EntityGraph, ns: NamespaceId) -> NamespaceId {
  graph
    .ancestors(ns)
    .into_iter()
    .find(|&candidate| !graph.is_ne(candidate))
    .unwrap_or_else(|| graph.root_of(ns))
}

impl<'a> Registrar for Placer<'a> {
  fn register(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Option<Placement>> {
    self.register_non_exported_symbol(graph, symbol, referencing)
  }

  fn register_default(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Placement> {
    Placer::register_default(self, graph, symbol, referencing)
  }
}

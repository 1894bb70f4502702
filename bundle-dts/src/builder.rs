//! Materializes the export forest as entities.
//!
//! [`create_entities`] must run over the whole forest before
//! [`add_alias_exports`], since aliases may point into sibling subtrees or
//! other entries.

use crate::distribution::ExportForest;
use crate::distribution::MetaId;
use crate::entity::AliasExport;
use crate::entity::EntityGraph;
use crate::entity::NamespaceId;
use crate::entity::Origin;
use crate::error::BundleError;
use crate::error::Result;
use tracing::debug;

/// Creates one entity per main export of `meta` under `parent`, recursing into
/// nested namespaces in pre-order.
pub fn create_entities(
  graph: &mut EntityGraph,
  forest: &ExportForest,
  meta: MetaId,
  parent: NamespaceId,
) -> Result<()> {
  graph.bind_meta(meta, parent);
  for export in &forest.meta(meta).main_exports {
    let entity = graph.add_entity(
      parent,
      export.export_name.clone(),
      Origin::Symbol(export.original),
    )?;
    if let Some(children) = export.children {
      let ns = graph.attach_namespace(entity);
      create_entities(graph, forest, children, ns)?;
    }
    graph.register_symbol(export.original, entity)?;
    debug!(path = %graph.display_path(entity), "created entity");
  }
  Ok(())
}

/// Wires the alias exports of `meta` and of every nested module.
pub fn add_alias_exports(graph: &mut EntityGraph, forest: &ExportForest, meta: MetaId) -> Result<()> {
  let module = forest.meta(meta);
  if !module.alias_exports.is_empty() || !module.entry_aliases.is_empty() {
    let host = bound_namespace(graph, meta)?;
    for alias in &module.alias_exports {
      let target = bound_namespace(graph, alias.target)?;
      let import_name = forest.meta(alias.target).main_exports[alias.export_index]
        .export_name
        .clone();
      debug!(
        host = %graph.display_path(graph.namespace(host).entity),
        export = %alias.export_name,
        import = %import_name,
        "wired alias export"
      );
      graph.add_alias(
        host,
        AliasExport {
          module: target,
          import_name: Some(import_name),
          export_name: alias.export_name.clone(),
        },
      )?;
    }
    for alias in &module.entry_aliases {
      let target = bound_namespace(graph, forest.roots()[alias.entry])?;
      debug!(
        host = %graph.display_path(graph.namespace(host).entity),
        export = %alias.export_name,
        entry = %graph.root_name(target),
        "wired entry re-export"
      );
      graph.add_alias(
        host,
        AliasExport {
          module: target,
          import_name: None,
          export_name: alias.export_name.clone(),
        },
      )?;
    }
  }
  for export in &module.main_exports {
    if let Some(children) = export.children {
      add_alias_exports(graph, forest, children)?;
    }
  }
  Ok(())
}

fn bound_namespace(graph: &EntityGraph, meta: MetaId) -> Result<NamespaceId> {
  graph
    .namespace_for_meta(meta)
    .ok_or(BundleError::UnboundModule(meta.0))
}

//! Rewrites source declarations into the entity tree.
//!
//! Each root module is walked through a work queue. Leaf entities render their
//! declarations into their namespace's statement list; references in
//! declaration bodies become [`Piece`]s that emission spells out once the tree
//! is final. A project symbol that has no entity yet is handed to the
//! [`Registrar`], and the entity it returns is queued and rendered the same
//! way, so symbols reached only through other private symbols get placed too.

use crate::entity::EntityGraph;
use crate::entity::EntityId;
use crate::entity::NamespaceId;
use crate::error::Result;
use crate::placement::Placement;
use crate::program::FileOrigin;
use crate::program::Fragment;
use crate::program::Program;
use crate::program::SymbolId;
use crate::stmt::Declaration;
use crate::stmt::Piece;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use tracing::debug_span;
use tracing::warn;

/// Creates entities for symbols that have none.
pub trait Registrar {
  /// Places `symbol`, first referenced from a declaration in `referencing`.
  /// `None` means the configured policy could not place it.
  fn register(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Option<Placement>>;

  /// Places `symbol` next to the declaration that referenced it.
  fn register_default(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Placement>;
}

impl<R: Registrar + ?Sized> Registrar for &mut R {
  fn register(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Option<Placement>> {
    (**self).register(graph, symbol, referencing)
  }

  fn register_default(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    referencing: NamespaceId,
  ) -> Result<Placement> {
    (**self).register_default(graph, symbol, referencing)
  }
}

/// `/// <reference types>` packages needed by each root module.
pub type TypeReferences = BTreeMap<NamespaceId, BTreeSet<String>>;

enum Work {
  Namespace(NamespaceId),
  Placed(Placement),
}

pub struct Recaster<'a, R: Registrar> {
  program: &'a Program,
  registrar: R,
  type_references: TypeReferences,
}

impl<'a, R: Registrar> Recaster<'a, R> {
  pub fn new(program: &'a Program, registrar: R) -> Self {
    Self {
      program,
      registrar,
      type_references: TypeReferences::new(),
    }
  }

  pub fn run(mut self, graph: &mut EntityGraph) -> Result<TypeReferences> {
    let roots: Vec<_> = graph.roots().iter().map(|root| root.namespace).collect();
    for root in roots {
      let _span = debug_span!("recast", module = %graph.root_name(root)).entered();
      let mut queue = VecDeque::from([Work::Namespace(root)]);
      while let Some(work) = queue.pop_front() {
        match work {
          Work::Namespace(ns) => self.recast_namespace(graph, ns, &mut queue)?,
          Work::Placed(placement) => {
            let declarations = self.render(graph, placement.entity, placement.namespace, &mut queue)?;
            placement.add_statements(graph, declarations);
            if let Some(copy) = graph.entity(placement.entity).namespace {
              queue.push_front(Work::Namespace(copy));
            }
          }
        }
      }
    }
    Ok(self.type_references)
  }

  fn recast_namespace(
    &mut self,
    graph: &mut EntityGraph,
    ns: NamespaceId,
    queue: &mut VecDeque<Work>,
  ) -> Result<()> {
    let children = graph.namespace(ns).children().to_vec();
    let mut nested = Vec::new();
    for child in children {
      if let Some(child_ns) = graph.entity(child).namespace {
        // Members of NE namespaces are rendered when they are placed.
        if graph.is_ne(child_ns) {
          continue;
        }
        nested.push(child_ns);
      }
      let declarations = self.render(graph, child, ns, queue)?;
      graph.push_statements(ns, declarations);
    }
    for child_ns in nested.into_iter().rev() {
      queue.push_front(Work::Namespace(child_ns));
    }
    Ok(())
  }

  /// One declaration per leaf declaration of the entity's symbol. Containers
  /// merged with a leaf declaration (e.g. a function and a namespace of the
  /// same name) render the leaf part here.
  fn render(
    &mut self,
    graph: &mut EntityGraph,
    entity: EntityId,
    ns: NamespaceId,
    queue: &mut VecDeque<Work>,
  ) -> Result<Vec<Declaration>> {
    let Some(symbol) = graph.entity(entity).origin.symbol() else {
      return Ok(Vec::new());
    };
    let program = self.program;
    let mut declarations = Vec::new();
    for &decl in &program.symbol(symbol).decls {
      let data = program.decl(decl);
      let Some(keyword) = data.kind.keyword() else {
        continue;
      };
      let mut body = Vec::with_capacity(data.body.len());
      for fragment in &data.body {
        body.push(match fragment {
          Fragment::Text(text) => Piece::Text(text.clone()),
          Fragment::Ref { symbol } => self.reference(graph, *symbol, ns, queue)?,
        });
      }
      declarations.push(Declaration {
        keyword,
        name: graph.entity(entity).name.clone(),
        body,
      });
    }
    Ok(declarations)
  }

  fn reference(
    &mut self,
    graph: &mut EntityGraph,
    symbol: SymbolId,
    ns: NamespaceId,
    queue: &mut VecDeque<Work>,
  ) -> Result<Piece> {
    let program = self.program;
    let Some(original) = program.resolve_alias(symbol) else {
      warn!(symbol = %program.symbol(symbol).name, "reference through a cyclic import binding");
      return Ok(Piece::Text(program.symbol(symbol).name.clone()));
    };
    if let Some(entity) = graph.entity_for_symbol(original) {
      return Ok(Piece::Entity(entity));
    }
    if let Some(root) = graph.root_for_symbol(original) {
      return Ok(Piece::Root(root));
    }
    if !program.is_project_symbol(original) {
      return Ok(self.external(graph, original, ns));
    }

    let placement = match self.registrar.register(graph, original, ns)? {
      Some(placement) => placement,
      None => {
        warn!(
          symbol = %program.symbol(original).name,
          "routing target is not a configured entry, hoisting next to the reference"
        );
        self.registrar.register_default(graph, original, ns)?
      }
    };
    queue.push_back(Work::Placed(placement));
    Ok(Piece::Entity(placement.entity))
  }

  fn external(&mut self, graph: &EntityGraph, symbol: SymbolId, ns: NamespaceId) -> Piece {
    let program = self.program;
    let name = program.symbol(symbol).name.clone();
    let Some(decl) = program.first_decl(symbol) else {
      return Piece::External { module: None, name };
    };
    let file = program.file(program.decl(decl).file);
    if file.origin != FileOrigin::External {
      return Piece::External { module: None, name };
    }
    if let Some(package) = &file.types_package {
      self
        .type_references
        .entry(graph.root_of(ns))
        .or_default()
        .insert(package.clone());
    }
    Piece::External {
      module: program.enclosing_ambient_module(decl).map(str::to_string),
      name,
    }
  }
}

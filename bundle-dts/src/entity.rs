//! The post-bundling namespace tree.
//!
//! Every bundled symbol gets exactly one [`Entity`]: a name inside exactly one
//! parent namespace. Entities that contain nested exports carry
//! [`NamespaceTraits`]. All entities and namespaces live in one arena,
//! [`EntityGraph`], together with the three lookup tables a run shares:
//! symbol to entity, export module to namespace, and entry name to root
//! module. Every table is written once per key.

use crate::distribution::MetaId;
use crate::error::BundleError;
use crate::error::Result;
use crate::program::SymbolId;
use crate::stmt::Declaration;
use ahash::AHashMap;
use ahash::AHashSet;

/// Name of the synthetic namespace that hosts non-exported symbols.
pub const NE_NAMESPACE_NAME: &str = "__NE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespaceId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
  Symbol(SymbolId),
  /// NE namespaces only.
  Synthetic,
}

impl Origin {
  pub fn symbol(&self) -> Option<SymbolId> {
    match self {
      Origin::Symbol(symbol) => Some(*symbol),
      Origin::Synthetic => None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Entity {
  pub parent: Option<NamespaceId>,
  pub name: String,
  pub origin: Origin,
  pub namespace: Option<NamespaceId>,
}

/// `this namespace exports export_name, which is import_name of module`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasExport {
  pub module: NamespaceId,
  /// `None` re-exports `module` itself.
  pub import_name: Option<String>,
  pub export_name: String,
}

#[derive(Clone, Debug)]
pub struct NamespaceTraits {
  pub entity: EntityId,
  children: Vec<EntityId>,
  names: AHashSet<String>,
  ne: Option<NamespaceId>,
  aliases: Vec<AliasExport>,
  statements: Vec<Declaration>,
}

impl NamespaceTraits {
  pub fn children(&self) -> &[EntityId] {
    &self.children
  }

  pub fn ne(&self) -> Option<NamespaceId> {
    self.ne
  }

  pub fn aliases(&self) -> &[AliasExport] {
    &self.aliases
  }

  pub fn statements(&self) -> &[Declaration] {
    &self.statements
  }
}

#[derive(Clone, Debug)]
pub struct RootModule {
  pub name: String,
  pub symbol: SymbolId,
  pub namespace: NamespaceId,
}

#[derive(Debug, Default)]
pub struct EntityGraph {
  entities: Vec<Entity>,
  namespaces: Vec<NamespaceTraits>,
  symbol_entities: AHashMap<SymbolId, EntityId>,
  meta_namespaces: AHashMap<MetaId, NamespaceId>,
  roots: Vec<RootModule>,
}

impl EntityGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entity(&self, id: EntityId) -> &Entity {
    &self.entities[id.0 as usize]
  }

  pub fn namespace(&self, id: NamespaceId) -> &NamespaceTraits {
    &self.namespaces[id.0 as usize]
  }

  pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> {
    (0..self.entities.len() as u32).map(EntityId)
  }

  pub fn namespace_ids(&self) -> impl Iterator<Item = NamespaceId> {
    (0..self.namespaces.len() as u32).map(NamespaceId)
  }

  pub fn roots(&self) -> &[RootModule] {
    &self.roots
  }

  pub fn root_by_name(&self, name: &str) -> Option<NamespaceId> {
    self
      .roots
      .iter()
      .find(|root| root.name == name)
      .map(|root| root.namespace)
  }

  pub fn root_for_symbol(&self, symbol: SymbolId) -> Option<NamespaceId> {
    self
      .roots
      .iter()
      .find(|root| root.symbol == symbol)
      .map(|root| root.namespace)
  }

  pub fn is_root(&self, ns: NamespaceId) -> bool {
    self.namespace_parent(ns).is_none()
  }

  pub fn root_name(&self, root: NamespaceId) -> &str {
    &self.entity(self.namespace(root).entity).name
  }

  /// Creates the root entity for an entry module.
  pub fn create_root(&mut self, name: &str, symbol: SymbolId) -> Result<NamespaceId> {
    if self.root_by_name(name).is_some() {
      return Err(BundleError::NameCollision {
        name: name.to_string(),
        namespace: "<entries>".to_string(),
      });
    }
    let entity = self.alloc_entity(Entity {
      parent: None,
      name: name.to_string(),
      origin: Origin::Symbol(symbol),
      namespace: None,
    });
    let namespace = self.attach_namespace(entity);
    self.roots.push(RootModule {
      name: name.to_string(),
      symbol,
      namespace,
    });
    Ok(namespace)
  }

  /// Adds a child entity. Names are unique per namespace, including the names
  /// of alias exports.
  pub fn add_entity(&mut self, parent: NamespaceId, name: String, origin: Origin) -> Result<EntityId> {
    self.claim_name(parent, &name)?;
    let entity = self.alloc_entity(Entity {
      parent: Some(parent),
      name,
      origin,
      namespace: None,
    });
    self.namespaces[parent.0 as usize].children.push(entity);
    Ok(entity)
  }

  /// Returns the entity's namespace traits, attaching empty ones on first use.
  pub fn attach_namespace(&mut self, entity: EntityId) -> NamespaceId {
    if let Some(ns) = self.entity(entity).namespace {
      return ns;
    }
    let ns = NamespaceId(self.namespaces.len() as u32);
    self.namespaces.push(NamespaceTraits {
      entity,
      children: Vec::new(),
      names: AHashSet::new(),
      ne: None,
      aliases: Vec::new(),
      statements: Vec::new(),
    });
    self.entities[entity.0 as usize].namespace = Some(ns);
    ns
  }

  pub fn get_or_create_ne(&mut self, ns: NamespaceId) -> Result<NamespaceId> {
    if let Some(ne) = self.namespace(ns).ne {
      return Ok(ne);
    }
    let entity = self.add_entity(ns, NE_NAMESPACE_NAME.to_string(), Origin::Synthetic)?;
    let ne = self.attach_namespace(entity);
    self.namespaces[ns.0 as usize].ne = Some(ne);
    Ok(ne)
  }

  pub fn is_ne(&self, ns: NamespaceId) -> bool {
    self.entity(self.namespace(ns).entity).origin == Origin::Synthetic
  }

  pub fn register_symbol(&mut self, symbol: SymbolId, entity: EntityId) -> Result<()> {
    if let Some(&existing) = self.symbol_entities.get(&symbol) {
      return Err(BundleError::DuplicateEntity {
        symbol,
        name: self.entity(entity).name.clone(),
        existing: self.display_path(existing),
      });
    }
    self.symbol_entities.insert(symbol, entity);
    Ok(())
  }

  pub fn entity_for_symbol(&self, symbol: SymbolId) -> Option<EntityId> {
    self.symbol_entities.get(&symbol).copied()
  }

  pub fn bind_meta(&mut self, meta: MetaId, ns: NamespaceId) {
    self.meta_namespaces.entry(meta).or_insert(ns);
  }

  pub fn namespace_for_meta(&self, meta: MetaId) -> Option<NamespaceId> {
    self.meta_namespaces.get(&meta).copied()
  }

  pub fn add_alias(&mut self, host: NamespaceId, alias: AliasExport) -> Result<()> {
    self.claim_name(host, &alias.export_name)?;
    self.namespaces[host.0 as usize].aliases.push(alias);
    Ok(())
  }

  pub fn push_statements(&mut self, ns: NamespaceId, statements: impl IntoIterator<Item = Declaration>) {
    self.namespaces[ns.0 as usize].statements.extend(statements);
  }

  /// True when `name` is taken by a child or an alias export of `ns`.
  pub fn has_name(&self, ns: NamespaceId, name: &str) -> bool {
    self.namespace(ns).names.contains(name)
  }

  pub fn child_named(&self, ns: NamespaceId, name: &str) -> Option<EntityId> {
    self
      .namespace(ns)
      .children
      .iter()
      .copied()
      .find(|&child| self.entity(child).name == name)
  }

  /// Namespace that contains `ns`'s entity.
  pub fn namespace_parent(&self, ns: NamespaceId) -> Option<NamespaceId> {
    self.entity(self.namespace(ns).entity).parent
  }

  pub fn root_of(&self, ns: NamespaceId) -> NamespaceId {
    let mut current = ns;
    while let Some(parent) = self.namespace_parent(current) {
      current = parent;
    }
    current
  }

  /// Namespaces from `ns` up to and including its root.
  pub fn ancestors(&self, ns: NamespaceId) -> Vec<NamespaceId> {
    let mut out = vec![ns];
    let mut current = ns;
    while let Some(parent) = self.namespace_parent(current) {
      out.push(parent);
      current = parent;
    }
    out
  }

  /// The root containing `entity` and the chain of entities from the root's
  /// direct child down to `entity` itself.
  pub fn path_from_root(&self, entity: EntityId) -> (NamespaceId, Vec<EntityId>) {
    let mut chain = vec![entity];
    let mut current = self.entity(entity).parent;
    let mut root = self.entity(entity).namespace;
    while let Some(ns) = current {
      let owner = self.namespace(ns).entity;
      match self.entity(owner).parent {
        Some(parent) => {
          chain.push(owner);
          current = Some(parent);
        }
        None => {
          root = Some(ns);
          current = None;
        }
      }
    }
    chain.reverse();
    // A root entity is its own root.
    (root.unwrap_or(NamespaceId(0)), chain)
  }

  /// Dotted path such as `lib.__NE._src_index_Bar`, for diagnostics.
  pub fn display_path(&self, entity: EntityId) -> String {
    let mut names = vec![self.entity(entity).name.as_str()];
    let mut current = self.entity(entity).parent;
    while let Some(ns) = current {
      let owner = self.entity(self.namespace(ns).entity);
      names.push(&owner.name);
      current = owner.parent;
    }
    names.reverse();
    names.join(".")
  }

  fn display_namespace(&self, ns: NamespaceId) -> String {
    self.display_path(self.namespace(ns).entity)
  }

  fn claim_name(&mut self, ns: NamespaceId, name: &str) -> Result<()> {
    if !self.namespaces[ns.0 as usize].names.insert(name.to_string()) {
      return Err(BundleError::NameCollision {
        name: name.to_string(),
        namespace: self.display_namespace(ns),
      });
    }
    Ok(())
  }

  fn alloc_entity(&mut self, entity: Entity) -> EntityId {
    let id = EntityId(self.entities.len() as u32);
    self.entities.push(entity);
    id
  }
}

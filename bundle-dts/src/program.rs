//! Symbol graph produced by the semantic analyzer.
//!
//! The bundler never parses source text itself. It consumes a [`Program`]: an
//! immutable, index-addressed graph of files, declarations and symbols. IDs are
//! plain indices into the program's tables, so every lookup is a bounds-checked
//! slice access; [`Program::from_json`] validates all indices up front so later
//! lookups cannot go out of range.
//!
//! Declarations form a tree through [`DeclData::parent`]. Source files and
//! module declarations are containers: they own a lexical scope
//! ([`DeclData::locals`]) and their symbol owns an ordered export list. Import
//! bindings are symbols with a [`SymbolData::target`] instead of declarations.
//!
//! ```
//! use bundle_dts::program::{DeclKind, Fragment, ProgramBuilder};
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
//! assert_eq!(program.symbol(foo).name, "Foo");
//! assert!(program.is_project_symbol(bar));
//! ```

use serde::Deserialize;
use serde::Serialize;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

/// Where a file comes from. Only `Project` files are bundled; the others are
/// referenced by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
  #[default]
  Project,
  /// Standard library declarations (`lib.*.d.ts`).
  Lib,
  /// Declarations of a third-party dependency.
  External,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
  pub path: PathBuf,
  #[serde(default)]
  pub origin: FileOrigin,
  /// The `SourceFile` declaration of this file.
  pub decl: DeclId,
  /// Package to pull in with `/// <reference types="..." />` when a bundle
  /// refers to a declaration of this file.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub types_package: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclKind {
  SourceFile,
  /// `namespace N {}` or, when `quoted`, `declare module "n" {}`.
  Module {
    #[serde(default)]
    quoted: bool,
  },
  Interface,
  TypeAlias,
  Class,
  Function,
  Variable,
  Enum,
}

impl DeclKind {
  pub fn is_container(&self) -> bool {
    matches!(self, DeclKind::SourceFile | DeclKind::Module { .. })
  }

  /// Keyword that introduces a leaf declaration; `None` for containers.
  pub fn keyword(&self) -> Option<&'static str> {
    match self {
      DeclKind::SourceFile | DeclKind::Module { .. } => None,
      DeclKind::Interface => Some("interface"),
      DeclKind::TypeAlias => Some("type"),
      DeclKind::Class => Some("class"),
      DeclKind::Function => Some("function"),
      DeclKind::Variable => Some("const"),
      DeclKind::Enum => Some("enum"),
    }
  }
}

/// A piece of a declaration body: literal text, or a reference to a symbol
/// that has to be re-spelled once the symbol has its final home.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
  Text(String),
  Ref {
    #[serde(rename = "ref")]
    symbol: SymbolId,
  },
}

impl Fragment {
  pub fn text(text: impl Into<String>) -> Self {
    Fragment::Text(text.into())
  }

  pub fn reference(symbol: SymbolId) -> Self {
    Fragment::Ref { symbol }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclData {
  #[serde(flatten)]
  pub kind: DeclKind,
  pub symbol: SymbolId,
  #[serde(default)]
  pub parent: Option<DeclId>,
  pub file: FileId,
  /// Everything after the declared name, e.g. ` { x: number; }` for an
  /// interface or ` = string;` for a type alias.
  #[serde(default)]
  pub body: Vec<Fragment>,
  /// JSDoc tags attached to the declaration, without the leading `@`.
  #[serde(default)]
  pub tags: Vec<String>,
  /// Symbols declared or imported in this declaration's scope.
  #[serde(default)]
  pub locals: Vec<SymbolId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
  pub name: String,
  pub symbol: SymbolId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolData {
  pub name: String,
  #[serde(default)]
  pub decls: Vec<DeclId>,
  #[serde(default)]
  pub exports: Vec<ExportEntry>,
  /// Set for import bindings: the symbol the binding refers to.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<SymbolId>,
}

#[derive(Debug, Error)]
pub enum ProgramError {
  #[error("invalid program JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("{what} refers to missing {kind} {index}")]
  DanglingId {
    what: String,
    kind: &'static str,
    index: u32,
  },
  #[error("{0}")]
  Malformed(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
  pub files: Vec<FileData>,
  pub decls: Vec<DeclData>,
  pub symbols: Vec<SymbolData>,
  /// Symbols visible from every scope.
  #[serde(default)]
  pub globals: Vec<SymbolId>,
}

const MODULE_SUFFIXES: &[&str] = &["", ".ts", ".tsx", ".d.ts", "/index.ts", "/index.d.ts"];

impl Program {
  /// Parses and validates a program serialized by an analyzer.
  pub fn from_json(text: &str) -> Result<Program, ProgramError> {
    let program: Program = serde_json::from_str(text)?;
    program.validate()?;
    Ok(program)
  }

  pub fn validate(&self) -> Result<(), ProgramError> {
    let files = self.files.len();
    let decls = self.decls.len();
    let symbols = self.symbols.len();
    let check = |what: String, kind: &'static str, index: u32, len: usize| {
      if (index as usize) < len {
        Ok(())
      } else {
        Err(ProgramError::DanglingId { what, kind, index })
      }
    };

    for (idx, file) in self.files.iter().enumerate() {
      check(format!("file {idx}"), "declaration", file.decl.0, decls)?;
      if self.decls[file.decl.0 as usize].kind != DeclKind::SourceFile {
        return Err(ProgramError::Malformed(format!(
          "file {idx} points at a declaration that is not a source file"
        )));
      }
    }
    for (idx, decl) in self.decls.iter().enumerate() {
      let what = || format!("declaration {idx}");
      check(what(), "symbol", decl.symbol.0, symbols)?;
      check(what(), "file", decl.file.0, files)?;
      if let Some(parent) = decl.parent {
        check(what(), "declaration", parent.0, decls)?;
      }
      for local in &decl.locals {
        check(what(), "symbol", local.0, symbols)?;
      }
      for fragment in &decl.body {
        if let Fragment::Ref { symbol } = fragment {
          check(what(), "symbol", symbol.0, symbols)?;
        }
      }
    }
    self.validate_nesting()?;
    for (idx, symbol) in self.symbols.iter().enumerate() {
      let what = || format!("symbol {idx}");
      for decl in &symbol.decls {
        check(what(), "declaration", decl.0, decls)?;
      }
      for export in &symbol.exports {
        check(what(), "symbol", export.symbol.0, symbols)?;
      }
      if let Some(target) = symbol.target {
        check(what(), "symbol", target.0, symbols)?;
      }
    }
    for global in &self.globals {
      check("globals".to_string(), "symbol", global.0, symbols)?;
    }
    Ok(())
  }

  /// Source files are top-level declarations listed in `files`, and every
  /// parent chain ends at one of them without looping.
  fn validate_nesting(&self) -> Result<(), ProgramError> {
    let mut listed = vec![false; self.decls.len()];
    for file in &self.files {
      listed[file.decl.0 as usize] = true;
    }
    for (idx, decl) in self.decls.iter().enumerate() {
      if decl.kind == DeclKind::SourceFile {
        if decl.parent.is_some() {
          return Err(ProgramError::Malformed(format!(
            "source file declaration {idx} has a parent"
          )));
        }
        if !listed[idx] {
          return Err(ProgramError::Malformed(format!(
            "source file declaration {idx} is not listed in files"
          )));
        }
      }
      let mut current = decl.parent;
      let mut depth = 0;
      while let Some(parent) = current {
        depth += 1;
        if depth > self.decls.len() {
          return Err(ProgramError::Malformed(format!(
            "declaration {idx} has a cyclic parent chain"
          )));
        }
        current = self.decl(parent).parent;
      }
    }
    Ok(())
  }

  pub fn file(&self, id: FileId) -> &FileData {
    &self.files[id.0 as usize]
  }

  pub fn decl(&self, id: DeclId) -> &DeclData {
    &self.decls[id.0 as usize]
  }

  pub fn symbol(&self, id: SymbolId) -> &SymbolData {
    &self.symbols[id.0 as usize]
  }

  pub fn first_decl(&self, symbol: SymbolId) -> Option<DeclId> {
    self.symbol(symbol).decls.first().copied()
  }

  /// Follows import bindings to the symbol they ultimately refer to. Returns
  /// `None` for a binding chain that loops back on itself.
  pub fn resolve_alias(&self, symbol: SymbolId) -> Option<SymbolId> {
    let mut current = symbol;
    for _ in 0..=self.symbols.len() {
      match self.symbol(current).target {
        Some(target) => current = target,
        None => return Some(current),
      }
    }
    None
  }

  /// True when at least one declaration lives in a project file.
  pub fn is_project_symbol(&self, symbol: SymbolId) -> bool {
    self
      .symbol(symbol)
      .decls
      .iter()
      .any(|&decl| self.file(self.decl(decl).file).origin == FileOrigin::Project)
  }

  /// True when the symbol is a module or namespace, i.e. it can own exports.
  pub fn is_container(&self, symbol: SymbolId) -> bool {
    self
      .symbol(symbol)
      .decls
      .iter()
      .any(|&decl| self.decl(decl).kind.is_container())
  }

  pub fn has_tag(&self, symbol: SymbolId, tag: &str) -> bool {
    self
      .symbol(symbol)
      .decls
      .iter()
      .any(|&decl| self.decl(decl).tags.iter().any(|t| t == tag))
  }

  /// Name of the module that encloses `decl`: the root-relative path of the
  /// nearest source file, or the name of the nearest quoted ambient module.
  /// A source file declaration is its own enclosing module.
  pub fn enclosing_module_name(&self, decl: DeclId, root_dir: &Path) -> String {
    let mut current = Some(decl);
    while let Some(id) = current {
      let data = self.decl(id);
      match data.kind {
        DeclKind::SourceFile => return relative_path(&self.file(data.file).path, root_dir),
        DeclKind::Module { quoted: true } => return self.symbol(data.symbol).name.clone(),
        _ => current = data.parent,
      }
    }
    relative_path(&self.file(self.decl(decl).file).path, root_dir)
  }

  /// Name of the nearest quoted ambient module strictly above `decl`.
  pub fn enclosing_ambient_module(&self, decl: DeclId) -> Option<&str> {
    let mut current = self.decl(decl).parent;
    while let Some(id) = current {
      let data = self.decl(id);
      if data.kind == (DeclKind::Module { quoted: true }) {
        return Some(&self.symbol(data.symbol).name);
      }
      current = data.parent;
    }
    None
  }

  pub fn file_by_path(&self, path: &Path, root_dir: &Path) -> Option<FileId> {
    let wanted = relative_path(path, root_dir);
    self
      .files
      .iter()
      .position(|file| relative_path(&file.path, root_dir) == wanted)
      .map(|idx| FileId(idx as u32))
  }

  /// Resolves an entry's module identifier: a project file path relative to
  /// `root_dir` (extension and `/index` optional), or the name of a quoted
  /// ambient module.
  pub fn resolve_module(&self, specifier: &str, root_dir: &Path) -> Option<SymbolId> {
    for suffix in MODULE_SUFFIXES {
      let candidate = format!("{specifier}{suffix}");
      if let Some(file) = self.file_by_path(Path::new(&candidate), root_dir) {
        let data = self.file(file);
        if data.origin == FileOrigin::Project {
          return Some(self.decl(data.decl).symbol);
        }
      }
    }
    self.decls.iter().find_map(|decl| {
      (decl.kind == DeclKind::Module { quoted: true }
        && self.symbol(decl.symbol).name == specifier)
        .then_some(decl.symbol)
    })
  }
}

/// Renders `path` relative to `root_dir` with forward slashes. Paths outside
/// the root are rendered as given.
pub fn relative_path(path: &Path, root_dir: &Path) -> String {
  let path = normalize(path);
  let root = normalize(root_dir);
  let relative = path.strip_prefix(&root).unwrap_or(&path);
  let mut out = String::new();
  for component in relative.components() {
    let segment = match component {
      Component::Prefix(prefix) => prefix.as_os_str().to_string_lossy(),
      Component::RootDir => {
        out.push('/');
        continue;
      }
      Component::CurDir => continue,
      Component::ParentDir => "..".into(),
      Component::Normal(part) => part.to_string_lossy(),
    };
    if !out.is_empty() && !out.ends_with('/') {
      out.push('/');
    }
    out.push_str(&segment);
  }
  out
}

fn normalize(path: &Path) -> PathBuf {
  path
    .components()
    .filter(|component| !matches!(component, Component::CurDir))
    .collect()
}

/// Handle to a container declaration and its symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleHandle {
  pub decl: DeclId,
  pub symbol: SymbolId,
}

/// In-memory construction of a [`Program`], mostly for tests and embedders
/// that already hold their own analyzer results.
#[derive(Default)]
pub struct ProgramBuilder {
  program: Program,
}

impl ProgramBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn file(&mut self, path: impl Into<PathBuf>) -> ModuleHandle {
    self.add_file(path.into(), FileOrigin::Project, None)
  }

  pub fn lib_file(&mut self, path: impl Into<PathBuf>) -> ModuleHandle {
    self.add_file(path.into(), FileOrigin::Lib, None)
  }

  pub fn external_file(
    &mut self,
    path: impl Into<PathBuf>,
    types_package: Option<&str>,
  ) -> ModuleHandle {
    self.add_file(
      path.into(),
      FileOrigin::External,
      types_package.map(str::to_string),
    )
  }

  fn add_file(
    &mut self,
    path: PathBuf,
    origin: FileOrigin,
    types_package: Option<String>,
  ) -> ModuleHandle {
    let file = FileId(self.program.files.len() as u32);
    let symbol = self.alloc_symbol(format!("\"{}\"", path.display()), None);
    let decl = self.alloc_decl(DeclKind::SourceFile, symbol, None, file, Vec::new());
    self.program.files.push(FileData {
      path,
      origin,
      decl,
      types_package,
    });
    ModuleHandle { decl, symbol }
  }

  /// `namespace name {}` inside `parent`.
  pub fn namespace(&mut self, parent: ModuleHandle, name: &str) -> ModuleHandle {
    self.add_module(parent, name, false)
  }

  /// `declare module "name" {}` inside `parent`.
  pub fn ambient_module(&mut self, parent: ModuleHandle, name: &str) -> ModuleHandle {
    self.add_module(parent, name, true)
  }

  fn add_module(&mut self, parent: ModuleHandle, name: &str, quoted: bool) -> ModuleHandle {
    let symbol = self.alloc_symbol(name.to_string(), None);
    let file = self.program.decl(parent.decl).file;
    let decl = self.alloc_decl(
      DeclKind::Module { quoted },
      symbol,
      Some(parent.decl),
      file,
      Vec::new(),
    );
    self.program.decls[parent.decl.0 as usize].locals.push(symbol);
    ModuleHandle { decl, symbol }
  }

  pub fn declare(
    &mut self,
    parent: ModuleHandle,
    kind: DeclKind,
    name: &str,
    body: Vec<Fragment>,
  ) -> SymbolId {
    let symbol = self.alloc_symbol(name.to_string(), None);
    self.merge_declaration(symbol, parent, kind, body);
    self.program.decls[parent.decl.0 as usize].locals.push(symbol);
    symbol
  }

  /// Adds another declaration to an existing symbol (declaration merging).
  pub fn merge_declaration(
    &mut self,
    symbol: SymbolId,
    parent: ModuleHandle,
    kind: DeclKind,
    body: Vec<Fragment>,
  ) -> DeclId {
    let file = self.program.decl(parent.decl).file;
    self.alloc_decl(kind, symbol, Some(parent.decl), file, body)
  }

  pub fn export(&mut self, module: ModuleHandle, name: &str, symbol: SymbolId) {
    self.program.symbols[module.symbol.0 as usize]
      .exports
      .push(ExportEntry {
        name: name.to_string(),
        symbol,
      });
  }

  /// Import binding `local` in `module`'s scope referring to `target`.
  pub fn import(&mut self, module: ModuleHandle, local: &str, target: SymbolId) -> SymbolId {
    let symbol = self.alloc_symbol(local.to_string(), Some(target));
    self.program.decls[module.decl.0 as usize]
      .locals
      .push(symbol);
    symbol
  }

  pub fn global(&mut self, symbol: SymbolId) {
    self.program.globals.push(symbol);
  }

  /// Attaches a JSDoc tag to every declaration of `symbol`.
  pub fn tag(&mut self, symbol: SymbolId, tag: &str) {
    let decls = self.program.symbol(symbol).decls.clone();
    for decl in decls {
      self.program.decls[decl.0 as usize].tags.push(tag.to_string());
    }
  }

  pub fn build(self) -> Program {
    self.program
  }

  fn alloc_symbol(&mut self, name: String, target: Option<SymbolId>) -> SymbolId {
    let id = SymbolId(self.program.symbols.len() as u32);
    self.program.symbols.push(SymbolData {
      name,
      decls: Vec::new(),
      exports: Vec::new(),
      target,
    });
    id
  }

  fn alloc_decl(
    &mut self,
    kind: DeclKind,
    symbol: SymbolId,
    parent: Option<DeclId>,
    file: FileId,
    body: Vec<Fragment>,
  ) -> DeclId {
    let id = DeclId(self.program.decls.len() as u32);
    self.program.decls.push(DeclData {
      kind,
      symbol,
      parent,
      file,
      body,
      tags: Vec::new(),
      locals: Vec::new(),
    });
    self.program.symbols[symbol.0 as usize].decls.push(id);
    id
  }
}

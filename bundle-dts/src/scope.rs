//! Symbols visible from an entry module's declaration scope.

use crate::program::DeclId;
use crate::program::Program;
use crate::program::SymbolId;
use std::collections::BTreeSet;

/// Every project symbol visible at the scope of each declaration of
/// `entry_symbol`: the declaration's own locals, the locals of every
/// enclosing container, and program globals. Import bindings are resolved to
/// the symbols they refer to; symbols declared only in lib or external files
/// are dropped.
pub fn collect_referencing_symbols(program: &Program, entry_symbol: SymbolId) -> BTreeSet<SymbolId> {
  let mut visible = BTreeSet::new();
  for &decl in &program.symbol(entry_symbol).decls {
    let mut current: Option<DeclId> = Some(decl);
    while let Some(id) = current {
      let data = program.decl(id);
      visible.extend(data.locals.iter().copied());
      current = data.parent;
    }
  }
  visible.extend(program.globals.iter().copied());

  visible
    .into_iter()
    .filter_map(|symbol| program.resolve_alias(symbol))
    .filter(|&symbol| program.is_project_symbol(symbol))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::program::DeclKind;
  use crate::program::ProgramBuilder;

  #[test]
  fn collects_locals_imports_and_globals_from_the_project_only() {
    let mut builder = ProgramBuilder::new();
    let index = builder.file("src/index.ts");
    let other = builder.file("src/other.ts");
    let lib = builder.lib_file("lib.es5.d.ts");
    let node = builder.external_file("node_modules/@types/node/index.d.ts", Some("node"));

    let local = builder.declare(index, DeclKind::Interface, "Local", vec![]);
    let remote = builder.declare(other, DeclKind::Interface, "Remote", vec![]);
    let unrelated = builder.declare(other, DeclKind::Interface, "Unrelated", vec![]);
    builder.import(index, "Remote", remote);
    builder.import(index, "AlsoRemote", remote);
    let promise = builder.declare(lib, DeclKind::Interface, "Promise", vec![]);
    let buffer = builder.declare(node, DeclKind::Interface, "Buffer", vec![]);
    builder.import(index, "Buffer", buffer);
    builder.global(promise);
    let augmentation = builder.declare(other, DeclKind::Interface, "Window", vec![]);
    builder.global(augmentation);
    let program = builder.build();

    let visible = collect_referencing_symbols(&program, index.symbol);
    assert_eq!(
      visible.into_iter().collect::<Vec<_>>(),
      vec![local, remote, augmentation]
    );
    assert!(!collect_referencing_symbols(&program, index.symbol).contains(&unrelated));
  }

  #[test]
  fn nested_namespace_scopes_see_outer_locals() {
    let mut builder = ProgramBuilder::new();
    let index = builder.file("src/index.ts");
    let outer = builder.declare(index, DeclKind::TypeAlias, "Outer", vec![]);
    let ns = builder.namespace(index, "Inner");
    let inner = builder.declare(ns, DeclKind::TypeAlias, "Leaf", vec![]);
    let program = builder.build();

    let visible = collect_referencing_symbols(&program, ns.symbol);
    assert!(visible.contains(&outer));
    assert!(visible.contains(&inner));
    assert!(visible.contains(&ns.symbol));
  }
}

//! Names for hoisted copies of non-exported declarations.
//!
//! A generated name is a pure function of where the symbol is declared: the
//! root-relative file path plus every enclosing namespace, then the symbol's
//! own name. Two distinct declaration paths therefore produce distinct names
//! without tracking which names are already taken, and the same input always
//! produces the same name regardless of the order symbols are visited in.

use crate::program::relative_path;
use crate::program::DeclKind;
use crate::program::Program;
use crate::program::SymbolId;
use std::path::Path;

const SOURCE_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts", ".ts", ".tsx", ".mts", ".cts"];

/// Builds `_<file>_<namespace...>_<name>` for `symbol`, e.g. `_src_index_Bar`
/// for `interface Bar` declared in `src/index.ts`.
pub fn generate_unique_name(program: &Program, symbol: SymbolId, root_dir: &Path) -> String {
  let mut segments = Vec::new();
  let Some(first) = program.first_decl(symbol) else {
    return finish(vec![program.symbol(symbol).name.clone()]);
  };

  let mut current = Some(first);
  let mut own = true;
  while let Some(id) = current {
    let decl = program.decl(id);
    match decl.kind {
      DeclKind::SourceFile => {
        let path = relative_path(&program.file(decl.file).path, root_dir);
        segments.push(strip_source_extension(&path).to_string());
        break;
      }
      DeclKind::Module { quoted } => {
        segments.push(program.symbol(decl.symbol).name.clone());
        let top_level = decl
          .parent
          .is_some_and(|parent| program.decl(parent).kind == DeclKind::SourceFile);
        if quoted && top_level {
          break;
        }
      }
      _ if own => segments.push(program.symbol(decl.symbol).name.clone()),
      _ => {}
    }
    own = false;
    current = decl.parent;
  }

  segments.reverse();
  finish(segments)
}

fn finish(segments: Vec<String>) -> String {
  let joined = segments
    .iter()
    .map(|segment| sanitize_segment(segment))
    .collect::<Vec<_>>()
    .join("_");
  format!("_{joined}")
}

pub fn strip_source_extension(path: &str) -> &str {
  SOURCE_EXTENSIONS
    .iter()
    .find_map(|ext| path.strip_suffix(ext))
    .unwrap_or(path)
}

/// Path separators and `-` become `_`; quotes, `:`, `.` and `@` are dropped.
pub fn sanitize_segment(raw: &str) -> String {
  raw
    .chars()
    .filter_map(|c| match c {
      '/' | '\\' | '-' => Some('_'),
      '"' | '\'' | ':' | '.' | '@' => None,
      c => Some(c),
    })
    .collect()
}

/// Local name for `import * as <name> from "<module>"` in generated output.
pub fn import_alias_name(module: &str) -> String {
  format!("__{}", sanitize_segment(module))
}

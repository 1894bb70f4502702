//! Output statements and their printer.
//!
//! Recast produces [`Declaration`]s whose references are still entity IDs;
//! emission resolves them into printable [`Statement`]s once the whole entity
//! tree is final. Printing is a plain `fmt::Write` walk with two-space
//! indentation.

use crate::entity::EntityId;
use crate::entity::NamespaceId;
use std::fmt;

/// A body fragment whose spelling depends on the final entity tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
  Text(String),
  /// A bundled symbol.
  Entity(EntityId),
  /// An entry module referenced as a whole.
  Root(NamespaceId),
  /// A symbol that is not bundled: a global, or a member of an ambient module
  /// of a dependency.
  External {
    module: Option<String>,
    name: String,
  },
}

/// A leaf declaration rendered by recast, awaiting reference resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
  pub keyword: &'static str,
  pub name: String,
  pub body: Vec<Piece>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
  /// `declare module "name" { ... }`
  Module { name: String, body: Vec<Statement> },
  Namespace {
    exported: bool,
    name: String,
    body: Vec<Statement>,
  },
  Declaration {
    exported: bool,
    keyword: &'static str,
    name: String,
    body: String,
  },
  /// `import * as local from "specifier";`
  ImportNamespace { local: String, specifier: String },
  /// `export import name = target;`
  ImportEquals {
    exported: bool,
    name: String,
    target: String,
  },
  /// `export { import_name as export_name } from "specifier";`
  ReExport {
    specifier: String,
    import_name: String,
    export_name: String,
  },
  /// `export * as export_name from "specifier";`
  ReExportNamespace {
    specifier: String,
    export_name: String,
  },
  /// `export {};`, which stops a module body from exporting every member.
  EmptyExport,
}

pub fn print_statements<W: fmt::Write>(out: &mut W, statements: &[Statement]) -> fmt::Result {
  for stmt in statements {
    print_statement(out, stmt, 0)?;
  }
  Ok(())
}

fn indent<W: fmt::Write>(out: &mut W, depth: usize) -> fmt::Result {
  for _ in 0..depth {
    out.write_str("  ")?;
  }
  Ok(())
}

fn export_prefix<W: fmt::Write>(out: &mut W, exported: bool) -> fmt::Result {
  if exported {
    out.write_str("export ")?;
  }
  Ok(())
}

fn print_block<W: fmt::Write>(out: &mut W, body: &[Statement], depth: usize) -> fmt::Result {
  if body.is_empty() {
    return out.write_str(" {}\n");
  }
  out.write_str(" {\n")?;
  for stmt in body {
    print_statement(out, stmt, depth + 1)?;
  }
  indent(out, depth)?;
  out.write_str("}\n")
}

fn print_statement<W: fmt::Write>(out: &mut W, stmt: &Statement, depth: usize) -> fmt::Result {
  indent(out, depth)?;
  match stmt {
    Statement::Module { name, body } => {
      out.write_str("declare module ")?;
      write_string_literal(out, name)?;
      print_block(out, body, depth)
    }
    Statement::Namespace {
      exported,
      name,
      body,
    } => {
      export_prefix(out, *exported)?;
      write!(out, "namespace {name}")?;
      print_block(out, body, depth)
    }
    Statement::Declaration {
      exported,
      keyword,
      name,
      body,
    } => {
      export_prefix(out, *exported)?;
      write!(out, "{keyword} {name}")?;
      for (idx, line) in body.split('\n').enumerate() {
        if idx > 0 {
          out.write_char('\n')?;
          if !line.is_empty() {
            indent(out, depth)?;
          }
        }
        out.write_str(line)?;
      }
      out.write_char('\n')
    }
    Statement::ImportNamespace { local, specifier } => {
      write!(out, "import * as {local} from ")?;
      write_string_literal(out, specifier)?;
      out.write_str(";\n")
    }
    Statement::ImportEquals {
      exported,
      name,
      target,
    } => {
      export_prefix(out, *exported)?;
      writeln!(out, "import {name} = {target};")
    }
    Statement::ReExport {
      specifier,
      import_name,
      export_name,
    } => {
      if import_name == export_name {
        write!(out, "export {{ {import_name} }} from ")?;
      } else {
        write!(out, "export {{ {import_name} as {export_name} }} from ")?;
      }
      write_string_literal(out, specifier)?;
      out.write_str(";\n")
    }
    Statement::ReExportNamespace {
      specifier,
      export_name,
    } => {
      write!(out, "export * as {export_name} from ")?;
      write_string_literal(out, specifier)?;
      out.write_str(";\n")
    }
    Statement::EmptyExport => out.write_str("export {};\n"),
  }
}

pub fn write_string_literal<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
  out.write_char('"')?;
  for c in value.chars() {
    match c {
      '"' => out.write_str("\\\"")?,
      '\\' => out.write_str("\\\\")?,
      '\n' => out.write_str("\\n")?,
      c => out.write_char(c)?,
    }
  }
  out.write_char('"')
}

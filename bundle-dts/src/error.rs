use crate::program::SymbolId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BundleError>;

/// Failures that abort a bundling run. None of them are retryable: the
/// configuration or the input graph has to change first.
#[derive(Debug, Error)]
pub enum BundleError {
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),
  #[error("symbol `{name}` ({symbol:?}) is already bound to `{existing}`")]
  DuplicateEntity {
    symbol: SymbolId,
    name: String,
    existing: String,
  },
  #[error("name `{name}` is already declared in `{namespace}`")]
  NameCollision { name: String, namespace: String },
  #[error("export module {0} was never bound to a namespace")]
  UnboundModule(u32),
  #[error(transparent)]
  Fmt(#[from] std::fmt::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no input files configured")]
  MissingInput,
  #[error("input file `{}` is not part of the program", .0.display())]
  MissingInputFile(PathBuf),
  #[error("either `entries` or `rootModule` and `name` must be configured")]
  MissingEntries,
  #[error("entry `{name}` refers to `{module}`, which does not resolve to a module")]
  UnresolvedEntry { name: String, module: String },
  #[error("module `{entry}` matches no output group and no default `output` is configured")]
  NoOutputGroup { entry: String },
}

//! Bundler configuration.
//!
//! [`BundleConfig`] mirrors the JSON configuration file (camelCase keys).
//! Regex patterns are compiled while deserializing, and `entries` keeps the
//! key order of the JSON object because entry order decides output order.

use crate::error::ConfigError;
use crate::program::Program;
use crate::program::SymbolId;
use regex::Regex;
use serde::de::Error as _;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::Deserialize;
use serde::Deserializer;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleConfig {
  /// Files the analyzer was run on.
  pub input: Vec<PathBuf>,
  /// Root for relative module names and generated names; defaults to `.`.
  pub root_dir: Option<PathBuf>,
  /// Entry name to module identifier, in declaration order.
  #[serde(deserialize_with = "deserialize_entries")]
  pub entries: Option<Vec<(String, String)>>,
  /// Shorthand for a single entry: `{ name: rootModule }`.
  pub root_module: Option<String>,
  pub name: Option<String>,
  /// Output path for modules that match no group.
  pub output: Option<PathBuf>,
  pub groups: Vec<GroupRule>,
  /// Entry names that win ownership of symbols exported from several entries.
  pub priority: Vec<String>,
  /// Declarations carrying this JSDoc tag are never exported.
  pub private_js_doc_tag: Option<String>,
  pub non_exported_symbol_distribution: Vec<RoutingRule>,
  pub verbose: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GroupRule {
  #[serde(deserialize_with = "deserialize_regex")]
  pub test: Regex,
  pub path: PathBuf,
}

impl GroupRule {
  pub fn new(test: &str, path: impl Into<PathBuf>) -> Result<Self, regex::Error> {
    Ok(Self {
      test: Regex::new(test)?,
      path: path.into(),
    })
  }
}

/// Hosts private symbols declared in modules matching `source_module` in the
/// NE namespace of entry `target_module`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
  #[serde(deserialize_with = "deserialize_regex")]
  pub source_module: Regex,
  pub target_module: String,
}

impl RoutingRule {
  pub fn new(source_module: &str, target_module: &str) -> Result<Self, regex::Error> {
    Ok(Self {
      source_module: Regex::new(source_module)?,
      target_module: target_module.to_string(),
    })
  }
}

/// A configured entry point resolved against the program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
  pub name: String,
  pub module: String,
  pub symbol: SymbolId,
}

impl BundleConfig {
  pub fn from_json(text: &str) -> Result<BundleConfig, serde_json::Error> {
    serde_json::from_str(text)
  }

  pub fn root_dir(&self) -> &Path {
    self.root_dir.as_deref().unwrap_or(Path::new("."))
  }

  /// Validates the configuration against `program` and resolves the entries
  /// in declaration order.
  pub fn resolve(&self, program: &Program) -> Result<Vec<Entry>, ConfigError> {
    let root_dir = self.root_dir();
    if self.input.is_empty() {
      return Err(ConfigError::MissingInput);
    }
    for input in &self.input {
      if program.file_by_path(input, root_dir).is_none() {
        return Err(ConfigError::MissingInputFile(input.clone()));
      }
    }

    let configured = match (&self.entries, &self.root_module, &self.name) {
      (Some(entries), _, _) if !entries.is_empty() => entries.clone(),
      (_, Some(module), Some(name)) => vec![(name.clone(), module.clone())],
      _ => return Err(ConfigError::MissingEntries),
    };

    configured
      .into_iter()
      .map(|(name, module)| match program.resolve_module(&module, root_dir) {
        Some(symbol) => Ok(Entry {
          name,
          module,
          symbol,
        }),
        None => Err(ConfigError::UnresolvedEntry { name, module }),
      })
      .collect()
  }

  /// First group whose pattern matches `entry`, else the default output.
  pub fn output_path_for(&self, entry: &str) -> Option<&Path> {
    self
      .groups
      .iter()
      .find(|group| group.test.is_match(entry))
      .map(|group| group.path.as_path())
      .or(self.output.as_deref())
  }
}

fn deserialize_regex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Regex, D::Error> {
  let raw = String::deserialize(deserializer)?;
  Regex::new(&raw).map_err(D::Error::custom)
}

fn deserialize_entries<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<Option<Vec<(String, String)>>, D::Error> {
  struct EntriesVisitor;

  impl<'de> Visitor<'de> for EntriesVisitor {
    type Value = Vec<(String, String)>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
      f.write_str("a map of entry names to module identifiers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
      let mut entries: Vec<(String, String)> = Vec::new();
      while let Some((name, module)) = map.next_entry::<String, String>()? {
        if entries.iter().any(|(existing, _)| existing == &name) {
          return Err(A::Error::custom(format!("duplicate entry `{name}`")));
        }
        entries.push((name, module));
      }
      Ok(entries)
    }
  }

  deserializer.deserialize_map(EntriesVisitor).map(Some)
}

//! `moma.toml`: resolver settings and the prefix → directory table.

mod paths;

pub use paths::PathPolicy;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compose::DEFAULT_INITIALIZER;
use crate::diagnostic::Diagnostic;
use crate::resolve::{ManagerOptions, ModuleManager};
use crate::span::Span;

pub const CONFIG_FILE: &str = "moma.toml";

/// The `[resolver]` table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    /// Directory resource paths are relative to, itself relative to the
    /// config file.
    pub base_dir: PathBuf,
    /// Recognized resource suffixes. The first is appended to mapped names.
    pub suffixes: Vec<String>,
    pub initializer: String,
    pub auto_fetch: bool,
    /// Names requested at startup.
    pub entry: Vec<String>,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            suffixes: vec!["toml".to_string()],
            initializer: DEFAULT_INITIALIZER.to_string(),
            auto_fetch: true,
            entry: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    resolver: ResolverSection,
    #[serde(default)]
    paths: BTreeMap<String, PathBuf>,
}

/// Loaded configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the config file.
    pub root_dir: PathBuf,
    pub resolver: ResolverSection,
    pub paths: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Defaults for a project without a config file.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            resolver: ResolverSection::default(),
            paths: BTreeMap::new(),
        }
    }

    /// Load a config from a moma.toml file.
    pub fn load(path: &Path) -> Result<Config, Diagnostic> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", path.display(), e),
                Span::dummy(),
            )
        })?;
        let root_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::parse(&source, root_dir)
    }

    pub fn parse(source: &str, root_dir: impl Into<PathBuf>) -> Result<Config, Diagnostic> {
        let file: ConfigFile = toml::from_str(source).map_err(|e| {
            let span = e.span().map(Span::from_range).unwrap_or_else(Span::dummy);
            Diagnostic::error(format!("invalid {}: {}", CONFIG_FILE, e.message()), span)
                .with_help("expected a [resolver] table and a [paths] table".to_string())
        })?;

        if file.resolver.suffixes.is_empty() {
            return Err(Diagnostic::error(
                "resolver.suffixes must name at least one suffix".to_string(),
                Span::dummy(),
            )
            .with_help("the default is suffixes = [\"toml\"]".to_string()));
        }
        if file.resolver.initializer.is_empty() {
            return Err(Diagnostic::error(
                "resolver.initializer must not be empty".to_string(),
                Span::dummy(),
            ));
        }
        for prefix in file.paths.keys() {
            if !prefix.is_empty() && prefix.split('.').any(str::is_empty) {
                return Err(Diagnostic::error(
                    format!("invalid path prefix '{}'", prefix),
                    Span::dummy(),
                )
                .with_help(
                    "prefixes are dotted names like \"demo.shapes\", or \"\" for all names"
                        .to_string(),
                ));
            }
        }

        Ok(Config {
            root_dir: root_dir.into(),
            resolver: file.resolver,
            paths: file.paths,
        })
    }

    /// Try to find a moma.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root_dir.join(&self.resolver.base_dir)
    }

    pub fn path_policy(&self) -> PathPolicy {
        let mut policy =
            PathPolicy::new(self.base_dir()).with_suffixes(self.resolver.suffixes.iter().cloned());
        for (prefix, target) in &self.paths {
            policy.insert(prefix.clone(), target.clone());
        }
        policy
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            initializer: self.resolver.initializer.clone(),
            auto_fetch: self.resolver.auto_fetch,
        }
    }

    /// A fresh manager configured from this file.
    pub fn manager(&self) -> ModuleManager {
        ModuleManager::with_options(self.path_policy(), self.manager_options())
    }
}

#[cfg(test)]
mod tests;

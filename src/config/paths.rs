use std::path::{Path, PathBuf};

use tracing::warn;

/// Maps dotted module names to resource paths.
///
/// Mappings are tried longest prefix first, ties broken lexicographically:
///   "demo.shapes" = "lib/shapes"       demo.shapes.Circle → lib/shapes/Circle.toml
///   "demo"        = "lib/demo"         demo.Stage         → lib/demo/Stage.toml
///   "physics"     = "vendor/p2.toml"   physics            → vendor/p2.toml
///   ""            = "src"              app.Main           → src/app/Main.toml
///
/// A name that already ends in a recognized suffix bypasses the table: a
/// leading `/` makes it absolute, otherwise it is relative to the base
/// directory.
#[derive(Clone, Debug)]
pub struct PathPolicy {
    base_dir: PathBuf,
    suffixes: Vec<String>,
    mappings: Vec<(String, PathBuf)>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::new(".")
    }
}

impl PathPolicy {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            suffixes: vec!["toml".to_string()],
            mappings: Vec::new(),
        }
    }

    /// Replace the recognized suffixes. The first one is appended to mapped names.
    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes
            .into_iter()
            .map(|s| s.into().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn map(mut self, prefix: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.insert(prefix, target);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, target: impl Into<PathBuf>) {
        let prefix = prefix.into();
        self.mappings.retain(|(p, _)| *p != prefix);
        self.mappings.push((prefix, target.into()));
        self.mappings
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Mappings in the order they are tried.
    pub fn mappings(&self) -> &[(String, PathBuf)] {
        &self.mappings
    }

    pub fn has_resource_suffix(&self, name: &str) -> bool {
        self.suffixes.iter().any(|sfx| {
            name.len() > sfx.len() + 1
                && name.ends_with(sfx.as_str())
                && name[..name.len() - sfx.len()].ends_with('.')
        })
    }

    /// Resolve a module name (or direct resource path) to a resource path.
    /// Returns `None` when no mapping applies or the name is malformed.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if self.has_resource_suffix(name) {
            if name.starts_with('/') {
                return Some(PathBuf::from(name));
            }
            if name.split('/').any(|part| part == "..") {
                warn!(name, "rejecting resource path with parent traversal");
                return None;
            }
            return Some(self.base_dir.join(name));
        }

        let parts: Vec<&str> = name.split('.').collect();
        for part in &parts {
            if part.is_empty() || part.contains('/') || part.contains('\\') {
                warn!(name, "rejecting malformed module name");
                return None;
            }
        }

        for (prefix, target) in &self.mappings {
            let rest: &[&str] = if prefix.is_empty() {
                &parts
            } else if name == prefix {
                &[]
            } else if name.starts_with(prefix.as_str())
                && name[prefix.len()..].starts_with('.')
            {
                &parts[prefix.split('.').count()..]
            } else {
                continue;
            };

            let target = self.base_dir.join(target);
            let target_is_file = self.has_resource_suffix(&target.to_string_lossy());
            if target_is_file {
                // A file mapping only answers for its exact name.
                if rest.is_empty() {
                    return Some(target);
                }
                continue;
            }

            let mut path = target;
            for part in rest {
                path.push(part);
            }
            return Some(self.with_default_suffix(path));
        }

        None
    }

    fn with_default_suffix(&self, mut path: PathBuf) -> PathBuf {
        if let Some(sfx) = self.suffixes.first() {
            let mut file = path.file_name().unwrap_or_default().to_os_string();
            file.push(".");
            file.push(sfx);
            path.set_file_name(file);
        }
        path
    }
}

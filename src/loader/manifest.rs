//! Resource manifests.
//!
//! A resource is a TOML file holding zero or more `[[module]]` tables. Each
//! table declares one data-only module: its dependencies, base, aliases,
//! defaults and constants. A file without any table is a library that
//! registers nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::compose::{Members, SuperBinding};
use crate::diagnostic::Diagnostic;
use crate::namespace;
use crate::resolve::ModuleDescriptor;
use crate::span::Span;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(rename = "module", default)]
    modules: Vec<ModuleManifest>,
}

/// One `[[module]]` table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    pub name: String,
    #[serde(default)]
    pub requires: Vec<String>,
    pub extends: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Bind every overriding member to its super implementation.
    #[serde(default)]
    pub decorated: bool,
    /// Explicit list of members bound to their super implementation.
    /// Takes precedence over `decorated`.
    pub binds: Option<Vec<String>>,
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    #[serde(default)]
    pub constants: BTreeMap<String, Value>,
}

impl ModuleManifest {
    pub fn into_descriptor(self) -> ModuleDescriptor {
        let mut members = Members::new();
        for (field, value) in self.defaults {
            members.insert_default(field, value);
        }

        let mut descriptor = ModuleDescriptor::new(self.name)
            .requires(self.requires)
            .body(members);
        if let Some(base) = self.extends {
            descriptor = descriptor.extends(base);
        }
        for alias in self.aliases {
            descriptor = descriptor.alias(alias);
        }
        for (name, value) in self.constants {
            descriptor = descriptor.constant(name, value);
        }
        if self.decorated {
            descriptor = descriptor.decorated();
        }
        if let Some(binds) = self.binds {
            descriptor = descriptor.binding(SuperBinding::Members(binds.into_iter().collect()));
        }
        descriptor
    }
}

/// Parse a manifest. `path` is only used in messages.
pub fn parse_manifest(source: &str, path: &Path) -> Result<Vec<ModuleManifest>, Diagnostic> {
    let file: ManifestFile = toml::from_str(source).map_err(|e| {
        let span = e.span().map(Span::from_range).unwrap_or_else(Span::dummy);
        Diagnostic::error(
            format!("invalid manifest '{}': {}", path.display(), e.message()),
            span,
        )
        .with_help("each module is a [[module]] table with at least a name".to_string())
    })?;

    let mut seen = BTreeSet::new();
    for module in &file.modules {
        if let Err(e) = namespace::segments(&module.name) {
            return Err(Diagnostic::error(
                format!("invalid manifest '{}': {}", path.display(), e),
                Span::dummy(),
            ));
        }
        if !seen.insert(module.name.as_str()) {
            return Err(Diagnostic::error(
                format!(
                    "invalid manifest '{}': module '{}' declared twice",
                    path.display(),
                    module.name
                ),
                Span::dummy(),
            ));
        }
        if let Some(base) = &module.extends {
            if !module.requires.contains(base) {
                // Composing would fail on an unknown base unless something
                // else happened to register it first.
                return Err(Diagnostic::error(
                    format!(
                        "invalid manifest '{}': '{}' extends '{}' without requiring it",
                        path.display(),
                        module.name,
                        base
                    ),
                    Span::dummy(),
                )
                .with_help(format!("add \"{}\" to requires", base)));
            }
        }
    }

    Ok(file.modules)
}

//! Dotted-name namespace tree.
//!
//! Declaring a namespace (`ensure`) is separate from filling it (`assign`), so
//! code can refer to `demo.shapes.Circle` by name as soon as `demo.shapes`
//! exists, even before `Circle` itself has been bound.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::NamespaceError;

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    children: BTreeMap<String, Slot<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

/// Maps qualified names (`a.b.C`) to values, creating containers on demand.
#[derive(Debug)]
pub struct NamespaceRegistry<T> {
    root: Slot<T>,
}

impl<T> Default for NamespaceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a qualified name into segments, rejecting empty segments.
pub fn segments(name: &str) -> Result<Vec<&str>, NamespaceError> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(NamespaceError::InvalidName(name.to_string()));
    }
    Ok(parts)
}

/// `a.b.C` -> `Some("a.b")`; `C` -> `None`.
pub fn parent_name(name: &str) -> Option<&str> {
    name.rfind('.').map(|idx| &name[..idx])
}

impl<T> NamespaceRegistry<T> {
    pub fn new() -> Self {
        Self {
            root: Slot::default(),
        }
    }

    /// Create every container along `name`. Idempotent.
    pub fn ensure(&mut self, name: &str) -> Result<(), NamespaceError> {
        let parts = segments(name)?;
        let mut slot = &mut self.root;
        for part in parts {
            slot = slot.children.entry(part.to_string()).or_default();
        }
        Ok(())
    }

    /// Bind the final segment of `name`. The parent must already exist and
    /// the name must not be bound yet.
    pub fn assign(&mut self, name: &str, value: T) -> Result<(), NamespaceError> {
        let parts = segments(name)?;
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return Err(NamespaceError::InvalidName(name.to_string())),
        };

        let mut slot = &mut self.root;
        for (depth, part) in parents.iter().enumerate() {
            slot = match slot.children.get_mut(*part) {
                Some(child) => child,
                None => {
                    let missing = parents[..=depth].join(".");
                    warn!(name, missing = %missing, "namespace segment missing");
                    return Err(NamespaceError::MissingSegment {
                        name: name.to_string(),
                        missing,
                    });
                }
            };
        }
        let slot = slot.children.entry(last.to_string()).or_default();
        if slot.value.is_some() {
            warn!(name, "name already bound; keeping the existing value");
            return Err(NamespaceError::Occupied(name.to_string()));
        }
        slot.value = Some(value);
        Ok(())
    }

    /// Read-only walk. Returns the bound value, if any.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.slot(name).and_then(|slot| slot.value.as_ref())
    }

    /// True if `name` exists as a container (bound or not).
    pub fn is_namespace(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Every bound name, in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_names(&self.root, &mut String::new(), &mut out);
        out
    }

    /// Drop every binding and container.
    pub fn clear(&mut self) {
        self.root = Slot::default();
    }

    fn slot(&self, name: &str) -> Option<&Slot<T>> {
        let parts = segments(name).ok()?;
        let mut slot = &self.root;
        for part in parts {
            slot = slot.children.get(part)?;
        }
        Some(slot)
    }
}

fn collect_names<T>(slot: &Slot<T>, prefix: &mut String, out: &mut Vec<String>) {
    for (segment, child) in &slot.children {
        let len = prefix.len();
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(segment);
        if child.value.is_some() {
            out.push(prefix.clone());
        }
        collect_names(child, prefix, out);
        prefix.truncate(len);
    }
}

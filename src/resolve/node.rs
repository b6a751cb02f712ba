use super::descriptor::ModuleDescriptor;
use crate::error::ResolveError;

/// Index of a node in the manager's registration-ordered node list.
pub type NodeId = usize;

/// Per-sweep visit mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Visit {
    Unvisited,
    InProgress,
    Done(bool),
}

/// Resolver record for one registered descriptor.
#[derive(Debug)]
pub(crate) struct DependencyNode {
    pub(crate) name: String,
    /// Held until composition consumes it.
    pub(crate) descriptor: Option<ModuleDescriptor>,
    /// Declared dependency names, deduplicated. Kept after composition.
    pub(crate) requires: Vec<String>,
    /// Declared dependency names not yet linked, in declaration order.
    pub(crate) unresolved: Vec<String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) solved: bool,
    pub(crate) visit: Visit,
    /// Set once when composition is abandoned.
    pub(crate) failed: Option<ResolveError>,
}

impl DependencyNode {
    pub(crate) fn new(descriptor: ModuleDescriptor) -> Self {
        let mut requires: Vec<String> = Vec::with_capacity(descriptor.requires.len());
        for dep in &descriptor.requires {
            if !requires.contains(dep) {
                requires.push(dep.clone());
            }
        }
        Self {
            name: descriptor.name.clone(),
            descriptor: Some(descriptor),
            unresolved: requires.clone(),
            requires,
            children: Vec::new(),
            solved: false,
            visit: Visit::Unvisited,
            failed: None,
        }
    }

    /// Link `candidate` if this node is waiting on `candidate_name`.
    pub(crate) fn link(&mut self, candidate: NodeId, candidate_name: &str) -> bool {
        match self.unresolved.iter().position(|dep| dep == candidate_name) {
            Some(idx) => {
                self.unresolved.remove(idx);
                self.children.push(candidate);
                true
            }
            None => false,
        }
    }

    /// Drop `name` from the unresolved set without linking a child.
    pub(crate) fn satisfy(&mut self, name: &str) -> bool {
        let before = self.unresolved.len();
        self.unresolved.retain(|dep| dep != name);
        self.unresolved.len() != before
    }

    pub(crate) fn is_blocked(&self) -> bool {
        self.failed.is_some() || !self.unresolved.is_empty()
    }
}

use std::fmt;
use std::path::{Path, PathBuf};

use super::manager::ModuleManager;
use crate::error::LoadError;

/// What a resource waiter is told once the fetch settles.
pub type ResourceOutcome = Result<(), LoadError>;

pub type ResourceWaiter = Box<dyn FnOnce(&mut ModuleManager, &ResourceOutcome)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Pending,
    Loaded,
    Failed(LoadError),
}

impl ResourceState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResourceState::Pending)
    }

    pub(crate) fn outcome(&self) -> Option<ResourceOutcome> {
        match self {
            ResourceState::Pending => None,
            ResourceState::Loaded => Some(Ok(())),
            ResourceState::Failed(err) => Some(Err(err.clone())),
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Pending => write!(f, "pending"),
            ResourceState::Loaded => write!(f, "loaded"),
            ResourceState::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// A fetch the host should start. Emitted once per distinct path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRequest {
    pub path: PathBuf,
    pub origin: String,
}

pub(crate) struct PendingResource {
    pub(crate) path: PathBuf,
    /// Dependency names that asked for this path.
    pub(crate) origins: Vec<String>,
    pub(crate) state: ResourceState,
    pub(crate) waiters: Vec<ResourceWaiter>,
}

impl PendingResource {
    pub(crate) fn new(path: PathBuf, origin: &str) -> Self {
        Self {
            path,
            origins: vec![origin.to_string()],
            state: ResourceState::Pending,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn add_origin(&mut self, origin: &str) {
        if !self.origins.iter().any(|o| o == origin) {
            self.origins.push(origin.to_string());
        }
    }
}

/// Every resource ever requested, one record per path. Records are never
/// removed, so indices stay stable while completions run.
#[derive(Default)]
pub(crate) struct ResourceTable {
    entries: Vec<PendingResource>,
}

impl ResourceTable {
    pub(crate) fn position(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|r| r.path == path)
    }

    pub(crate) fn push(&mut self, resource: PendingResource) -> usize {
        self.entries.push(resource);
        self.entries.len() - 1
    }

    pub(crate) fn get(&self, idx: usize) -> &PendingResource {
        &self.entries[idx]
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> &mut PendingResource {
        &mut self.entries[idx]
    }

    pub(crate) fn pending(&self) -> usize {
        self.entries.iter().filter(|r| r.state.is_pending()).count()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PendingResource> {
        self.entries.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

//! Incremental dependency resolution.
//!
//! The [`ModuleManager`] owns a graph of [`ModuleDescriptor`]s keyed by
//! qualified name. Each registration links the new node in both directions
//! and sweeps the graph, composing every node whose dependencies are all
//! solved. Names nobody has registered yet are turned into resource requests;
//! their completions arrive through the manager's task queue.

mod descriptor;
mod manager;
mod node;
mod resources;
mod status;

pub use descriptor::{ModuleDescriptor, PostComposeHook, PreComposeHook};
pub use manager::{ManagerOptions, ModuleManager, Phase, ReadyListener, SolvedListener};
pub use node::NodeId;
pub use resources::{ResourceOutcome, ResourceRequest, ResourceState, ResourceWaiter};
pub use status::{DependencyGraph, NodeStatus, ResourceStatus};

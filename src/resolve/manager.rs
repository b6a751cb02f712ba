use std::collections::{BTreeSet, HashMap, VecDeque};
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::descriptor::ModuleDescriptor;
use super::node::{DependencyNode, NodeId, Visit};
use super::resources::{
    PendingResource, ResourceOutcome, ResourceRequest, ResourceState, ResourceTable,
    ResourceWaiter,
};
use super::status::{DependencyGraph, NodeStatus, ResourceStatus};
use crate::compose::{ComposedType, Instance, TypeComposer, DEFAULT_INITIALIZER};
use crate::config::PathPolicy;
use crate::error::{CallError, LoadError, NamespaceError, ResolveError};
use crate::namespace::{self, NamespaceRegistry};

pub type SolvedListener = Box<dyn FnOnce(&mut ModuleManager, &Rc<ComposedType>)>;
pub type ReadyListener = Box<dyn FnOnce(&mut ModuleManager)>;

/// Where the manager sits in its resolution cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing registered or everything settled and announced.
    Idle,
    /// At least one node is unsolved or one resource is outstanding.
    Resolving,
    /// Everything settled; ready listeners are firing.
    Quiescent,
}

/// One turn of the manager's task queue.
enum Task {
    CheckReady,
    Sweep,
    ResourceDone {
        path: PathBuf,
        outcome: Result<Vec<ModuleDescriptor>, LoadError>,
    },
    Notify {
        path: PathBuf,
        waiter: ResourceWaiter,
    },
}

#[derive(Clone, Debug)]
pub struct ManagerOptions {
    /// Name of the designated initializer member.
    pub initializer: String,
    /// Request a resource for every dependency name without a node.
    pub auto_fetch: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            initializer: DEFAULT_INITIALIZER.to_string(),
            auto_fetch: true,
        }
    }
}

/// An owned resolution context.
///
/// Descriptors go in through [`register`](Self::register). Every registration
/// links the new node against the graph in both directions and runs a sweep
/// that composes whatever became solvable. Missing names turn into
/// [`ResourceRequest`]s for the host to fetch; the host hands results back
/// with [`complete_resource`](Self::complete_resource) and turns the crank
/// with [`run_pending`](Self::run_pending).
///
/// Nothing here is raised back to the registering caller. A module that can
/// never be composed simply stays unsolved; [`dump_status`](Self::dump_status)
/// and [`diagnostics`](Self::diagnostics) say why.
pub struct ModuleManager {
    composer: TypeComposer,
    paths: PathPolicy,
    auto_fetch: bool,
    types: NamespaceRegistry<Rc<ComposedType>>,

    nodes: Vec<DependencyNode>,
    index: HashMap<String, NodeId>,
    resources: ResourceTable,
    requests: VecDeque<ResourceRequest>,

    tasks: VecDeque<Task>,
    ready_check_queued: bool,
    solve_listeners: HashMap<String, Vec<SolvedListener>>,
    ready_listeners: Vec<ReadyListener>,

    solved_order: Vec<String>,
    diagnostics: Vec<ResolveError>,
    reported_cycles: BTreeSet<Vec<String>>,

    /// Registrations that arrived while a sweep was running.
    deferred: VecDeque<ModuleDescriptor>,
    sweeping: bool,
    phase: Phase,
}

impl ModuleManager {
    pub fn new(paths: PathPolicy) -> Self {
        Self::with_options(paths, ManagerOptions::default())
    }

    pub fn with_options(paths: PathPolicy, options: ManagerOptions) -> Self {
        Self {
            composer: TypeComposer::with_initializer(options.initializer),
            paths,
            auto_fetch: options.auto_fetch,
            types: NamespaceRegistry::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
            resources: ResourceTable::default(),
            requests: VecDeque::new(),
            tasks: VecDeque::new(),
            ready_check_queued: false,
            solve_listeners: HashMap::new(),
            ready_listeners: Vec::new(),
            solved_order: Vec::new(),
            diagnostics: Vec::new(),
            reported_cycles: BTreeSet::new(),
            deferred: VecDeque::new(),
            sweeping: false,
            phase: Phase::Idle,
        }
    }

    // ── Registration ──────────────────────────────────────────────

    /// Submit a descriptor. A name that is already known is ignored.
    pub fn register(&mut self, descriptor: ModuleDescriptor) {
        if self.sweeping {
            debug!(name = %descriptor.name, "registration deferred until sweep ends");
            self.deferred.push_back(descriptor);
            return;
        }
        if let Some(id) = self.accept(descriptor) {
            self.fetch_missing(id);
            self.sweep();
        }
    }

    /// Create and link a node. Returns `None` if nothing was added.
    fn accept(&mut self, mut descriptor: ModuleDescriptor) -> Option<NodeId> {
        if self.index.contains_key(&descriptor.name) {
            debug!(name = %descriptor.name, "duplicate registration ignored");
            return None;
        }
        if let Err(source) = namespace::segments(&descriptor.name) {
            warn!(name = %descriptor.name, error = %source, "rejecting descriptor");
            self.diagnostics.push(ResolveError::Namespace {
                name: descriptor.name,
                source,
            });
            return None;
        }

        if let Some(hook) = descriptor.pre_compose.take() {
            hook(&descriptor.name);
        }

        let id = self.nodes.len();
        let name = descriptor.name.clone();
        let mut node = DependencyNode::new(descriptor);
        for (other_id, other) in self.nodes.iter().enumerate() {
            node.link(other_id, &other.name);
        }
        node.link(id, &name);
        for other in &mut self.nodes {
            other.link(id, &name);
        }

        info!(
            name = %name,
            unresolved = node.unresolved.len(),
            "registered module"
        );
        self.index.insert(name, id);
        self.nodes.push(node);
        self.phase = Phase::Resolving;
        Some(id)
    }

    /// Request resources for whatever `id` still waits on.
    fn fetch_missing(&mut self, id: NodeId) {
        if !self.auto_fetch {
            return;
        }
        let missing = self.nodes[id].unresolved.clone();
        for dep in missing {
            self.request_resource(&dep, None);
        }
    }

    // ── Resources ─────────────────────────────────────────────────

    /// Ask for the resource that should provide `name`. `name` may also be a
    /// path carrying a recognized suffix.
    ///
    /// At most one request per resolved path is ever emitted. A waiter on an
    /// outstanding path joins the existing record; a waiter on a settled path
    /// is told the stored outcome on the next turn. Returns the resolved path,
    /// or `None` if no mapping applies.
    pub fn request_resource(&mut self, name: &str, waiter: Option<ResourceWaiter>) -> Option<PathBuf> {
        let Some(path) = self.paths.resolve(name) else {
            debug!(name, "no path mapping; nothing to fetch");
            return None;
        };

        let Some(idx) = self.resources.position(&path) else {
            let mut record = PendingResource::new(path.clone(), name);
            record.waiters.extend(waiter);
            self.resources.push(record);
            self.requests.push_back(ResourceRequest {
                path: path.clone(),
                origin: name.to_string(),
            });
            self.phase = Phase::Resolving;
            info!(name, path = %path.display(), "requesting resource");
            return Some(path);
        };

        let record = self.resources.get_mut(idx);
        record.add_origin(name);
        let settled = record.state.clone();
        match settled {
            ResourceState::Pending => {
                record.waiters.extend(waiter);
                debug!(name, path = %path.display(), "joined outstanding request");
            }
            ResourceState::Loaded | ResourceState::Failed(_) => {
                debug!(name, path = %path.display(), "resource already processed");
                if settled == ResourceState::Loaded && !self.index.contains_key(name) {
                    self.satisfy_name(name);
                    self.tasks.push_back(Task::Sweep);
                }
                if let Some(waiter) = waiter {
                    self.tasks.push_back(Task::Notify {
                        path: path.clone(),
                        waiter,
                    });
                }
            }
        }
        Some(path)
    }

    /// Fetches the host has not started yet, in request order.
    pub fn take_requests(&mut self) -> Vec<ResourceRequest> {
        self.requests.drain(..).collect()
    }

    /// Queue the result of a fetch. Handled on the next turn.
    pub fn complete_resource(
        &mut self,
        path: impl Into<PathBuf>,
        outcome: Result<Vec<ModuleDescriptor>, LoadError>,
    ) {
        self.tasks.push_back(Task::ResourceDone {
            path: path.into(),
            outcome,
        });
    }

    fn finish_resource(&mut self, path: PathBuf, outcome: Result<Vec<ModuleDescriptor>, LoadError>) {
        let Some(idx) = self.resources.position(&path) else {
            warn!(path = %path.display(), "completion for a resource nobody requested");
            return;
        };
        if !self.resources.get(idx).state.is_pending() {
            debug!(path = %path.display(), "repeated completion ignored");
            return;
        }

        let state = match outcome {
            Ok(descriptors) => {
                info!(
                    path = %path.display(),
                    modules = descriptors.len(),
                    "resource loaded"
                );
                // Siblings in one resource may satisfy each other, so link
                // them all before asking for anything else.
                let added: Vec<NodeId> = descriptors
                    .into_iter()
                    .filter_map(|d| self.accept(d))
                    .collect();
                for id in added {
                    self.fetch_missing(id);
                }
                let origins = self.resources.get(idx).origins.clone();
                for origin in &origins {
                    if !self.index.contains_key(origin) {
                        self.satisfy_name(origin);
                    }
                }
                ResourceState::Loaded
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "resource failed");
                for origin in &self.resources.get(idx).origins {
                    self.diagnostics.push(ResolveError::ResourceFailed {
                        origin: origin.clone(),
                        source: err.clone(),
                    });
                }
                ResourceState::Failed(err)
            }
        };

        let result: ResourceOutcome = match &state {
            ResourceState::Failed(err) => Err(err.clone()),
            _ => Ok(()),
        };
        let record = self.resources.get_mut(idx);
        record.state = state;
        let waiters = mem::take(&mut record.waiters);

        self.sweep();
        for waiter in waiters {
            waiter(self, &result);
        }
        self.schedule_ready_check();
    }

    /// Drop `name` from every waiting node: a resource finished without
    /// registering a module by that name.
    pub fn mark_resource_satisfied(&mut self, name: &str) {
        if self.satisfy_name(name) > 0 {
            if self.sweeping {
                self.tasks.push_back(Task::Sweep);
            } else {
                self.sweep();
            }
        }
    }

    fn satisfy_name(&mut self, name: &str) -> usize {
        let mut count = 0;
        for node in &mut self.nodes {
            if !node.solved && node.satisfy(name) {
                count += 1;
            }
        }
        if count > 0 {
            debug!(name, nodes = count, "name satisfied by library resource");
        }
        count
    }

    // ── Sweep ─────────────────────────────────────────────────────

    fn sweep(&mut self) {
        loop {
            self.sweeping = true;
            for node in &mut self.nodes {
                node.visit = Visit::Unvisited;
            }
            let mut stack = Vec::new();
            for id in 0..self.nodes.len() {
                self.try_solve(id, &mut stack);
            }
            self.sweeping = false;

            let mut accepted = false;
            while let Some(descriptor) = self.deferred.pop_front() {
                if let Some(id) = self.accept(descriptor) {
                    self.fetch_missing(id);
                    accepted = true;
                }
            }
            if !accepted {
                break;
            }
        }
    }

    fn try_solve(&mut self, id: NodeId, stack: &mut Vec<NodeId>) -> bool {
        match self.nodes[id].visit {
            Visit::Done(solved) => return solved,
            Visit::InProgress => {
                self.report_cycle(id, stack);
                return false;
            }
            Visit::Unvisited => {}
        }

        let node = &mut self.nodes[id];
        if node.solved {
            node.visit = Visit::Done(true);
            return true;
        }
        if node.is_blocked() {
            node.visit = Visit::Done(false);
            return false;
        }

        node.visit = Visit::InProgress;
        let children = node.children.clone();
        stack.push(id);
        let mut ready = true;
        for child in children {
            if !self.try_solve(child, stack) {
                ready = false;
            }
        }
        stack.pop();

        let solved = ready && self.solve(id);
        self.nodes[id].visit = Visit::Done(solved);
        solved
    }

    fn report_cycle(&mut self, id: NodeId, stack: &[NodeId]) {
        let start = stack.iter().position(|&n| n == id).unwrap_or(0);
        let mut cycle: Vec<String> = stack[start..]
            .iter()
            .map(|&n| self.nodes[n].name.clone())
            .collect();

        // Same cycle entered from a different node is the same cycle.
        let mut key = cycle.clone();
        if let Some(min) = key
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(i, _)| i)
        {
            key.rotate_left(min);
        }
        if !self.reported_cycles.insert(key) {
            return;
        }

        cycle.push(self.nodes[id].name.clone());
        error!(cycle = %cycle.join(" -> "), "circular dependency");
        self.diagnostics.push(ResolveError::CycleDetected { cycle });
    }

    fn solve(&mut self, id: NodeId) -> bool {
        let Some(descriptor) = self.nodes[id].descriptor.take() else {
            return false;
        };
        let name = descriptor.name.clone();
        let (composition, post_compose) = descriptor.into_composition();

        let ty = match self.composer.compose(composition, &self.types) {
            Ok(ty) => ty,
            Err(source) => {
                error!(name = %name, error = %source, "abandoning composition");
                self.fail(id, ResolveError::Compose { name, source });
                return false;
            }
        };
        if let Err(source) = self.bind(&name, &ty) {
            error!(name = %name, error = %source, "cannot bind composed type");
            self.fail(id, ResolveError::Namespace { name, source });
            return false;
        }
        for alias in ty.aliases() {
            if let Err(source) = self.bind(alias, &ty) {
                warn!(name = %name, alias = %alias, error = %source, "alias not bound");
                self.diagnostics.push(ResolveError::Namespace {
                    name: alias.clone(),
                    source,
                });
            }
        }

        self.nodes[id].solved = true;
        self.solved_order.push(name.clone());
        info!(name = %name, order = self.solved_order.len(), "module solved");

        if let Some(hook) = post_compose {
            hook(&ty);
        }
        if let Some(listeners) = self.solve_listeners.remove(&name) {
            for listener in listeners {
                listener(self, &ty);
            }
        }
        self.schedule_ready_check();
        true
    }

    fn fail(&mut self, id: NodeId, err: ResolveError) {
        self.nodes[id].failed = Some(err.clone());
        self.diagnostics.push(err);
    }

    fn bind(&mut self, name: &str, ty: &Rc<ComposedType>) -> Result<(), NamespaceError> {
        if let Some(parent) = namespace::parent_name(name) {
            self.types.ensure(parent)?;
        }
        self.types.assign(name, Rc::clone(ty))
    }

    // ── Listeners & readiness ─────────────────────────────────────

    /// Call `listener` once when `name` solves. Returns false, and drops the
    /// listener, if `name` is already solved.
    pub fn add_solved_listener<F>(&mut self, name: &str, listener: F) -> bool
    where
        F: FnOnce(&mut ModuleManager, &Rc<ComposedType>) + 'static,
    {
        if self.is_solved(name) {
            debug!(name, "solved listener added after the fact; ignored");
            return false;
        }
        self.solve_listeners
            .entry(name.to_string())
            .or_default()
            .push(Box::new(listener));
        true
    }

    /// Call `listener` once, the next time every node is solved and every
    /// resource has finished.
    pub fn on_ready<F>(&mut self, listener: F)
    where
        F: FnOnce(&mut ModuleManager) + 'static,
    {
        self.ready_listeners.push(Box::new(listener));
        self.schedule_ready_check();
    }

    fn schedule_ready_check(&mut self) {
        if !self.ready_check_queued {
            self.ready_check_queued = true;
            self.tasks.push_back(Task::CheckReady);
        }
    }

    fn check_ready(&mut self) {
        let unsolved = self.nodes.iter().filter(|n| !n.solved).count();
        let pending = self.resources.pending();
        if unsolved > 0 || pending > 0 || !self.deferred.is_empty() {
            debug!(unsolved, pending, "not quiescent yet");
            return;
        }

        self.phase = Phase::Quiescent;
        let listeners = mem::take(&mut self.ready_listeners);
        info!(
            modules = self.nodes.len(),
            listeners = listeners.len(),
            "module graph ready"
        );
        for listener in listeners {
            listener(self);
        }
        if self.phase == Phase::Quiescent {
            self.phase = Phase::Idle;
        }
    }

    // ── Task queue ────────────────────────────────────────────────

    /// Run queued tasks until the queue is empty. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        if self.sweeping {
            return 0;
        }
        let mut ran = 0;
        while let Some(task) = self.tasks.pop_front() {
            self.run_task(task);
            ran += 1;
        }
        ran
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::CheckReady => {
                self.ready_check_queued = false;
                self.check_ready();
            }
            Task::Sweep => self.sweep(),
            Task::ResourceDone { path, outcome } => self.finish_resource(path, outcome),
            Task::Notify { path, waiter } => {
                let outcome = self
                    .resources
                    .position(&path)
                    .and_then(|idx| self.resources.get(idx).state.outcome());
                if let Some(outcome) = outcome {
                    waiter(self, &outcome);
                }
            }
        }
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    // ── Introspection ─────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn paths(&self) -> &PathPolicy {
        &self.paths
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn is_solved(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&id| self.nodes[id].solved)
    }

    /// Names in the order they were composed.
    pub fn solved_order(&self) -> &[String] {
        &self.solved_order
    }

    /// Unsolved names, in registration order.
    pub fn unsolved(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| !n.solved)
            .map(|n| n.name.clone())
            .collect()
    }

    pub fn dump_status(&self) -> Vec<NodeStatus> {
        self.nodes
            .iter()
            .map(|node| NodeStatus {
                name: node.name.clone(),
                unresolved: node.unresolved.clone(),
                solved: node.solved,
                failed: node.failed.as_ref().map(|e| e.to_string()),
            })
            .collect()
    }

    pub fn resources(&self) -> Vec<ResourceStatus> {
        self.resources
            .iter()
            .map(|r| ResourceStatus {
                path: r.path.clone(),
                origins: r.origins.clone(),
                state: r.state.clone(),
            })
            .collect()
    }

    pub fn pending_resources(&self) -> usize {
        self.resources.pending()
    }

    pub fn resource_state(&self, path: &Path) -> Option<&ResourceState> {
        self.resources
            .position(path)
            .map(|idx| &self.resources.get(idx).state)
    }

    pub fn diagnostics(&self) -> &[ResolveError] {
        &self.diagnostics
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(
            self.nodes
                .iter()
                .map(|n| (n.name.as_str(), n.requires.as_slice())),
        )
    }

    pub fn cycles(&self) -> Vec<Vec<String>> {
        self.dependency_graph().cycles()
    }

    pub fn types(&self) -> &NamespaceRegistry<Rc<ComposedType>> {
        &self.types
    }

    pub fn lookup(&self, name: &str) -> Option<&Rc<ComposedType>> {
        self.types.lookup(name)
    }

    /// Create an instance of the type registered as `name`.
    pub fn instantiate(&self, name: &str, args: &[Value]) -> Result<Instance, CallError> {
        match self.types.lookup(name) {
            Some(ty) => ty.instantiate(args),
            None => Err(CallError::failed(format!("no type named '{}'", name))),
        }
    }

    /// Tear the context down, returning whatever never solved.
    pub fn shutdown(mut self) -> Vec<NodeStatus> {
        let stuck: Vec<NodeStatus> = self
            .dump_status()
            .into_iter()
            .filter(|s| !s.solved)
            .collect();
        for status in &stuck {
            warn!(%status, "module never solved");
        }
        self.tasks.clear();
        self.solve_listeners.clear();
        self.ready_listeners.clear();
        self.resources.clear();
        self.types.clear();
        debug!(modules = self.nodes.len(), "module manager shut down");
        stuck
    }
}

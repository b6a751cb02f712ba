use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use super::resources::ResourceState;

/// Snapshot of one node, as reported by `dump_status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    pub name: String,
    pub unresolved: Vec<String>,
    pub solved: bool,
    /// Why composition was abandoned, if it was.
    pub failed: Option<String>,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.solved {
            return write!(f, "{} solved", self.name);
        }
        write!(f, "{} waiting", self.name)?;
        if !self.unresolved.is_empty() {
            write!(f, " on [{}]", self.unresolved.join(", "))?;
        }
        if let Some(reason) = &self.failed {
            write!(f, " (failed: {})", reason)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceStatus {
    pub path: PathBuf,
    pub origins: Vec<String>,
    pub state: ResourceState,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for [{}] {}",
            self.path.display(),
            self.origins.join(", "),
            self.state
        )
    }
}

/// Dependency graph over declared names. Edges point from a module to each
/// name it requires; required names that were never registered appear as
/// plain vertices.
pub struct DependencyGraph {
    pub graph: DiGraph<String, ()>,
    pub indices: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub(crate) fn build<'a, I>(modules: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut graph = DiGraph::new();
        let mut indices: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let mut edges = Vec::new();

        for (name, requires) in modules {
            let from = vertex(&mut graph, &mut indices, name);
            for dep in requires {
                edges.push((from, dep.clone()));
            }
        }
        for (from, dep) in edges {
            let to = vertex(&mut graph, &mut indices, &dep);
            graph.update_edge(from, to, ());
        }

        Self { graph, indices }
    }

    /// Groups of names that require each other, each sorted, self-loops
    /// included.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut out: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.into_iter().map(|ix| self.graph[ix].clone()).collect();
                names.sort();
                names
            })
            .collect();
        out.sort();
        out
    }

    /// Names nothing registered ever provided.
    pub fn dangling(&self, registered: impl Fn(&str) -> bool) -> Vec<String> {
        self.indices
            .keys()
            .filter(|name| !registered(name))
            .cloned()
            .collect()
    }
}

fn vertex(
    graph: &mut DiGraph<String, ()>,
    indices: &mut BTreeMap<String, NodeIndex>,
    name: &str,
) -> NodeIndex {
    if let Some(ix) = indices.get(name) {
        return *ix;
    }
    let ix = graph.add_node(name.to_string());
    indices.insert(name.to_string(), ix);
    ix
}

// ABOUTME: Dependency graph construction and wave partitioning
// ABOUTME: Validates reference integrity and acyclicity, emits ordered execution waves

use indexmap::IndexMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::collections::{HashMap, HashSet, VecDeque};

use super::error::CompileIssue;
use crate::parser::StepConfig;

/// Directed dependency graph over a workflow's steps. Edges run from a
/// dependency to its dependent. Pure: built once from the step map,
/// never mutated.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: Graph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph, collecting every unknown-dependency reference
    /// instead of stopping at the first.
    pub fn from_steps(
        steps: &IndexMap<String, StepConfig>,
    ) -> Result<Self, Vec<CompileIssue>> {
        let mut graph = Graph::new();
        let mut indices = HashMap::new();
        let mut order = Vec::with_capacity(steps.len());

        for name in steps.keys() {
            let node = graph.add_node(name.clone());
            indices.insert(name.clone(), node);
            order.push(name.clone());
        }

        let mut issues = Vec::new();
        for (name, step) in steps {
            let step_node = indices[name];
            for dependency in &step.depends {
                match indices.get(dependency) {
                    Some(&dep_node) => {
                        graph.add_edge(dep_node, step_node, ());
                    }
                    None => issues.push(CompileIssue::UnknownDependency {
                        step: name.clone(),
                        dependency: dependency.clone(),
                    }),
                }
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(Self {
            graph,
            indices,
            order,
        })
    }

    /// Partition the graph into ordered waves: wave 0 holds the steps
    /// with no dependencies, wave k the steps whose dependencies all sit
    /// in earlier waves. Deterministic: definition order within a wave.
    pub fn waves(&self) -> Result<Vec<Vec<String>>, Vec<CompileIssue>> {
        if let Err(cycle) = toposort(&self.graph, None) {
            let steps = self.cycle_members(cycle.node_id());
            return Err(vec![CompileIssue::CyclicDependency { steps }]);
        }

        let mut waves = Vec::new();
        let mut done: HashSet<NodeIndex> = HashSet::new();
        let mut remaining: Vec<String> = self.order.clone();

        while !remaining.is_empty() {
            let mut wave = Vec::new();
            for name in &remaining {
                let node = self.indices[name];
                let ready = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .all(|dep| done.contains(&dep));
                if ready {
                    wave.push(name.clone());
                }
            }

            // Cannot happen once toposort succeeded
            if wave.is_empty() {
                break;
            }

            for name in &wave {
                done.insert(self.indices[name]);
            }
            remaining.retain(|name| !done.contains(&self.indices[name]));
            waves.push(wave);
        }

        Ok(waves)
    }

    /// Name the cycle the offending node belongs to: its strongly
    /// connected component, in definition order.
    fn cycle_members(&self, node: NodeIndex) -> Vec<String> {
        for component in tarjan_scc(&self.graph) {
            if component.contains(&node) {
                let members: HashSet<&str> = component
                    .iter()
                    .map(|&idx| self.graph[idx].as_str())
                    .collect();
                return self
                    .order
                    .iter()
                    .filter(|name| members.contains(name.as_str()))
                    .cloned()
                    .collect();
            }
        }
        vec![self.graph[node].clone()]
    }

    /// Steps that directly depend on the given step
    pub fn dependents(&self, name: &str) -> Vec<String> {
        match self.indices.get(name) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every step downstream of the given step, directly or transitively
    pub fn transitive_dependents(&self, name: &str) -> HashSet<String> {
        let mut found = HashSet::new();
        let Some(&start) = self.indices.get(name) else {
            return found;
        };

        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    found.insert(self.graph[next].clone());
                    queue.push_back(next);
                }
            }
        }
        found
    }
}

/// Convenience for computing skip propagation from a compiled manifest's
/// step map without rebuilding validation state.
pub fn transitive_dependents_of(
    depends: &IndexMap<String, Vec<String>>,
    name: &str,
) -> HashSet<String> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (step, deps) in depends {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(step);
        }
    }

    let mut found = HashSet::new();
    let mut queue = VecDeque::from([name]);
    while let Some(current) = queue.pop_front() {
        if let Some(children) = dependents.get(current) {
            for &child in children {
                if found.insert(child.to_string()) {
                    queue.push_back(child);
                }
            }
        }
    }
    found
}

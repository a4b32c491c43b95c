//! Plugin dependency graph with Kahn's algorithm for topological sorting
//!
//! Built when the resolver initializes, from every plugin's dependencies and
//! fail-over link, to:
//! 1. Reject references to unknown plugins
//! 2. Reject duplicate plugin ids across definitions and connectors
//! 3. Detect circular dependencies
//! 4. Provide a deterministic evaluation order (dependencies first)

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

/// Graph-related errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Circular dependency detected in the plugin graph
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// Plugin id is used more than once
    #[error("Duplicate resolver plugin id: {0}")]
    DuplicatePlugin(String),

    /// A dependency names a plugin that does not exist
    #[error("Resolver plugin '{referenced_by}' depends on unknown plugin '{plugin_id}'")]
    UnknownPlugin { plugin_id: String, referenced_by: String },
}

/// Graph node representing a plugin and the plugins it depends on
#[derive(Debug, Clone)]
struct GraphNode {
    dependencies: BTreeSet<String>,
}

/// Dependency graph over resolver plugins
///
/// # Example
///
/// ```
/// use idp_attribute_resolver::graph::DependencyGraphBuilder;
///
/// let mut builder = DependencyGraphBuilder::new();
/// builder.add_plugin("ldap", Vec::<String>::new()).unwrap();
/// builder.add_plugin("mail", ["ldap"]).unwrap();
///
/// let graph = builder.build().unwrap();
/// assert_eq!(graph.resolve_order().unwrap(), vec!["ldap", "mail"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plugins in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a plugin
    pub fn dependencies_of(&self, plugin_id: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(plugin_id).map(|node| &node.dependencies)
    }

    /// Resolve the evaluation order using Kahn's algorithm
    ///
    /// Returns plugin ids with every plugin after the plugins it depends on.
    /// Ties are broken by id so the order is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns an error if a circular dependency is detected.
    pub fn resolve_order(&self) -> Result<Vec<String>, GraphError> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        // Reverse edges (who depends on me) and in-degrees
        let mut reverse_edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

        for name in self.nodes.keys() {
            reverse_edges.insert(name, Vec::new());
            in_degree.insert(name, 0);
        }

        for (name, node) in &self.nodes {
            for dep in &node.dependencies {
                if let Some(edges) = reverse_edges.get_mut(dep.as_str()) {
                    edges.push(name);
                }
                if let Some(degree) = in_degree.get_mut(name.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());

        while let Some(current) = queue.pop_front() {
            sorted.push(current.to_string());

            if let Some(dependents) = reverse_edges.get(current) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            self.detect_cycles()?;
            return Err(GraphError::CircularDependency(
                "Unknown cycle detected".to_string(),
            ));
        }

        Ok(sorted)
    }

    /// Fail with the first cycle found by depth-first search
    ///
    /// White (unvisited) / gray (on the DFS stack) / black (done); reaching a
    /// gray node closes a cycle.
    pub fn detect_cycles(&self) -> Result<(), GraphError> {
        let mut state: BTreeMap<&str, u8> = self.nodes.keys().map(|name| (name.as_str(), 0)).collect();

        for start in self.nodes.keys() {
            if state.get(start.as_str()) == Some(&0) {
                let mut path = Vec::new();
                self.dfs_cycle_detect(start, &mut state, &mut path)?;
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect<'a>(
        &'a self,
        node: &'a str,
        state: &mut BTreeMap<&'a str, u8>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), GraphError> {
        match state.get(node) {
            Some(1) => {
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(node);
                return Err(GraphError::CircularDependency(cycle.join(" -> ")));
            }
            Some(2) => return Ok(()),
            _ => {}
        }

        state.insert(node, 1);
        path.push(node);

        if let Some(graph_node) = self.nodes.get(node) {
            for dep in &graph_node.dependencies {
                self.dfs_cycle_detect(dep, state, path)?;
            }
        }

        state.insert(node, 2);
        path.pop();

        Ok(())
    }
}

/// Collects plugins and their dependencies, then validates the graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphBuilder {
    plugins: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraphBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin and the ids of the plugins it depends on
    pub fn add_plugin<I, S>(&mut self, plugin_id: &str, dependencies: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.plugins.contains_key(plugin_id) {
            return Err(GraphError::DuplicatePlugin(plugin_id.to_string()));
        }
        self.plugins.insert(
            plugin_id.to_string(),
            dependencies.into_iter().map(Into::into).collect(),
        );
        Ok(())
    }

    /// Build the graph, rejecting unknown references and cycles
    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        for (plugin_id, dependencies) in &self.plugins {
            if let Some(unknown) = dependencies.iter().find(|dep| !self.plugins.contains_key(*dep)) {
                return Err(GraphError::UnknownPlugin {
                    plugin_id: unknown.clone(),
                    referenced_by: plugin_id.clone(),
                });
            }
        }

        let graph = DependencyGraph {
            nodes: self
                .plugins
                .into_iter()
                .map(|(id, dependencies)| (id, GraphNode { dependencies }))
                .collect(),
        };

        graph.detect_cycles()?;

        Ok(graph)
    }
}

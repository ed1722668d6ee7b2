//! Per-document registry of addressable entities.
//!
//! Populated by a read-only walk over a normalized document. Each node
//! records where the entity is defined (if anywhere), every pointer path
//! that references it and, for models, its direct parents. Inheritance
//! edges are mirrored into a petgraph `DiGraph` (child -> parent) so cycles
//! can be grouped into strongly connected components.

use crate::spec::pointer::parse_pointer;
use crate::validation::EntityKind;
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// One addressable schema, parameter, response or security entity
#[derive(Debug, Clone)]
pub struct DefinitionNode {
    /// Canonical pointer, e.g. `#/definitions/Pet`
    pub path: String,
    pub kind: EntityKind,
    /// Where the entity is declared; `None` when it was only referenced
    pub location: Option<Vec<String>>,
    /// Pointer paths of every reference to this entity
    pub references: Vec<Vec<String>>,
    /// Direct parents (models only)
    pub parents: Vec<String>,
    /// Root-first ancestors, computed once
    pub lineage: Option<Vec<String>>,
    pub cyclical: bool,
    /// The loop found while computing lineage, starting and ending at this node
    pub cycle: Option<Vec<String>>,
}

impl DefinitionNode {
    fn new(path: &str, kind: EntityKind) -> Self {
        Self {
            path: path.to_string(),
            kind,
            location: None,
            references: Vec::new(),
            parents: Vec::new(),
            lineage: None,
            cyclical: false,
            cycle: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.location.is_some()
    }

    /// Last pointer segment (model name, parameter name, ...)
    pub fn name(&self) -> String {
        parse_pointer(&self.path).pop().unwrap_or_default()
    }

    /// Ancestors, empty until lineage has been computed
    pub fn lineage(&self) -> &[String] {
        self.lineage.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    nodes: IndexMap<String, DefinitionNode>,
    graph: DiGraph<String, ()>,
    graph_index: HashMap<String, NodeIndex>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `path`, creating it with no references if needed
    pub fn track(&mut self, path: &str, kind: EntityKind) -> &mut DefinitionNode {
        self.nodes
            .entry(path.to_string())
            .or_insert_with(|| DefinitionNode::new(path, kind))
    }

    /// Track an entity that is declared at `location`
    pub fn define(&mut self, path: &str, kind: EntityKind, location: Vec<String>) {
        let node = self.track(path, kind);
        if node.location.is_none() {
            node.location = Some(location);
        }
    }

    /// Record a reference from `from` to `path`
    pub fn reference(&mut self, path: &str, kind: EntityKind, from: Vec<String>) {
        self.track(path, kind).references.push(from);
    }

    /// Record that `child` inherits from `parent`
    pub fn add_parent(&mut self, child: &str, parent: &str, kind: EntityKind) {
        let node = self.track(child, kind);
        if node.parents.iter().any(|p| p == parent) {
            return;
        }
        node.parents.push(parent.to_string());
        self.track(parent, kind);

        let child_index = self.graph_node(child);
        let parent_index = self.graph_node(parent);
        self.graph.add_edge(child_index, parent_index, ());
    }

    fn graph_node(&mut self, path: &str) -> NodeIndex {
        if let Some(index) = self.graph_index.get(path) {
            return *index;
        }
        let index = self.graph.add_node(path.to_string());
        self.graph_index.insert(path.to_string(), index);
        index
    }

    pub fn get(&self, path: &str) -> Option<&DefinitionNode> {
        self.nodes.get(path)
    }

    /// Nodes in the order they were first tracked
    pub fn nodes(&self) -> impl Iterator<Item = &DefinitionNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compute (once) the root-first ancestor chain of a node.
    ///
    /// Parents are walked depth-first. Revisiting the starting node marks it
    /// cyclical and the walk stops at the repetition.
    pub fn compute_lineage(&mut self, path: &str) -> Vec<String> {
        if let Some(lineage) = self.nodes.get(path).and_then(|n| n.lineage.clone()) {
            return lineage;
        }

        let mut lineage = Vec::new();
        let mut stack = vec![path.to_string()];
        let mut cycle = None;
        walk_parents(&self.nodes, path, path, &mut stack, &mut lineage, &mut cycle);

        if let Some(node) = self.nodes.get_mut(path) {
            node.lineage = Some(lineage.clone());
            node.cyclical = cycle.is_some();
            node.cycle = cycle;
        }
        lineage
    }

    /// Compute lineage for every model node
    pub fn compute_all_lineages(&mut self) {
        let models: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.kind.is_model())
            .map(|n| n.path.clone())
            .collect();
        for path in models {
            self.compute_lineage(&path);
        }
    }

    /// Every inheritance cycle, once, as a closed path of pointers.
    ///
    /// Members of one strongly connected component share a single cycle; it
    /// is named from the member that was tracked first.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        for component in tarjan_scc(&self.graph) {
            let self_loop = component.len() == 1
                && self.graph.contains_edge(component[0], component[0]);
            if component.len() < 2 && !self_loop {
                continue;
            }
            let members: Vec<&String> = component.iter().map(|i| &self.graph[*i]).collect();
            let first = self
                .nodes
                .values()
                .find(|n| members.contains(&&n.path) && n.cycle.is_some());
            if let Some(cycle) = first.and_then(|n| n.cycle.clone()) {
                cycles.push(cycle);
            }
        }
        // Report in document order
        cycles.sort_by_key(|cycle| {
            cycle
                .first()
                .and_then(|p| self.nodes.get_index_of(p))
                .unwrap_or(usize::MAX)
        });
        cycles
    }
}

fn walk_parents(
    nodes: &IndexMap<String, DefinitionNode>,
    start: &str,
    current: &str,
    stack: &mut Vec<String>,
    lineage: &mut Vec<String>,
    cycle: &mut Option<Vec<String>>,
) {
    let Some(node) = nodes.get(current) else {
        return;
    };
    for parent in &node.parents {
        if parent == start {
            if cycle.is_none() {
                let mut closed = stack.clone();
                closed.push(start.to_string());
                *cycle = Some(closed);
            }
            continue;
        }
        // A loop that does not pass through `start` belongs to other nodes
        if stack.contains(parent) || lineage.contains(parent) {
            continue;
        }
        stack.push(parent.clone());
        walk_parents(nodes, start, parent, stack, lineage, cycle);
        stack.pop();
        lineage.push(parent.clone());
    }
}

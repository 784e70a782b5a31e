//! Connection topology of a model.
//!
//! Nodes are units (plus one node for model-level quantities when any are
//! connected); edges are connection constraint families linking them.

use crate::error::{ModelError, ModelResult};
use crate::expr::ConstraintOrigin;
use crate::model::Model;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

const MODEL_NODE: &str = "(model)";

/// Undirected graph with unit names on nodes and constraint names on edges.
pub type ConnectionGraph = UnGraph<String, String>;

/// Summary statistics of the connection graph.
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
}

#[derive(Debug)]
pub struct IslandSummary {
    pub island_id: usize,
    pub node_count: usize,
}

#[derive(Debug)]
pub struct NodeAssignment {
    pub node_index: usize,
    pub label: String,
    pub island_id: usize,
}

#[derive(Debug)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<NodeAssignment>,
}

/// Build the unit graph: one edge from the first participant's owner to
/// every other owner of each connection family.
pub fn connection_graph(model: &Model) -> ConnectionGraph {
    let mut graph = ConnectionGraph::new_undirected();
    let mut nodes: HashMap<Option<usize>, NodeIndex> = HashMap::new();
    for (id, unit) in model.units() {
        nodes.insert(Some(id.value()), graph.add_node(unit.name().to_string()));
    }
    for rule in model.constraints() {
        if !matches!(
            rule.origin,
            ConstraintOrigin::FlowConnection | ConstraintOrigin::EffortConnection
        ) {
            continue;
        }
        let mut owners = Vec::new();
        for quantity in rule.quantities() {
            let owner = model
                .quantity(quantity)
                .ok()
                .and_then(|q| q.owner())
                .map(|u| u.value());
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        let mut indices = Vec::with_capacity(owners.len());
        for owner in owners {
            let node = *nodes
                .entry(owner)
                .or_insert_with(|| graph.add_node(MODEL_NODE.to_string()));
            indices.push(node);
        }
        if let Some((lead, rest)) = indices.split_first() {
            for other in rest {
                graph.add_edge(*lead, *other, rule.name.clone());
            }
        }
    }
    graph
}

pub fn graph_stats(model: &Model) -> GraphStats {
    let graph = connection_graph(model);
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).collect::<HashSet<_>>().len())
        .collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(&graph),
        min_degree,
        avg_degree,
        max_degree,
    }
}

/// Label groups of units that are connected to each other (breadth-first).
pub fn find_islands(model: &Model) -> IslandAnalysis {
    let graph = connection_graph(model);
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();
    let mut island_id = 0;
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(node);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        islands.push(IslandSummary {
            island_id,
            node_count: members.len(),
        });
        for node in members {
            assignments.push(NodeAssignment {
                node_index: node.index(),
                label: graph[node].clone(),
                island_id,
            });
        }
        island_id += 1;
    }
    assignments.sort_by_key(|assignment| assignment.node_index);
    IslandAnalysis {
        islands,
        assignments,
    }
}

/// Render the connection graph, currently only as Graphviz DOT.
pub fn export_graph(model: &Model, format: &str) -> ModelResult<String> {
    match format.to_ascii_lowercase().as_str() {
        "graphviz" | "dot" => Ok(render_dot(model)),
        other => Err(ModelError::Validation(format!(
            "unsupported graph export format '{other}'"
        ))),
    }
}

fn render_dot(model: &Model) -> String {
    let graph = connection_graph(model);
    let mut buffer = String::new();
    buffer.push_str(&format!("graph \"{}\" {{\n", sanitize_label(model.name())));
    for node in graph.node_indices() {
        let label = sanitize_label(&graph[node]);
        buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
    }
    for edge in graph.edge_references() {
        let source = edge.source().index();
        let target = edge.target().index();
        let label = sanitize_label(edge.weight());
        buffer.push_str(&format!("  n{source} -- n{target} [label=\"{label}\"];\n"));
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}

//! Graph lookup and validation.
//!
//! [`WorkflowGraph`] indexes a workflow for the traversal loop: node lookup by
//! id, outgoing edges in authored order, and next-node selection.
//!
//! [`validate_workflow`] is the stricter check to run before persisting a
//! workflow. Rules enforced:
//! 1. Node IDs must be unique and must not shadow reserved context keys.
//! 2. Edge IDs are unique and every edge references valid node IDs (both
//!    `source` and `target`).
//! 3. Exactly one trigger node exists.
//! 4. Every condition node's expression is inside the condition grammar.
//!
//! Cycles are allowed; the executor's step limit bounds them.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::condition::Expression;
use crate::context::RESERVED_KEYS;
use crate::models::{Edge, Node, NodeKind, Workflow};
use crate::EngineError;

const HANDLE_TRUE: &str = "true";
const HANDLE_FALSE: &str = "false";
const HANDLE_DEFAULT: &str = "default";

/// A workflow indexed for traversal.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    workflow: Workflow,
    /// node id → index into `workflow.nodes`; the first node with an id wins.
    nodes: HashMap<String, usize>,
    /// node id → indices into `workflow.edges`, in authored order.
    outgoing: HashMap<String, Vec<usize>>,
}

impl WorkflowGraph {
    pub fn new(workflow: Workflow) -> Self {
        let mut nodes = HashMap::with_capacity(workflow.nodes.len());
        for (i, node) in workflow.nodes.iter().enumerate() {
            nodes.entry(node.id.clone()).or_insert(i);
        }

        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in workflow.edges.iter().enumerate() {
            outgoing.entry(edge.source.clone()).or_default().push(i);
        }

        Self { workflow, nodes, outgoing }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(|&i| &self.workflow.nodes[i])
    }

    /// The unique trigger node.
    ///
    /// # Errors
    /// - [`EngineError::MissingTrigger`] if there is none.
    /// - [`EngineError::MultipleTriggers`] if there is more than one.
    pub fn trigger(&self) -> Result<&Node, EngineError> {
        let mut triggers = self.workflow.nodes.iter().filter(|n| n.kind == NodeKind::Trigger);
        let first = triggers.next().ok_or(EngineError::MissingTrigger)?;
        if triggers.next().is_some() {
            return Err(EngineError::MultipleTriggers);
        }
        Ok(first)
    }

    /// Refuse a node whose id would overwrite a reserved context key.
    ///
    /// # Errors
    /// [`EngineError::ReservedNodeId`] naming the first offending node.
    pub fn check_reserved_ids(&self) -> Result<(), EngineError> {
        match self.workflow.nodes.iter().find(|n| RESERVED_KEYS.contains(&n.id.as_str())) {
            Some(node) => Err(EngineError::ReservedNodeId(node.id.clone())),
            None => Ok(()),
        }
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.outgoing
            .get(node_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.workflow.edges[i])
    }

    /// Pick the node after `current`.
    ///
    /// A condition node follows the edge whose handle matches its result
    /// (`"true"`/`"false"`), falling back to a `"default"` edge. Any other
    /// node follows its first outgoing edge. `None` ends the traversal; an
    /// edge whose target does not exist also ends it.
    pub fn next_node(&self, current: &Node, condition_result: Option<bool>) -> Option<&Node> {
        let edge = if current.kind == NodeKind::Condition {
            let wanted = if condition_result.unwrap_or(false) { HANDLE_TRUE } else { HANDLE_FALSE };
            self.find_handle(&current.id, wanted)
                .or_else(|| self.find_handle(&current.id, HANDLE_DEFAULT))
        } else {
            self.outgoing_edges(&current.id).next()
        };

        let Some(edge) = edge else {
            debug!(node_id = %current.id, "no outgoing edge, traversal ends");
            return None;
        };

        let next = self.node(&edge.target);
        if next.is_none() {
            debug!(edge_id = %edge.id, target = %edge.target, "edge target missing, traversal ends");
        }
        next
    }

    fn find_handle(&self, node_id: &str, handle: &str) -> Option<&Edge> {
        self.outgoing_edges(node_id)
            .find(|e| e.source_handle.as_deref() == Some(handle))
    }
}

/// Validate the workflow and return the node IDs reachable from the trigger,
/// in breadth-first order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::ReservedNodeId`] if a node ID is a reserved context key.
/// - [`EngineError::DuplicateEdgeId`] if two edges share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::MissingTrigger`] / [`EngineError::MultipleTriggers`].
/// - [`EngineError::InvalidCondition`] if a condition cannot be parsed.
pub fn validate_workflow(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Node IDs
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if RESERVED_KEYS.contains(&node.id.as_str()) {
            return Err(EngineError::ReservedNodeId(node.id.clone()));
        }
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Edge IDs and endpoints
    // -----------------------------------------------------------------------
    let mut seen_edges: HashSet<&str> = HashSet::new();
    for edge in &workflow.edges {
        if !seen_edges.insert(edge.id.as_str()) {
            return Err(EngineError::DuplicateEdgeId(edge.id.clone()));
        }
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Trigger + 4. conditions
    // -----------------------------------------------------------------------
    let graph = WorkflowGraph::new(workflow.clone());
    let trigger = graph.trigger()?;

    for node in workflow.nodes.iter().filter(|n| n.kind == NodeKind::Condition) {
        let expression = nodes::config::string_field(&node.config, "condition");
        if Expression::parse(&expression).is_none() {
            return Err(EngineError::InvalidCondition {
                node_id: node.id.clone(),
                expression,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Reachability from the trigger
    // -----------------------------------------------------------------------
    let mut reachable = Vec::with_capacity(workflow.nodes.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([trigger.id.as_str()]);
    visited.insert(trigger.id.as_str());

    while let Some(node_id) = queue.pop_front() {
        reachable.push(node_id.to_owned());
        for edge in graph.outgoing_edges(node_id) {
            if visited.insert(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }

    Ok(reachable)
}

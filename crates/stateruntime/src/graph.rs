use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use statecore::{ContractError, NodeId, StateData, StateNode, Transition};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Owner of a set of state nodes and, through them, their transitions.
///
/// Transitions refer to targets by [`NodeId`], so cycles never create
/// ownership cycles. Finalize with [`StateGraph::into_shared`] before running.
#[derive(Debug, Default, Clone)]
pub struct StateGraph {
    nodes: Vec<StateNode>,
    index: HashMap<NodeId, usize>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, replacing any node already registered under the same id.
    pub fn add_node(&mut self, node: StateNode) -> NodeId {
        let id = node.id();
        match self.index.get(&id) {
            Some(&slot) => self.nodes[slot] = node,
            None => {
                self.index.insert(id, self.nodes.len());
                self.nodes.push(node);
            }
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&StateNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn require(&self, id: NodeId) -> Result<&StateNode, ContractError> {
        self.node(id).ok_or(ContractError::UnknownNode(id))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut StateNode, ContractError> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.nodes[i]),
            None => Err(ContractError::UnknownNode(id)),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a non-converting transition guarded by `predicate`.
    pub fn connect<O, P>(&mut self, from: NodeId, to: NodeId, predicate: P) -> Result<&mut Transition, ContractError>
    where
        O: StateData,
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        let transition = Transition::new::<O, P>(self.require(from)?, self.require(to)?, predicate)?;
        self.require_mut(from)?.add_transition(transition)
    }

    /// Add an unconditional non-converting transition.
    pub fn connect_always(&mut self, from: NodeId, to: NodeId) -> Result<&mut Transition, ContractError> {
        let transition = Transition::always(self.require(from)?, self.require(to)?)?;
        self.require_mut(from)?.add_transition(transition)
    }

    /// Add a transition whose output is converted before it reaches `to`.
    pub fn connect_converting<O, N, P, C>(
        &mut self,
        from: NodeId,
        to: NodeId,
        predicate: P,
        converter: C,
    ) -> Result<&mut Transition, ContractError>
    where
        O: StateData,
        N: StateData,
        P: Fn(&O) -> bool + Send + Sync + 'static,
        C: Fn(&O) -> N + Send + Sync + 'static,
    {
        let transition =
            Transition::converting::<O, N, P, C>(self.require(from)?, self.require(to)?, predicate, converter)?;
        self.require_mut(from)?.add_transition(transition)
    }

    /// Attach a prebuilt transition to its source node.
    pub fn add_transition(&mut self, transition: Transition) -> Result<&mut Transition, ContractError> {
        self.require(transition.target())?;
        self.require_mut(transition.source())?.add_transition(transition)
    }

    /// Static reachability check from `entry`.
    ///
    /// Reports nodes that can never be scheduled and non-dead-end nodes that
    /// have nowhere to send their output. The exit node is allowed to have no
    /// transitions.
    pub fn validate(&self, entry: NodeId, exit: Option<NodeId>) -> Result<Vec<GraphWarning>, ContractError> {
        self.require(entry)?;
        if let Some(exit) = exit {
            self.require(exit)?;
        }

        let (graph, indices) = self.to_petgraph();
        let mut reachable = vec![false; self.nodes.len()];
        let mut dfs = Dfs::new(&graph, indices[&entry]);
        while let Some(idx) = dfs.next(&graph) {
            reachable[idx.index()] = true;
        }

        let mut warnings = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if !reachable[i] {
                warnings.push(GraphWarning::Unreachable {
                    node: node.id(),
                    name: node.name().to_string(),
                });
            }
            if !node.is_dead_end() && node.transitions().is_empty() && Some(node.id()) != exit {
                warnings.push(GraphWarning::NoTransitions {
                    node: node.id(),
                    name: node.name().to_string(),
                });
            }
        }
        Ok(warnings)
    }

    /// Structure-only view, with node weights set to ids.
    pub fn to_petgraph(&self) -> (DiGraph<NodeId, ()>, HashMap<NodeId, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), 0);
        let mut indices = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            indices.insert(node.id(), graph.add_node(node.id()));
        }
        for node in &self.nodes {
            for transition in node.transitions() {
                if let Some(&target) = indices.get(&transition.target()) {
                    graph.add_edge(indices[&node.id()], target, ());
                }
            }
        }
        (graph, indices)
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Structural problem found by [`StateGraph::validate`]. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWarning {
    Unreachable { node: NodeId, name: String },
    NoTransitions { node: NodeId, name: String },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWarning::Unreachable { name, .. } => {
                write!(f, "node '{}' is unreachable from the entry node", name)
            }
            GraphWarning::NoTransitions { name, .. } => {
                write!(f, "node '{}' is not a dead end but has no transitions", name)
            }
        }
    }
}

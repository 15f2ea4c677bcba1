//! Plan tree of a single statement.
//!
//! Nodes live in an arena owned by [`Plan`] and refer to each other by
//! [`NodeId`]. Leaves are [`Route`]s, everything above them is a [`Join`].

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::PlanError;
use crate::ir::tree::traversal::{PostOrder, REL_CAPACITY};

pub mod explain;
pub mod helpers;
pub mod join;
pub mod postprocess;
pub mod route;
pub mod symbols;
pub mod tree;

pub use join::{Join, JoinKind};
pub use route::{Limit, Route, RouteOpcode, TableRef};

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord, Serialize, Hash)]
pub struct NodeId(pub(crate) usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plan tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Route(Route),
    Join(Join),
}

impl Node {
    #[must_use]
    pub fn is_route(&self) -> bool {
        matches!(self, Node::Route(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    nodes: Vec<Node>,
    top: Option<NodeId>,
}

impl Plan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_route(&mut self, route: Route) -> NodeId {
        self.push(Node::Route(route))
    }

    /// Adds a join over two existing nodes.
    ///
    /// # Errors
    /// - children are not in the plan
    pub fn add_join(&mut self, join: Join) -> Result<NodeId, PlanError> {
        self.get_node(join.left)?;
        self.get_node(join.right)?;
        Ok(self.push(Node::Join(join)))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// # Errors
    /// - node is not in the plan
    pub fn set_top(&mut self, top: NodeId) -> Result<(), PlanError> {
        self.get_node(top)?;
        self.top = Some(top);
        Ok(())
    }

    /// # Errors
    /// - top node was never set
    pub fn get_top(&self) -> Result<NodeId, PlanError> {
        self.top.ok_or(PlanError::EmptyPlan)
    }

    /// # Errors
    /// - node is not in the plan
    pub fn get_node(&self, id: NodeId) -> Result<&Node, PlanError> {
        self.nodes.get(id.0).ok_or(PlanError::NodeNotFound(id.0))
    }

    /// # Errors
    /// - node is not in the plan
    pub fn get_mut_node(&mut self, id: NodeId) -> Result<&mut Node, PlanError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(PlanError::NodeNotFound(id.0))
    }

    /// # Errors
    /// - node is not a route
    pub fn get_route(&self, id: NodeId) -> Result<&Route, PlanError> {
        match self.get_node(id)? {
            Node::Route(route) => Ok(route),
            Node::Join(_) => Err(PlanError::UnexpectedNode(id.0, "route")),
        }
    }

    /// # Errors
    /// - node is not a route
    pub fn get_mut_route(&mut self, id: NodeId) -> Result<&mut Route, PlanError> {
        match self.get_mut_node(id)? {
            Node::Route(route) => Ok(route),
            Node::Join(_) => Err(PlanError::UnexpectedNode(id.0, "route")),
        }
    }

    /// # Errors
    /// - node is not a join
    pub fn get_join(&self, id: NodeId) -> Result<&Join, PlanError> {
        match self.get_node(id)? {
            Node::Join(join) => Ok(join),
            Node::Route(_) => Err(PlanError::UnexpectedNode(id.0, "join")),
        }
    }

    /// # Errors
    /// - node is not a join
    pub fn get_mut_join(&mut self, id: NodeId) -> Result<&mut Join, PlanError> {
        match self.get_mut_node(id)? {
            Node::Join(join) => Ok(join),
            Node::Route(_) => Err(PlanError::UnexpectedNode(id.0, "join")),
        }
    }

    /// Execution order of a node: a route's own order, or the order of
    /// the last route executed under a join.
    ///
    /// # Errors
    /// - node is not in the plan
    pub fn order(&self, id: NodeId) -> Result<usize, PlanError> {
        match self.get_node(id)? {
            Node::Route(route) => Ok(route.order),
            Node::Join(join) => Ok(self.order(join.left)?.max(self.order(join.right)?)),
        }
    }

    /// Join that executes `route` as its right side.
    ///
    /// # Errors
    /// - no join has `route` as its right child
    pub fn parent_join(&self, route: NodeId) -> Result<NodeId, PlanError> {
        self.nodes
            .iter()
            .position(|node| matches!(node, Node::Join(join) if join.right == route))
            .map(NodeId)
            .ok_or(PlanError::UnexpectedNode(route.0, "right side of a join"))
    }

    pub(crate) fn children(&self, id: NodeId) -> std::vec::IntoIter<NodeId> {
        match self.nodes.get(id.0) {
            Some(Node::Join(join)) => vec![join.left, join.right].into_iter(),
            Some(Node::Route(_)) | None => Vec::new().into_iter(),
        }
    }

    /// Routes reachable from the top, left to right.
    ///
    /// # Errors
    /// - top node was never set
    pub fn routes(&self) -> Result<Vec<NodeId>, PlanError> {
        let top = self.get_top()?;
        let tree = PostOrder::with_capacity(|id| self.children(id), REL_CAPACITY);
        Ok(tree
            .into_iter(top)
            .map(|level_node| level_node.1)
            .filter(|id| self.nodes.get(id.0).is_some_and(Node::is_route))
            .collect())
    }
}

use super::{SubjectCollector, SubjectId, SubjectSample};
use crate::executor::{DisconnectError, Disconnector};
use crate::history::Position;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown tree: {0}")]
    UnknownTree(String),
    #[error("unknown node {node} in tree {tree}")]
    UnknownNode { tree: String, node: String },
    #[error("node {node} has no socket {socket}")]
    UnknownSocket { node: String, socket: String },
    #[error("duplicate name: {0}")]
    Duplicate(String),
}

/// A link from an output socket of one node to an input socket of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub from_node: String,
    pub from_socket: String,
    pub to_node: String,
    pub to_socket: String,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    location: Position,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

#[derive(Debug, Clone)]
struct Tree {
    name: String,
    nodes: Vec<Node>,
    links: Vec<Link>,
    active: Option<String>,
}

impl Tree {
    fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    fn require_node(&self, name: &str) -> Result<&Node, GraphError> {
        self.node(name).ok_or_else(|| GraphError::UnknownNode {
            tree: self.name.clone(),
            node: name.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct GraphState {
    trees: Vec<Tree>,
    /// Trees shown in editors, in screen order.
    editors: Vec<String>,
}

impl GraphState {
    fn tree(&self, name: &str) -> Result<&Tree, GraphError> {
        self.trees
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| GraphError::UnknownTree(name.to_string()))
    }

    fn tree_mut(&mut self, name: &str) -> Result<&mut Tree, GraphError> {
        self.trees
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| GraphError::UnknownTree(name.to_string()))
    }
}

/// In-process node editor model.
///
/// The current subject is the active node of the first editor whose tree has
/// one, mirroring how a user sees the screen.
#[derive(Debug, Default)]
pub struct NodeGraph {
    state: Mutex<GraphState>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tree(&self, name: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        if state.trees.iter().any(|t| t.name == name) {
            return Err(GraphError::Duplicate(name.to_string()));
        }
        state.trees.push(Tree {
            name: name.to_string(),
            nodes: Vec::new(),
            links: Vec::new(),
            active: None,
        });
        Ok(())
    }

    pub fn add_node(
        &self,
        tree: &str,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        location: Position,
    ) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let tree = state.tree_mut(tree)?;
        if tree.node(name).is_some() {
            return Err(GraphError::Duplicate(name.to_string()));
        }
        tree.nodes.push(Node {
            name: name.to_string(),
            location,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        });
        Ok(())
    }

    pub fn link(
        &self,
        tree: &str,
        (from_node, from_socket): (&str, &str),
        (to_node, to_socket): (&str, &str),
    ) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let tree = state.tree_mut(tree)?;
        let from = tree.require_node(from_node)?;
        if !from.outputs.iter().any(|s| s == from_socket) {
            return Err(GraphError::UnknownSocket {
                node: from_node.to_string(),
                socket: from_socket.to_string(),
            });
        }
        let to = tree.require_node(to_node)?;
        if !to.inputs.iter().any(|s| s == to_socket) {
            return Err(GraphError::UnknownSocket {
                node: to_node.to_string(),
                socket: to_socket.to_string(),
            });
        }
        tree.links.push(Link {
            from_node: from_node.to_string(),
            from_socket: from_socket.to_string(),
            to_node: to_node.to_string(),
            to_socket: to_socket.to_string(),
        });
        Ok(())
    }

    pub fn remove_node(&self, tree: &str, name: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let tree = state.tree_mut(tree)?;
        tree.require_node(name)?;
        tree.nodes.retain(|n| n.name != name);
        tree.links.retain(|l| l.from_node != name && l.to_node != name);
        if tree.active.as_deref() == Some(name) {
            tree.active = None;
        }
        Ok(())
    }

    pub fn set_active(&self, tree: &str, node: Option<&str>) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let tree = state.tree_mut(tree)?;
        if let Some(name) = node {
            tree.require_node(name)?;
        }
        tree.active = node.map(str::to_string);
        Ok(())
    }

    pub fn move_node(&self, tree: &str, node: &str, location: Position) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let tree = state.tree_mut(tree)?;
        let tree_name = tree.name.clone();
        let node = tree.node_mut(node).ok_or_else(|| GraphError::UnknownNode {
            tree: tree_name,
            node: node.to_string(),
        })?;
        node.location = location;
        Ok(())
    }

    pub fn open_editor(&self, tree: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        state.tree(tree)?;
        state.editors.push(tree.to_string());
        Ok(())
    }

    pub fn close_editors(&self) {
        self.state.lock().editors.clear();
    }

    pub fn links(&self, tree: &str) -> Result<Vec<Link>, GraphError> {
        Ok(self.state.lock().tree(tree)?.links.clone())
    }
}

impl SubjectCollector for NodeGraph {
    fn current_subject(&self) -> Option<SubjectSample> {
        let state = self.state.lock();
        state.editors.iter().find_map(|editor| {
            let tree = state.tree(editor).ok()?;
            let node = tree.node(tree.active.as_deref()?)?;
            Some(SubjectSample {
                id: SubjectId::new(&tree.name, &node.name),
                position: node.location,
            })
        })
    }
}

impl Disconnector for NodeGraph {
    fn disconnect(&self, subject: &SubjectId) -> Result<usize, DisconnectError> {
        let mut state = self.state.lock();
        let tree = state
            .tree_mut(&subject.container)
            .map_err(|_| DisconnectError::SubjectMissing(subject.clone()))?;
        let node = tree
            .node(&subject.item)
            .ok_or_else(|| DisconnectError::SubjectMissing(subject.clone()))?;

        let inputs = node.inputs.clone();
        let outputs = node.outputs.clone();
        let touches = |l: &Link| {
            (l.to_node == subject.item && inputs.contains(&l.to_socket))
                || (l.from_node == subject.item && outputs.contains(&l.from_socket))
        };

        let before = tree.links.len();
        tree.links.retain(|l| !touches(l));
        Ok(before - tree.links.len())
    }
}

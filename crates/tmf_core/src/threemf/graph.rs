//! Instancing multigraph and lazy simple-path enumeration.
//!
//! Nodes are the world root plus object ids. Edges are kept in insertion
//! order and are never merged: two identical components are two instances.
//! Paths are produced depth-first in edge order, one at a time, with a
//! path-local visited set so cyclic component references still terminate.

use std::collections::{HashMap, HashSet};

use tmf_math::DMat4;

use super::types::ModelDocument;

/// A node of the instancing graph.
///
/// The root is its own variant, so no object id (not even `"world"`) can
/// alias it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    /// The synthetic world frame build items hang from
    World,

    /// An object id (declared or merely referenced)
    Object(String),
}

impl Node {
    /// Object id, or `None` for the root.
    pub fn object_id(&self) -> Option<&str> {
        match self {
            Node::World => None,
            Node::Object(id) => Some(id),
        }
    }
}

static WORLD: Node = Node::World;

/// A directed edge carrying the child's placement in the parent frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub from: Node,
    pub to: Node,
    pub transform: DMat4,
}

/// Directed multigraph of build items and components.
#[derive(Clone, Debug, Default)]
pub struct InstanceGraph {
    edges: Vec<Edge>,
    /// Outgoing edge positions per node, in insertion order
    outgoing: HashMap<Node, Vec<usize>>,
}

impl InstanceGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a collected model document.
    ///
    /// Build items are added first (world edges), then components of each
    /// object in declaration order.
    pub fn from_document(document: &ModelDocument) -> Self {
        let mut graph = Self::new();

        for item in &document.build {
            graph.add_edge(Node::World, Node::Object(item.object_id.clone()), item.transform);
        }
        for object in document.objects() {
            for component in &object.components {
                graph.add_edge(
                    Node::Object(object.id.clone()),
                    Node::Object(component.object_id.clone()),
                    component.transform,
                );
            }
        }

        graph
    }

    /// Append an edge and return its position.
    pub fn add_edge(&mut self, from: Node, to: Node, transform: DMat4) -> usize {
        let index = self.edges.len();
        self.outgoing.entry(from.clone()).or_default().push(index);
        self.edges.push(Edge { from, to, transform });
        index
    }

    /// Positions of the edges leaving `node`.
    pub fn outgoing(&self, node: &Node) -> &[usize] {
        self.outgoing.get(node).map_or(&[], Vec::as_slice)
    }

    /// Lazily enumerate every simple path from `root` to a leaf.
    pub fn simple_paths<'a>(&'a self, root: &'a Node) -> SimplePaths<'a> {
        SimplePaths::new(self, root)
    }

    /// Lazily enumerate every simple path from the world root to a leaf.
    pub fn paths_from_world(&self) -> SimplePaths<'_> {
        self.simple_paths(&WORLD)
    }
}

/// One root-to-leaf walk.
#[derive(Clone, Debug)]
pub struct InstancePath<'a> {
    edges: Vec<&'a Edge>,
}

impl<'a> InstancePath<'a> {
    /// Edges from the root outwards.
    pub fn edges(&self) -> &[&'a Edge] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True for a path without edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Node the path ends at.
    pub fn terminal(&self) -> &'a Node {
        match self.edges.last() {
            Some(&edge) => &edge.to,
            None => &WORLD,
        }
    }

    /// Node immediately before the terminal, if the path has two or more
    /// edges (i.e. the terminal was reached through a component).
    pub fn parent(&self) -> Option<&'a Node> {
        if self.edges.len() < 2 {
            return None;
        }
        let last: &'a Edge = *self.edges.last()?;
        Some(&last.from)
    }

    /// Absolute transform of the terminal: the product of the edge
    /// transforms, root-most on the left.
    pub fn compose(&self) -> DMat4 {
        match self.edges.split_first() {
            None => DMat4::IDENTITY,
            Some((first, rest)) => rest
                .iter()
                .fold(first.transform, |acc, edge| acc * edge.transform),
        }
    }
}

struct Frame<'a> {
    node: &'a Node,
    next: usize,
}

/// Depth-first iterator over simple root-to-leaf paths.
///
/// A node whose remaining edges all lead back onto the current path is a
/// dead end, not a leaf, and produces no path.
pub struct SimplePaths<'a> {
    graph: &'a InstanceGraph,
    stack: Vec<Frame<'a>>,
    path: Vec<&'a Edge>,
    on_path: HashSet<&'a Node>,
}

impl<'a> SimplePaths<'a> {
    fn new(graph: &'a InstanceGraph, root: &'a Node) -> Self {
        Self {
            graph,
            stack: vec![Frame { node: root, next: 0 }],
            path: Vec::new(),
            on_path: HashSet::from([root]),
        }
    }

    fn backtrack(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.on_path.remove(frame.node);
            self.path.pop();
        }
    }
}

impl<'a> Iterator for SimplePaths<'a> {
    type Item = InstancePath<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph;

        loop {
            let frame = self.stack.last_mut()?;
            let outgoing = graph.outgoing(frame.node);

            if outgoing.is_empty() {
                let leaf = (!self.path.is_empty()).then(|| InstancePath {
                    edges: self.path.clone(),
                });
                self.backtrack();
                if leaf.is_some() {
                    return leaf;
                }
                continue;
            }

            if frame.next >= outgoing.len() {
                self.backtrack();
                continue;
            }

            let edge = &graph.edges[outgoing[frame.next]];
            frame.next += 1;

            if self.on_path.contains(&edge.to) {
                log::debug!("Skipping cyclic reference {:?} -> {:?}", edge.from, edge.to);
                continue;
            }

            self.on_path.insert(&edge.to);
            self.path.push(edge);
            self.stack.push(Frame {
                node: &edge.to,
                next: 0,
            });
        }
    }
}

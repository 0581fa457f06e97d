//! Rooted lineage tree with ages, branch lengths and character states.
//!
//! # Overview
//! Nodes live in an arena keyed by a stable integer [`NodeId`]. Each node
//! stores its parent id and child ids, so there are no pointer cycles and the
//! root is simply the one node without a parent.
//!
//! ```text
//!          root (age 0)
//!         /    \
//!      1.0      2.0        ← branch lengths
//!       /         \
//!      a (1.0)     b (2.0) ← ages
//! ```
//!
//! # Invariant
//! For every edge `(p, c)`: `age(c) == age(p) + length(p, c)`.
//! Only [`LineageTree::set_age`] and [`LineageTree::set_branch_length`] touch
//! ages and lengths, and both re-walk the affected subtree to keep it.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::consensus::lca_characters;
use crate::error::{Error, Result};
use crate::matrix::{CharacterMatrix, State, UNMUTATED};

pub type NodeId = usize;

/// Order in which [`LineageTree::depth_first_traverse_nodes`] yields nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    Preorder,
    Postorder,
}

#[derive(Debug, Clone)]
struct Node {
    label: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Length of the edge leading into this node; 0 for the root.
    length: f64,
    age: f64,
    states: Vec<State>,
}

impl Node {
    fn new(label: String) -> Self {
        Node {
            label,
            parent: None,
            children: Vec::new(),
            length: 0.0,
            age: 0.0,
            states: Vec::new(),
        }
    }
}

/// Arena of labelled nodes connected by parent/child edges.
///
/// Used to assemble a topology (by the solvers and the Newick reader) before
/// it is handed to [`LineageTree::populate`].
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: BTreeMap<NodeId, Node>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Add a node, or relabel it if the id already exists.
    pub fn add_node(&mut self, id: NodeId, label: impl Into<String>) {
        let label = label.into();
        match self.nodes.get_mut(&id) {
            Some(node) => node.label = label,
            None => {
                self.nodes.insert(id, Node::new(label));
            }
        }
    }

    /// Connect `child` below `parent` with the given branch length.
    ///
    /// # Errors
    /// [`Error::NodeNotFound`] if either end is missing,
    /// [`Error::MalformedTree`] if `child` already has a parent or the edge is
    /// a self-loop.
    pub fn add_edge(&mut self, parent: NodeId, child: NodeId, length: f64) -> Result<()> {
        if parent == child {
            return Err(Error::MalformedTree(format!("self-loop on node {parent}")));
        }
        self.node(parent)?;
        let node = self.node_mut(child)?;
        if let Some(p) = node.parent {
            return Err(Error::MalformedTree(format!(
                "node {child} already has parent {p}"
            )));
        }
        node.parent = Some(parent);
        node.length = length;
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Delete a node, detaching it from its parent and orphaning its children.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.remove(&id).ok_or(Error::NodeNotFound(id))?;
        if let Some(p) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|&c| c != id);
        }
        for c in node.children {
            if let Some(child) = self.nodes.get_mut(&c) {
                child.parent = None;
                child.length = 0.0;
            }
        }
        Ok(())
    }

    /// Merge `child` into its parent: its children are reattached to the
    /// parent, at the position `child` occupied, and `child` is deleted.
    pub fn contract_edge(&mut self, child: NodeId) -> Result<()> {
        let parent = self.node(child)?.parent.ok_or(Error::RootHasNoParent(child))?;
        let grandchildren = std::mem::take(&mut self.node_mut(child)?.children);
        for &g in &grandchildren {
            self.node_mut(g)?.parent = Some(parent);
        }

        let siblings = &mut self.node_mut(parent)?.children;
        if let Some(pos) = siblings.iter().position(|&c| c == child) {
            siblings.remove(pos);
            for (k, g) in grandchildren.into_iter().enumerate() {
                siblings.insert(pos + k, g);
            }
        }

        self.nodes.remove(&child);
        Ok(())
    }

    /// Insert a new node `id` between `child` and its parent (if any).
    ///
    /// The new node takes over `child`'s incoming edge; `child` hangs below it
    /// with branch length `length`.
    pub fn insert_parent(
        &mut self,
        child: NodeId,
        id: NodeId,
        label: impl Into<String>,
        length: f64,
    ) -> Result<()> {
        if self.contains(id) {
            return Err(Error::MalformedTree(format!("node {id} already exists")));
        }
        let (old_parent, old_length) = {
            let node = self.node(child)?;
            (node.parent, node.length)
        };

        let mut inserted = Node::new(label.into());
        inserted.parent = old_parent;
        inserted.length = old_length;
        inserted.children.push(child);
        self.nodes.insert(id, inserted);

        if let Some(p) = old_parent {
            for c in self.node_mut(p)?.children.iter_mut() {
                if *c == child {
                    *c = id;
                }
            }
        }
        let node = self.node_mut(child)?;
        node.parent = Some(id);
        node.length = length;
        Ok(())
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.label.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Children of `id`; empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Length of the edge leading into `id`.
    pub fn branch_length(&self, id: NodeId) -> Option<f64> {
        self.nodes.get(&id).map(|n| n.length)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    /// Smallest id strictly greater than every id in use.
    pub fn next_id(&self) -> NodeId {
        self.nodes.keys().next_back().map_or(0, |&k| k + 1)
    }

    /// The unique parentless node.
    ///
    /// # Errors
    /// [`Error::MalformedTree`] if there is no such node or more than one.
    pub fn root(&self) -> Result<NodeId> {
        let mut roots = self.nodes.iter().filter(|(_, n)| n.parent.is_none()).map(|(&id, _)| id);
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(root),
            (None, _) => Err(Error::MalformedTree("no root".to_string())),
            (Some(a), Some(b)) => Err(Error::MalformedTree(format!(
                "multiple roots ({a}, {b}, ...)"
            ))),
        }
    }

    /// All nodes below (and including) `source`, children before parents.
    pub fn postorder(&self, source: NodeId) -> Vec<NodeId> {
        DepthFirstNodes::new(self, source, TraversalOrder::Postorder).collect()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))
    }

    /// Recompute ages below `source` from its own age and the edge lengths.
    fn propagate_ages(&mut self, source: NodeId) {
        let order: Vec<NodeId> = DepthFirstNodes::new(self, source, TraversalOrder::Preorder).collect();
        for id in order {
            let Some(node) = self.nodes.get(&id) else { continue };
            let age = node.age;
            let children = node.children.clone();
            for c in children {
                if let Some(child) = self.nodes.get_mut(&c) {
                    child.age = age + child.length;
                }
            }
        }
    }
}

/// Lazy depth-first walk over the nodes of a [`Network`].
///
/// Children are explored in their stored order. Each call to a traversal
/// method creates a fresh iterator, so traversals are restartable.
pub struct DepthFirstNodes<'a> {
    network: &'a Network,
    order: TraversalOrder,
    /// Preorder uses plain ids; postorder tracks the next child to descend to.
    stack: Vec<(NodeId, usize)>,
}

impl<'a> DepthFirstNodes<'a> {
    fn new(network: &'a Network, source: NodeId, order: TraversalOrder) -> Self {
        let stack = if network.contains(source) { vec![(source, 0)] } else { Vec::new() };
        DepthFirstNodes { network, order, stack }
    }
}

impl Iterator for DepthFirstNodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self.order {
            TraversalOrder::Preorder => {
                let (id, _) = self.stack.pop()?;
                for &c in self.network.children(id).iter().rev() {
                    self.stack.push((c, 0));
                }
                Some(id)
            }
            TraversalOrder::Postorder => loop {
                let (id, next_child) = self.stack.last_mut()?;
                let id = *id;
                match self.network.children(id).get(*next_child) {
                    Some(&c) => {
                        *next_child += 1;
                        self.stack.push((c, 0));
                    }
                    None => {
                        self.stack.pop();
                        return Some(id);
                    }
                }
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Structure {
    network: Network,
    root: NodeId,
    labels: HashMap<String, NodeId>,
}

/// A character matrix together with the lineage tree explaining it.
///
/// Starts without a structure; queries fail with
/// [`Error::UninitializedTree`] until [`populate`](Self::populate) (or a
/// solver) loads one.
#[derive(Debug, Clone)]
pub struct LineageTree {
    matrix: CharacterMatrix,
    structure: Option<Structure>,
}

impl LineageTree {
    pub fn new(matrix: CharacterMatrix) -> Self {
        LineageTree { matrix, structure: None }
    }

    pub fn character_matrix(&self) -> &CharacterMatrix {
        &self.matrix
    }

    pub fn n_characters(&self) -> usize {
        self.matrix.n_characters()
    }

    pub fn is_initialized(&self) -> bool {
        self.structure.is_some()
    }

    /// Load a topology, replacing any previous one.
    ///
    /// Leaves whose label names a sample get that sample's state vector; all
    /// other nodes start empty. Ages are computed from the root (age 0) using
    /// the network's branch lengths.
    ///
    /// # Errors
    /// - [`Error::MalformedTree`] unless the network is a single rooted tree;
    /// - [`Error::InvalidLength`] on a negative branch length;
    /// - [`Error::AmbiguousLabel`] if two nodes share a label.
    pub fn populate(&mut self, mut network: Network) -> Result<()> {
        let root = network.root()?;

        let reachable = DepthFirstNodes::new(&network, root, TraversalOrder::Preorder).count();
        if reachable != network.len() {
            return Err(Error::MalformedTree(format!(
                "{} of {} nodes are not connected to root {root}",
                network.len() - reachable,
                network.len()
            )));
        }

        let mut labels = HashMap::with_capacity(network.len());
        for (&id, node) in &network.nodes {
            if node.parent.is_some() && !(node.length >= 0.0) {
                return Err(Error::InvalidLength { length: node.length });
            }
            if labels.insert(node.label.clone(), id).is_some() {
                return Err(Error::AmbiguousLabel(node.label.clone()));
            }
        }

        for node in network.nodes.values_mut() {
            node.states = match self.matrix.index_of(&node.label) {
                Some(sample) if node.children.is_empty() => self.matrix.row(sample).to_vec(),
                _ => Vec::new(),
            };
        }

        if let Some(r) = network.nodes.get_mut(&root) {
            r.age = 0.0;
            r.length = 0.0;
        }
        network.propagate_ages(root);

        log::debug!("populated tree with {} nodes rooted at {root}", network.len());
        self.structure = Some(Structure { network, root, labels });
        Ok(())
    }

    /// Load a tree from Newick text.
    pub fn populate_from_newick(&mut self, newick: &str) -> Result<()> {
        let network = crate::newick::parse_newick(newick)?;
        self.populate(network)
    }

    /// Serialise the tree as Newick with labels and branch lengths.
    pub fn to_newick(&self) -> Result<String> {
        let s = self.structure()?;
        Ok(crate::newick::write_newick(&s.network, s.root))
    }

    fn structure(&self) -> Result<&Structure> {
        self.structure.as_ref().ok_or(Error::UninitializedTree)
    }

    fn structure_mut(&mut self) -> Result<&mut Structure> {
        self.structure.as_mut().ok_or(Error::UninitializedTree)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.structure()?.network.node(id)
    }

    pub fn root(&self) -> Result<NodeId> {
        Ok(self.structure()?.root)
    }

    pub fn nodes(&self) -> Result<Vec<NodeId>> {
        Ok(self.structure()?.network.node_ids().collect())
    }

    pub fn leaves(&self) -> Result<Vec<NodeId>> {
        let net = &self.structure()?.network;
        Ok(net.node_ids().filter(|&id| net.is_leaf(id)).collect())
    }

    /// Every node with at least one child, the root included.
    pub fn internal_nodes(&self) -> Result<Vec<NodeId>> {
        let net = &self.structure()?.network;
        Ok(net.node_ids().filter(|&id| !net.is_leaf(id)).collect())
    }

    pub fn edges(&self) -> Result<Vec<(NodeId, NodeId)>> {
        let net = &self.structure()?.network;
        Ok(net
            .nodes
            .iter()
            .flat_map(|(&p, n)| n.children.iter().map(move |&c| (p, c)))
            .collect())
    }

    pub fn is_leaf(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.children.is_empty())
    }

    pub fn is_root(&self, id: NodeId) -> Result<bool> {
        self.node(id)?;
        Ok(self.root()? == id)
    }

    pub fn parent(&self, id: NodeId) -> Result<NodeId> {
        self.node(id)?.parent.ok_or(Error::RootHasNoParent(id))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children.as_slice())
    }

    pub fn node_id(&self, label: &str) -> Result<NodeId> {
        self.structure()?
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }

    pub fn label(&self, id: NodeId) -> Result<&str> {
        Ok(self.node(id)?.label.as_str())
    }

    pub fn character_states(&self, id: NodeId) -> Result<&[State]> {
        Ok(self.node(id)?.states.as_slice())
    }

    pub fn age(&self, id: NodeId) -> Result<f64> {
        Ok(self.node(id)?.age)
    }

    /// Set the age of a node.
    ///
    /// Only the edge entering `id` is rescaled; branch lengths below `id`
    /// stay fixed, so the whole subtree shifts with it.
    ///
    /// # Errors
    /// [`Error::InvalidAge`] if `age` is below the parent's age. The tree is
    /// left untouched in that case.
    pub fn set_age(&mut self, id: NodeId, age: f64) -> Result<()> {
        let parent = self.parent(id)?;
        let parent_age = self.age(parent)?;
        if !(age >= parent_age) {
            return Err(Error::InvalidAge { age, parent_age });
        }

        let net = &mut self.structure_mut()?.network;
        let node = net.node_mut(id)?;
        node.length = age - parent_age;
        node.age = parent_age + node.length;
        net.propagate_ages(id);
        Ok(())
    }

    pub fn branch_length(&self, parent: NodeId, child: NodeId) -> Result<f64> {
        self.check_edge(parent, child)?;
        Ok(self.node(child)?.length)
    }

    /// Set the length of edge `(parent, child)` and shift every descendant of
    /// `parent` accordingly.
    ///
    /// # Errors
    /// [`Error::EdgeNotFound`] if the edge does not exist,
    /// [`Error::InvalidLength`] if `length` is negative.
    pub fn set_branch_length(&mut self, parent: NodeId, child: NodeId, length: f64) -> Result<()> {
        self.check_edge(parent, child)?;
        if !(length >= 0.0) {
            return Err(Error::InvalidLength { length });
        }

        let net = &mut self.structure_mut()?.network;
        net.node_mut(child)?.length = length;
        net.propagate_ages(parent);
        Ok(())
    }

    fn check_edge(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let net = &self.structure()?.network;
        if net.parent(child) == Some(parent) {
            Ok(())
        } else {
            Err(Error::EdgeNotFound { parent, child })
        }
    }

    /// Fill the state vectors of internal nodes by Camin–Sokal consensus.
    ///
    /// Nodes are processed children-first; leaves are never modified, so
    /// running this twice gives the same result.
    ///
    /// # Errors
    /// [`Error::BadStateVectorLength`] if any reconstructed vector does not
    /// have one entry per character.
    pub fn reconstruct_ancestral_characters(&mut self) -> Result<()> {
        let missing = self.matrix.missing();
        let expected = self.matrix.n_characters();
        let s = self.structure_mut()?;

        for id in s.network.postorder(s.root) {
            let children = s.network.children(id);
            if children.is_empty() {
                continue;
            }
            let vectors: Vec<&[State]> = children
                .iter()
                .filter_map(|c| s.network.nodes.get(c))
                .map(|n| n.states.as_slice())
                .collect();
            let reconstructed = lca_characters(&vectors, missing)?;
            if reconstructed.len() != expected {
                return Err(Error::BadStateVectorLength {
                    expected,
                    found: reconstructed.len(),
                });
            }
            s.network.node_mut(id)?.states = reconstructed;
        }
        Ok(())
    }

    /// Depth-first node traversal from `source` (the root when `None`).
    pub fn depth_first_traverse_nodes(
        &self,
        source: Option<NodeId>,
        order: TraversalOrder,
    ) -> Result<DepthFirstNodes<'_>> {
        let s = self.structure()?;
        let source = source.unwrap_or(s.root);
        s.network.node(source)?;
        Ok(DepthFirstNodes::new(&s.network, source, order))
    }

    /// Edges `(parent, child)` in depth-first preorder from `source`.
    pub fn depth_first_traverse_edges(
        &self,
        source: Option<NodeId>,
    ) -> Result<impl Iterator<Item = (NodeId, NodeId)> + '_> {
        let net = &self.structure()?.network;
        let nodes = self.depth_first_traverse_nodes(source, TraversalOrder::Preorder)?;
        Ok(nodes.skip(1).filter_map(move |c| net.parent(c).map(|p| (p, c))))
    }

    pub fn leaves_in_subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let net = &self.structure()?.network;
        Ok(self
            .depth_first_traverse_nodes(Some(id), TraversalOrder::Postorder)?
            .filter(|&n| net.is_leaf(n))
            .collect())
    }

    /// Mutations gained along `(parent, child)` as 1-indexed
    /// `(character, state)` pairs: the parent is unmutated and the child is not.
    pub fn mutations_along_edge(&self, parent: NodeId, child: NodeId) -> Result<Vec<(usize, State)>> {
        self.check_edge(parent, child)?;
        let expected = self.matrix.n_characters();
        let parent_states = self.character_states(parent)?;
        let child_states = self.character_states(child)?;
        for v in [parent_states, child_states] {
            if v.len() != expected {
                return Err(Error::BadStateVectorLength { expected, found: v.len() });
            }
        }

        Ok(parent_states
            .iter()
            .zip(child_states)
            .enumerate()
            .filter(|(_, (p, c))| **p == UNMUTATED && **c != UNMUTATED)
            .map(|(i, (_, c))| (i + 1, *c))
            .collect())
    }

    /// Rename nodes by label. Labels absent from `mapping` are kept.
    ///
    /// # Errors
    /// [`Error::AmbiguousLabel`] if two nodes would end up with the same
    /// label; no node is renamed in that case.
    pub fn relabel_nodes(&mut self, mapping: &HashMap<String, String>) -> Result<()> {
        let s = self.structure_mut()?;

        let mut renamed: Vec<(NodeId, String)> = Vec::with_capacity(s.network.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(s.network.len());
        for (&id, node) in &s.network.nodes {
            let label = mapping.get(&node.label).unwrap_or(&node.label);
            if !seen.insert(label.as_str()) {
                return Err(Error::AmbiguousLabel(label.clone()));
            }
            renamed.push((id, label.clone()));
        }

        s.labels.clear();
        for (id, label) in renamed {
            s.labels.insert(label.clone(), id);
            s.network.node_mut(id)?.label = label;
        }
        Ok(())
    }

    fn leaf_ages(&self) -> Result<Vec<f64>> {
        self.leaves()?.into_iter().map(|l| self.age(l)).collect()
    }

    /// Mean age over the leaves.
    pub fn mean_depth(&self) -> Result<f64> {
        let ages = self.leaf_ages()?;
        Ok(ages.iter().sum::<f64>() / ages.len() as f64)
    }

    /// Maximum age over the leaves.
    pub fn max_depth(&self) -> Result<f64> {
        Ok(self.leaf_ages()?.into_iter().fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    /// ```text
    ///           0
    ///         /   \
    ///        1     2
    ///       / \   / \
    ///      3   4 5   6
    /// ```
    fn binary_network() -> Network {
        let mut net = Network::new();
        for id in 0..7 {
            net.add_node(id, format!("n{id}"));
        }
        for (p, c) in [(0, 1), (0, 2), (1, 3), (1, 4), (2, 5), (2, 6)] {
            net.add_edge(p, c, 1.0).unwrap();
        }
        net
    }

    fn binary_tree() -> LineageTree {
        let names = ["n3", "n4", "n5", "n6"].iter().map(|s| s.to_string()).collect();
        let rows = vec![vec![1, 0, 2], vec![1, 3, -1], vec![0, 0, 2], vec![0, 4, 2]];
        let cm = CharacterMatrix::new(names, rows, -1).unwrap();
        let mut tree = LineageTree::new(cm);
        tree.populate(binary_network()).unwrap();
        tree
    }

    fn assert_ages_consistent(tree: &LineageTree) {
        for (p, c) in tree.edges().unwrap() {
            let expected = tree.age(p).unwrap() + tree.branch_length(p, c).unwrap();
            assert_eq!(tree.age(c).unwrap(), expected, "edge ({p}, {c})");
        }
    }

    #[test]
    fn test_uninitialized_queries_fail() {
        let cm = CharacterMatrix::from_rows(vec![vec![0]], -1).unwrap();
        let tree = LineageTree::new(cm);
        assert!(matches!(tree.root(), Err(Error::UninitializedTree)));
        assert!(matches!(tree.leaves(), Err(Error::UninitializedTree)));
        assert!(matches!(tree.internal_nodes(), Err(Error::UninitializedTree)));
        assert!(matches!(tree.nodes(), Err(Error::UninitializedTree)));
        assert!(matches!(tree.edges(), Err(Error::UninitializedTree)));
    }

    #[test]
    fn test_basic_queries() {
        let tree = binary_tree();
        assert_eq!(tree.root().unwrap(), 0);
        assert_eq!(tree.leaves().unwrap(), vec![3, 4, 5, 6]);
        assert_eq!(tree.internal_nodes().unwrap(), vec![0, 1, 2]);
        assert_eq!(tree.edges().unwrap().len(), 6);
        assert!(tree.is_root(0).unwrap());
        assert!(tree.is_leaf(5).unwrap());
        assert_eq!(tree.parent(4).unwrap(), 1);
        assert!(matches!(tree.parent(0), Err(Error::RootHasNoParent(0))));
        assert_eq!(tree.children(2).unwrap(), &[5, 6]);
        assert_eq!(tree.age(6).unwrap(), 2.0);
    }

    #[test]
    fn test_populate_rejects_bad_structures() {
        let cm = CharacterMatrix::from_rows(vec![vec![0]], -1).unwrap();

        let mut two_roots = Network::new();
        two_roots.add_node(0, "a");
        two_roots.add_node(1, "b");
        let mut tree = LineageTree::new(cm.clone());
        assert!(matches!(tree.populate(two_roots), Err(Error::MalformedTree(_))));

        let mut same_label = Network::new();
        same_label.add_node(0, "a");
        same_label.add_node(1, "a");
        same_label.add_edge(0, 1, 1.0).unwrap();
        assert!(matches!(tree.populate(same_label), Err(Error::AmbiguousLabel(_))));

        let mut negative = Network::new();
        negative.add_node(0, "a");
        negative.add_node(1, "b");
        negative.add_edge(0, 1, -1.0).unwrap();
        assert!(matches!(tree.populate(negative), Err(Error::InvalidLength { .. })));
        assert!(!tree.is_initialized());
    }

    #[test]
    fn test_set_age_shifts_subtree() {
        let mut tree = binary_tree();
        tree.set_age(1, 3.0).unwrap();

        assert_eq!(tree.branch_length(0, 1).unwrap(), 3.0);
        assert_eq!(tree.age(3).unwrap(), 4.0);
        assert_eq!(tree.age(4).unwrap(), 4.0);
        assert_eq!(tree.age(5).unwrap(), 2.0);
        assert_ages_consistent(&tree);
    }

    #[test]
    fn test_set_age_below_parent_leaves_tree_unmodified() {
        let mut tree = binary_tree();
        tree.set_age(1, 2.5).unwrap();
        let before: Vec<f64> = tree.nodes().unwrap().iter().map(|&n| tree.age(n).unwrap()).collect();

        let err = tree.set_age(3, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidAge { .. }));

        let after: Vec<f64> = tree.nodes().unwrap().iter().map(|&n| tree.age(n).unwrap()).collect();
        assert_eq!(before, after);
        assert_eq!(tree.branch_length(1, 3).unwrap(), 1.0);
    }

    #[test]
    fn test_set_branch_length() {
        let mut tree = binary_tree();
        tree.set_branch_length(0, 2, 0.5).unwrap();

        assert_eq!(tree.age(2).unwrap(), 0.5);
        assert_eq!(tree.age(5).unwrap(), 1.5);
        assert_eq!(tree.age(3).unwrap(), 2.0);

        assert!(matches!(
            tree.set_branch_length(0, 3, 1.0),
            Err(Error::EdgeNotFound { parent: 0, child: 3 })
        ));
        assert!(matches!(
            tree.set_branch_length(0, 1, -0.1),
            Err(Error::InvalidLength { .. })
        ));
        assert!(matches!(tree.branch_length(3, 1), Err(Error::EdgeNotFound { .. })));
    }

    #[test]
    fn test_invariant_after_mixed_edits() {
        let mut tree = binary_tree();
        tree.set_branch_length(0, 1, 2.25).unwrap();
        tree.set_age(4, 7.5).unwrap();
        tree.set_branch_length(2, 6, 0.0).unwrap();
        tree.set_age(2, 0.75).unwrap();
        tree.set_branch_length(1, 3, 4.0).unwrap();
        assert_ages_consistent(&tree);
        assert_eq!(tree.max_depth().unwrap(), 7.5);
    }

    #[test]
    fn test_traversal_visits_every_node_once() {
        let tree = binary_tree();
        for order in [TraversalOrder::Preorder, TraversalOrder::Postorder] {
            let visited: Vec<NodeId> = tree.depth_first_traverse_nodes(None, order).unwrap().collect();
            assert_eq!(visited.len(), tree.nodes().unwrap().len());
            assert!(visited.iter().all_unique());
        }

        let pre: Vec<NodeId> = tree
            .depth_first_traverse_nodes(None, TraversalOrder::Preorder)
            .unwrap()
            .collect();
        assert_eq!(pre, vec![0, 1, 3, 4, 2, 5, 6]);

        let post: Vec<NodeId> = tree
            .depth_first_traverse_nodes(None, TraversalOrder::Postorder)
            .unwrap()
            .collect();
        assert_eq!(post, vec![3, 4, 1, 5, 6, 2, 0]);
    }

    #[test]
    fn test_traverse_edges_and_subtree_leaves() {
        let tree = binary_tree();
        let edges: Vec<_> = tree.depth_first_traverse_edges(Some(2)).unwrap().collect();
        assert_eq!(edges, vec![(2, 5), (2, 6)]);
        assert_eq!(tree.leaves_in_subtree(1).unwrap(), vec![3, 4]);
        assert_eq!(tree.leaves_in_subtree(6).unwrap(), vec![6]);
    }

    #[test]
    fn test_reconstruct_ancestral_characters() {
        let mut tree = binary_tree();
        tree.reconstruct_ancestral_characters().unwrap();

        assert_eq!(tree.character_states(1).unwrap(), &[1, 0, 2]);
        assert_eq!(tree.character_states(2).unwrap(), &[0, 0, 2]);
        assert_eq!(tree.character_states(0).unwrap(), &[0, 0, 2]);

        let first: Vec<Vec<State>> = tree
            .internal_nodes()
            .unwrap()
            .iter()
            .map(|&n| tree.character_states(n).unwrap().to_vec())
            .collect();
        tree.reconstruct_ancestral_characters().unwrap();
        let second: Vec<Vec<State>> = tree
            .internal_nodes()
            .unwrap()
            .iter()
            .map(|&n| tree.character_states(n).unwrap().to_vec())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reconstruction_rejects_leaves_without_states() {
        let cm = CharacterMatrix::from_rows(vec![vec![1, 2]], -1).unwrap();
        let mut tree = LineageTree::new(cm);
        let mut net = Network::new();
        net.add_node(10, "root");
        net.add_node(11, "unknown-a");
        net.add_node(12, "unknown-b");
        net.add_edge(10, 11, 1.0).unwrap();
        net.add_edge(10, 12, 1.0).unwrap();
        tree.populate(net).unwrap();

        let err = tree.reconstruct_ancestral_characters().unwrap_err();
        assert!(matches!(err, Error::BadStateVectorLength { expected: 2, found: 0 }));
    }

    #[test]
    fn test_mutations_along_edge() {
        let mut tree = binary_tree();
        tree.reconstruct_ancestral_characters().unwrap();

        assert_eq!(tree.mutations_along_edge(0, 1).unwrap(), vec![(1, 1)]);
        assert_eq!(tree.mutations_along_edge(1, 4).unwrap(), vec![(2, 3)]);
        assert_eq!(tree.mutations_along_edge(2, 6).unwrap(), vec![(2, 4)]);
        assert!(matches!(tree.mutations_along_edge(0, 3), Err(Error::EdgeNotFound { .. })));
    }

    #[test]
    fn test_relabel_nodes() {
        let mut tree = binary_tree();
        let mapping = HashMap::from([
            ("n3".to_string(), "cell-a".to_string()),
            ("n0".to_string(), "root".to_string()),
        ]);
        tree.relabel_nodes(&mapping).unwrap();

        assert_eq!(tree.label(3).unwrap(), "cell-a");
        assert_eq!(tree.node_id("root").unwrap(), 0);
        assert!(matches!(tree.node_id("n3"), Err(Error::UnknownLabel(_))));
    }

    #[test]
    fn test_relabel_collision_is_rejected() {
        let mut tree = binary_tree();
        let mapping = HashMap::from([("n3".to_string(), "n4".to_string())]);

        let err = tree.relabel_nodes(&mapping).unwrap_err();
        assert!(matches!(err, Error::AmbiguousLabel(ref l) if l == "n4"));
        assert_eq!(tree.label(3).unwrap(), "n3");
        assert_eq!(tree.node_id("n4").unwrap(), 4);
    }

    #[test]
    fn test_depth_statistics() {
        let mut tree = binary_tree();
        tree.set_branch_length(2, 6, 3.0).unwrap();
        assert_eq!(tree.max_depth().unwrap(), 4.0);
        assert_eq!(tree.mean_depth().unwrap(), 2.5);
    }

    #[test]
    fn test_network_contract_and_insert() {
        let mut net = binary_network();
        net.contract_edge(1).unwrap();
        assert_eq!(net.children(0), &[3, 4, 2]);
        assert_eq!(net.parent(3), Some(0));
        assert!(!net.contains(1));

        net.insert_parent(5, 9, "g", 0.0).unwrap();
        assert_eq!(net.children(2), &[9, 6]);
        assert_eq!(net.children(9), &[5]);
        assert_eq!(net.branch_length(9), Some(1.0));
        assert_eq!(net.branch_length(5), Some(0.0));
        assert_eq!(net.root().unwrap(), 0);
    }
}

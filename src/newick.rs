//! Newick import/export for lineage trees.
//!
//! Parsing is delegated to `phylotree`; the parsed tree is copied into a
//! [`Network`] so it can be loaded with [`LineageTree::populate`]. Writing is
//! done directly from the arena.
//!
//! [`LineageTree::populate`]: crate::tree::LineageTree::populate

use std::collections::{HashMap, HashSet};

use phylotree::tree::Tree as PhyloTree;

use crate::error::{Error, Result};
use crate::tree::{Network, NodeId};

/// Branch length assumed when the Newick text does not give one.
pub const DEFAULT_BRANCH_LENGTH: f64 = 1.0;

/// Parse Newick text into a [`Network`].
///
/// Node ids are the ids `phylotree` assigned while parsing. Quoted labels
/// keep their spaces and punctuation (`''` stands for a literal quote).
/// Unnamed nodes are labelled `node<id>`, with `_` appended until the label
/// is not used by any other node.
///
/// # Errors
/// [`Error::Newick`] if the text cannot be parsed, [`Error::Phylo`] if the
/// parsed tree is inconsistent.
pub fn parse_newick(newick: &str) -> Result<Network> {
    let (masked, quoted) = mask_quoted_labels(newick.trim())?;
    let phylo = PhyloTree::from_newick(&masked).map_err(|e| Error::Newick(e.to_string()))?;
    let root = phylo.get_root()?;

    // Preorder over the parsed tree; nodes first, then edges, so both ends exist.
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = phylo.get(&id)?;
        stack.extend(node.children.iter().rev().copied());
        order.push(id);
    }

    let mut names: Vec<(NodeId, Option<String>)> = Vec::with_capacity(order.len());
    for &id in &order {
        let name = phylo
            .get(&id)?
            .name
            .as_ref()
            .map(|name| quoted.get(name).cloned().unwrap_or_else(|| name.clone()))
            .filter(|name| !name.is_empty());
        names.push((id, name));
    }

    let mut taken: HashSet<String> = names.iter().filter_map(|(_, n)| n.clone()).collect();
    let mut network = Network::new();
    for (id, name) in names {
        let label = match name {
            Some(name) => name,
            None => {
                let mut label = format!("node{id}");
                while taken.contains(&label) {
                    label.push('_');
                }
                taken.insert(label.clone());
                label
            }
        };
        network.add_node(id, label);
    }
    for &id in &order {
        for &child in &phylo.get(&id)?.children {
            let length = phylo.get(&child)?.parent_edge.unwrap_or(DEFAULT_BRANCH_LENGTH);
            network.add_edge(id, child, length)?;
        }
    }

    Ok(network)
}

/// Replace every quoted label with a bare token `phylotree` reads unchanged.
///
/// Returns the rewritten text and the token to label map.
fn mask_quoted_labels(newick: &str) -> Result<(String, HashMap<String, String>)> {
    let mut prefix = String::from("qlabel");
    while newick.contains(&prefix) {
        prefix.push('x');
    }

    let mut masked = String::with_capacity(newick.len());
    let mut labels = HashMap::new();
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\'' {
            masked.push(ch);
            continue;
        }
        let mut label = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    label.push('\'');
                }
                Some('\'') => break,
                Some(c) => label.push(c),
                None => return Err(Error::Newick("unterminated quoted label".to_string())),
            }
        }
        let token = format!("{prefix}{}", labels.len());
        masked.push_str(&token);
        labels.insert(token, label);
    }

    Ok((masked, labels))
}

/// Serialise the subtree of `network` rooted at `root` as Newick.
pub fn write_newick(network: &Network, root: NodeId) -> String {
    let mut out = String::new();
    write_node(network, root, true, &mut out);
    out.push(';');
    out
}

fn write_node(network: &Network, id: NodeId, is_root: bool, out: &mut String) {
    let children = network.children(id);
    if !children.is_empty() {
        out.push('(');
        for (k, &c) in children.iter().enumerate() {
            if k > 0 {
                out.push(',');
            }
            write_node(network, c, false, out);
        }
        out.push(')');
    }

    out.push_str(&quote_label(network.label(id).unwrap_or_default()));

    if !is_root {
        if let Some(length) = network.branch_length(id) {
            out.push(':');
            out.push_str(&length.to_string());
        }
    }
}

/// Quote a label if it contains Newick metacharacters.
fn quote_label(label: &str) -> String {
    const SPECIAL: &[char] = &['(', ')', '[', ']', ':', ';', ',', '\'', ' ', '\t'];
    if label.contains(SPECIAL) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CharacterMatrix;
    use crate::tree::LineageTree;
    use std::collections::BTreeSet;

    fn edge_set(tree: &LineageTree) -> BTreeSet<(String, String, String)> {
        tree.edges()
            .unwrap()
            .into_iter()
            .map(|(p, c)| {
                (
                    tree.label(p).unwrap().to_string(),
                    tree.label(c).unwrap().to_string(),
                    format!("{:.9}", tree.branch_length(p, c).unwrap()),
                )
            })
            .collect()
    }

    fn empty_matrix() -> CharacterMatrix {
        CharacterMatrix::from_rows(Vec::new(), -1).unwrap()
    }

    #[test]
    fn test_parse_named_tree() {
        let net = parse_newick("((a:1,b:2)ab:0.5,c:3)root;").unwrap();
        let mut tree = LineageTree::new(empty_matrix());
        tree.populate(net).unwrap();

        let ab = tree.node_id("ab").unwrap();
        let a = tree.node_id("a").unwrap();
        assert_eq!(tree.label(tree.root().unwrap()).unwrap(), "root");
        assert_eq!(tree.parent(a).unwrap(), ab);
        assert_eq!(tree.age(a).unwrap(), 1.5);
        assert_eq!(tree.age(tree.node_id("c").unwrap()).unwrap(), 3.0);
        assert_eq!(tree.leaves().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_lengths_default_to_one() {
        let net = parse_newick("((a,b),c);").unwrap();
        let mut tree = LineageTree::new(empty_matrix());
        tree.populate(net).unwrap();

        assert_eq!(tree.age(tree.node_id("a").unwrap()).unwrap(), 2.0);
        assert_eq!(tree.max_depth().unwrap(), 2.0);
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let text = "(((x:0.25,y:1.75)xy:0.1,z:2)xyz:0.3,(u:0.5,v:0.125)uv:4)root;";
        let mut first = LineageTree::new(empty_matrix());
        first.populate_from_newick(text).unwrap();

        let exported = first.to_newick().unwrap();
        let mut second = LineageTree::new(empty_matrix());
        second.populate_from_newick(&exported).unwrap();

        assert_eq!(edge_set(&first), edge_set(&second));
        assert_eq!(first.nodes().unwrap().len(), second.nodes().unwrap().len());
    }

    #[test]
    fn test_quote_label() {
        assert_eq!(quote_label("cell_1"), "cell_1");
        assert_eq!(quote_label("cell 1"), "'cell 1'");
        assert_eq!(quote_label("o'k"), "'o''k'");
    }

    #[test]
    fn test_invalid_newick() {
        assert!(parse_newick("((a,b),c").is_err());
        assert!(parse_newick("(('a,b),c);").is_err());
    }

    #[test]
    fn test_quoted_labels_round_trip() {
        let matrix = CharacterMatrix::new(
            vec!["cell 1".to_string(), "o'k".to_string(), "c3".to_string()],
            vec![vec![1, 0], vec![1, 2], vec![0, 3]],
            -1,
        )
        .unwrap();
        let mut first = LineageTree::new(matrix.clone());
        first
            .populate_from_newick("(('cell 1':1,'o''k':2)'a (b)':1,c3:1)root;")
            .unwrap();
        assert_eq!(first.label(first.parent(first.node_id("o'k").unwrap()).unwrap()).unwrap(), "a (b)");

        let exported = first.to_newick().unwrap();
        let mut second = LineageTree::new(matrix.clone());
        second.populate_from_newick(&exported).unwrap();

        assert_eq!(edge_set(&first), edge_set(&second));
        for (sample, name) in matrix.names().iter().enumerate() {
            let leaf = second.node_id(name).unwrap();
            assert_eq!(second.character_states(leaf).unwrap(), matrix.row(sample));
        }
    }

    #[test]
    fn test_unnamed_nodes_beside_numeric_samples() {
        let matrix = CharacterMatrix::from_rows(
            vec![vec![1, 0], vec![1, 2], vec![0, 3], vec![0, 4]],
            -1,
        )
        .unwrap();
        let mut tree = LineageTree::new(matrix.clone());
        tree.populate_from_newick("((0,1),(2,3));").unwrap();

        assert_eq!(tree.leaves().unwrap().len(), 4);
        for (sample, name) in matrix.names().iter().enumerate() {
            let leaf = tree.node_id(name).unwrap();
            assert!(tree.is_leaf(leaf).unwrap());
            assert_eq!(tree.character_states(leaf).unwrap(), matrix.row(sample));
        }
        for node in tree.internal_nodes().unwrap() {
            assert!(matrix.index_of(tree.label(node).unwrap()).is_none());
            assert!(tree.character_states(node).unwrap().is_empty());
        }
    }

    #[test]
    fn test_unnamed_labels_skip_taken_names() {
        let net = parse_newick("((node0,node1,node2,node3,node4),node5);").unwrap();
        let mut tree = LineageTree::new(empty_matrix());
        tree.populate(net).unwrap();

        let labels: BTreeSet<String> = tree
            .nodes()
            .unwrap()
            .into_iter()
            .map(|n| tree.label(n).unwrap().to_string())
            .collect();
        assert_eq!(labels.len(), 8);
        assert_eq!(tree.leaves().unwrap().len(), 6);
    }
}

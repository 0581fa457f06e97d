//! Clean-up passes applied to a freshly solved topology.

use std::collections::HashMap;

use crate::consensus::lca_characters;
use crate::error::{Error, Result};
use crate::matrix::{CharacterMatrix, Deduplication, State};
use crate::tree::{Network, NodeId};

use super::{IdAllocator, UNIT_LENGTH, node_label};

/// Contract every internal edge along which no character changes.
///
/// Leaf states come from the matrix row named by the leaf's label; internal
/// states are inferred bottom-up with [`lca_characters`]. A child whose
/// inferred states equal its parent's is merged into the parent, its children
/// taking its place.
///
/// # Errors
/// [`Error::UnknownLabel`] if a leaf does not name a sample.
pub fn collapse_mutationless_edges(network: &mut Network, matrix: &CharacterMatrix) -> Result<()> {
    let root = network.root()?;
    let order = network.postorder(root);

    let mut states: HashMap<NodeId, Vec<State>> = HashMap::with_capacity(order.len());
    for &id in &order {
        let vector = if network.is_leaf(id) {
            let label = network.label(id).unwrap_or_default();
            let sample = matrix
                .index_of(label)
                .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
            matrix.row(sample).to_vec()
        } else {
            let children: Vec<&[State]> = network
                .children(id)
                .iter()
                .filter_map(|c| states.get(c).map(Vec::as_slice))
                .collect();
            lca_characters(&children, matrix.missing())?
        };
        states.insert(id, vector);
    }

    let mut collapsed = 0;
    for &id in &order {
        if network.is_leaf(id) {
            continue;
        }
        for child in network.children(id).to_vec() {
            if !network.is_leaf(child) && states.get(&child) == states.get(&id) {
                network.contract_edge(child)?;
                collapsed += 1;
            }
        }
    }

    log::debug!("collapsed {collapsed} mutationless edges");
    Ok(())
}

/// Put every duplicate sample back next to its representative.
///
/// Each representative leaf with duplicates is replaced by a new internal
/// node (taking over its incoming edge) whose children are the
/// representative and all of its duplicates.
pub fn attach_duplicates(
    network: &mut Network,
    dedup: &Deduplication,
    matrix: &CharacterMatrix,
    allocator: &IdAllocator,
) -> Result<()> {
    for (&representative, duplicates) in &dedup.duplicates {
        let group = allocator.next_id();
        network.insert_parent(representative, group, node_label(matrix, group), UNIT_LENGTH)?;
        for &sample in duplicates {
            network.add_node(sample, matrix.name(sample));
            network.add_edge(group, sample, UNIT_LENGTH)?;
        }
    }
    Ok(())
}

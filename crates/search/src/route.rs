//! Reconstruct synthesis routes from search nodes.

use std::collections::HashMap;
use std::ops::Range;

use routes::{MoleculeNode, ReactionNode, Route};

use crate::node::{NodeId, Reaction, Resolution, State};
use crate::tree::SearchTree;

/// Node ids from the root to `node`, inclusive.
pub fn extract_path(tree: &SearchTree, node: NodeId) -> Vec<NodeId> {
    let mut path = vec![node];
    let mut current = tree.node(node).parent();
    while let Some(id) = current {
        path.push(id);
        current = tree.node(id).parent();
    }
    path.reverse();
    path
}

/// The synthesis route leading to `node`.
///
/// The target is the root molecule; every reaction on the path breaks down
/// one molecule into its precursors. Leaves carry the stock status recorded
/// in the node's state.
pub fn extract_route(tree: &SearchTree, node: NodeId) -> Route {
    let state = tree.node(node).state();

    // Entry index of the consumed molecule -> reaction and its precursor entries
    let mut producers: HashMap<usize, (Reaction, Range<usize>)> = HashMap::new();
    for id in extract_path(tree, node).into_iter().skip(1) {
        let step = tree.node(id);
        if let Some(reaction) = step.reaction() {
            let end = step.state().len();
            let start = end - reaction.precursors.len();
            producers.insert(reaction.entry_index, (reaction.clone(), start..end));
        }
    }

    Route {
        target: build_molecule(&state, &producers, 0),
    }
}

fn build_molecule(
    state: &State,
    producers: &HashMap<usize, (Reaction, Range<usize>)>,
    index: usize,
) -> MoleculeNode {
    let entry = &state.entries()[index];
    let smiles = entry.molecule.smiles();
    let id = entry.molecule.id().as_str();
    match producers.get(&index) {
        None => MoleculeNode::leaf(smiles, id, entry.resolution == Resolution::InStock),
        Some((reaction, range)) => MoleculeNode {
            smiles: smiles.to_string(),
            id: id.to_string(),
            in_stock: false,
            reaction: Some(Box::new(ReactionNode {
                template: reaction.template.as_str().to_string(),
                probability: reaction.probability,
                filter_score: reaction.filter_score,
                precursors: range
                    .clone()
                    .map(|i| build_molecule(state, producers, i))
                    .collect(),
            })),
        },
    }
}

//! Post-search analysis: best node, ranked routes and tree statistics.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use routes::{MoleculeNode, ScoredRoute, TreeStatistics};

use chem::Molecule;

use crate::engine::{Stock, StockMetadata};
use crate::node::NodeId;
use crate::route::extract_route;
use crate::scoring::{ScoreInput, ScorerSet};
use crate::tree::SearchTree;

/// Read-only view over a finished tree.
pub struct TreeAnalysis<'a> {
    tree: &'a SearchTree,
    scorers: &'a ScorerSet,
}

impl<'a> TreeAnalysis<'a> {
    pub fn new(tree: &'a SearchTree, scorers: &'a ScorerSet) -> Self {
        Self { tree, scorers }
    }

    /// Nodes eligible for ranking with their reward, best first.
    ///
    /// Only solved nodes compete once any exist. Ties keep creation order.
    pub fn ranked_nodes(&self) -> Vec<(NodeId, f64)> {
        let nodes = self.tree.nodes();
        let any_solved = nodes.iter().any(|n| n.is_solved());
        let mut ranked: Vec<(NodeId, f64)> = nodes
            .iter()
            .filter(|n| !any_solved || n.is_solved())
            .map(|n| (n.id(), self.scorers.reward(&ScoreInput::from_node(n))))
            .collect();
        ranked.sort_by_key(|&(_, score)| Reverse(OrderedFloat(score)));
        ranked
    }

    /// The highest-ranked node (the root for an unexpanded tree).
    pub fn best_node(&self) -> NodeId {
        self.ranked_nodes().first().map_or(0, |&(id, _)| id)
    }

    /// The `min_nodes` best routes, plus any further routes tied with the last one.
    pub fn routes(&self, min_nodes: usize) -> Vec<ScoredRoute> {
        if min_nodes == 0 {
            return Vec::new();
        }
        let ranked = self.ranked_nodes();
        let mut take = min_nodes.min(ranked.len());
        if take > 0 {
            let cutoff = ranked[take - 1].1;
            while take < ranked.len() && ranked[take].1 == cutoff {
                take += 1;
            }
        }

        ranked
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(i, (id, score))| {
                let node = self.tree.node(id);
                ScoredRoute {
                    rank: i + 1,
                    node_id: id,
                    score,
                    scores: self.scorers.score_all(&ScoreInput::from_node(&node)),
                    solved: node.is_solved(),
                    route: extract_route(self.tree, id),
                }
            })
            .collect()
    }

    pub fn tree_statistics(&self) -> TreeStatistics {
        let nodes = self.tree.nodes();
        let best = self.best_node();
        let top_score = self
            .scorers
            .reward(&ScoreInput::from_node(&self.tree.node(best)));
        let route = extract_route(self.tree, best);
        let leaves = route.precursors();
        let (in_stock, not_in_stock): (Vec<&MoleculeNode>, Vec<&MoleculeNode>) =
            leaves.iter().copied().partition(|leaf| leaf.in_stock);

        TreeStatistics {
            number_of_nodes: nodes.len(),
            max_depth: nodes.iter().map(|n| n.depth()).max().unwrap_or(0),
            max_children: nodes.iter().map(|n| n.child_count()).max().unwrap_or(0),
            number_of_solved_nodes: nodes.iter().filter(|n| n.is_solved()).count(),
            is_solved: self.tree.root().is_proven(),
            top_score,
            number_of_steps: route.reaction_count(),
            number_of_precursors: leaves.len(),
            number_of_precursors_in_stock: in_stock.len(),
            precursors_in_stock: in_stock.iter().map(|m| m.smiles.clone()).collect(),
            precursors_not_in_stock: not_in_stock.iter().map(|m| m.smiles.clone()).collect(),
        }
    }

    /// Purchase information for the in-stock starting materials of the best route.
    ///
    /// Keyed by SMILES. A molecule the stock has no metadata for maps to `None`.
    pub async fn stock_info(
        &self,
        stock: &dyn Stock,
    ) -> anyhow::Result<BTreeMap<String, Option<StockMetadata>>> {
        let route = extract_route(self.tree, self.best_node());
        let mut info = BTreeMap::new();
        for leaf in route.precursors().into_iter().filter(|leaf| leaf.in_stock) {
            let molecule = Molecule::new(leaf.smiles.as_str(), leaf.id.as_str());
            info.insert(leaf.smiles.clone(), stock.metadata(&molecule).await?);
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Collaborators;
    use crate::mocks::{candidate, mol, MockChemistry, MockExpansionPolicy, MockStock};
    use crate::stock::InMemoryStock;
    use crate::tree::TreeParams;

    /// Root T with three children: t1 -> (A) solved, t2 -> (B) solved, t3 -> (X) open.
    async fn three_way_tree() -> SearchTree {
        let mut policy = MockExpansionPolicy::new();
        policy.add_response(
            "T",
            vec![candidate("t1", 0.5), candidate("t2", 0.3), candidate("t3", 0.2)],
        );
        let mut chem = MockChemistry::new();
        chem.add_reaction("t1", "T", &["A"]);
        chem.add_reaction("t2", "T", &["B"]);
        chem.add_reaction("t3", "T", &["X"]);
        let stock = MockStock::with(&["A", "B"]);
        let collab = Collaborators::new(&policy, &stock, &chem);
        let tree = SearchTree::new(mol("T"), TreeParams::default());
        tree.expand(0, &collab, 10).await.unwrap();
        tree
    }

    #[tokio::test]
    async fn test_only_solved_nodes_ranked() {
        let tree = three_way_tree().await;
        let scorers = ScorerSet::default();
        let analysis = TreeAnalysis::new(&tree, &scorers);
        let ranked: Vec<NodeId> = analysis.ranked_nodes().iter().map(|&(id, _)| id).collect();
        assert_eq!(ranked, vec![1, 2]);
        assert_eq!(analysis.best_node(), 1);
    }

    #[tokio::test]
    async fn test_routes_include_ties() {
        let tree = three_way_tree().await;
        let scorers = ScorerSet::default();
        let analysis = TreeAnalysis::new(&tree, &scorers);

        // Both solved routes score the same, so asking for one returns two
        let routes = analysis.routes(1);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].rank, 1);
        assert_eq!(routes[0].node_id, 1);
        assert_eq!(routes[1].rank, 2);
        assert!(routes.iter().all(|r| r.solved && r.route.is_solved()));
        assert!(routes[0].scores.contains_key("state score"));
        assert!(analysis.routes(0).is_empty());
    }

    #[tokio::test]
    async fn test_unsolved_tree_ranks_all_nodes() {
        let policy = MockExpansionPolicy::new();
        let chem = MockChemistry::new();
        let stock = MockStock::new();
        let tree = SearchTree::new(mol("T"), TreeParams::default());
        let collab = Collaborators::new(&policy, &stock, &chem);
        tree.expand(0, &collab, 10).await.unwrap();

        let scorers = ScorerSet::default();
        let analysis = TreeAnalysis::new(&tree, &scorers);
        let routes = analysis.routes(5);
        assert_eq!(routes.len(), 1);
        assert!(!routes[0].solved);
        assert!(routes[0].route.target.is_leaf());

        let stats = analysis.tree_statistics();
        assert_eq!(stats.number_of_precursors_in_stock, 0);
        assert_eq!(stats.precursors_not_in_stock, vec!["T".to_string()]);
        assert!(stats.precursors_in_stock.is_empty());
    }

    #[tokio::test]
    async fn test_stock_info_for_best_route() {
        let tree = three_way_tree().await;
        let scorers = ScorerSet::default();
        let analysis = TreeAnalysis::new(&tree, &scorers);

        let mut stock = InMemoryStock::new();
        stock.insert_with_metadata(
            "A",
            StockMetadata {
                price: Some(3.5),
                count: Some(10),
            },
        );
        let info = analysis.stock_info(&stock).await.unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info["A"].and_then(|m| m.price), Some(3.5));

        let plain = MockStock::with(&["A"]);
        let info = analysis.stock_info(&plain).await.unwrap();
        assert_eq!(info.get("A"), Some(&None));
    }

    #[tokio::test]
    async fn test_tree_statistics() {
        let tree = three_way_tree().await;
        tree.backpropagate(1, 0.9);
        let scorers = ScorerSet::default();
        let stats = TreeAnalysis::new(&tree, &scorers).tree_statistics();

        assert_eq!(stats.number_of_nodes, 4);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.max_children, 3);
        assert_eq!(stats.number_of_solved_nodes, 2);
        assert!(stats.is_solved);
        assert!(stats.top_score > 0.5);
        assert_eq!(stats.number_of_steps, 1);
        assert_eq!(stats.number_of_precursors, 1);
        assert_eq!(stats.number_of_precursors_in_stock, 1);
        assert_eq!(stats.precursors_in_stock, vec!["A".to_string()]);
        assert!(stats.precursors_not_in_stock.is_empty());
    }
}

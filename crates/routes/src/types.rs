//! Data types for synthesis routes, search outcomes and statistics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A molecule in a synthesis route.
///
/// Leaves have no `reaction`; inner molecules are made by exactly one reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeNode {
    /// Display representation (SMILES).
    pub smiles: String,
    /// Canonical identifier.
    pub id: String,
    /// Whether the molecule was found in stock.
    pub in_stock: bool,
    /// The reaction producing this molecule, `None` for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Box<ReactionNode>>,
}

/// A single retro reaction step inside a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionNode {
    /// Template applied to the parent molecule.
    pub template: String,
    /// Probability assigned by the expansion policy.
    pub probability: f64,
    /// Feasibility score from the filter policy, if one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_score: Option<f64>,
    /// Precursors produced, in the order the chemistry engine returned them.
    pub precursors: Vec<MoleculeNode>,
}

impl MoleculeNode {
    /// A leaf molecule without a reaction.
    pub fn leaf(smiles: impl Into<String>, id: impl Into<String>, in_stock: bool) -> Self {
        Self {
            smiles: smiles.into(),
            id: id.into(),
            in_stock,
            reaction: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.reaction.is_none()
    }

    /// All leaves below (or equal to) this molecule, depth-first, left to right.
    pub fn leaves(&self) -> Vec<&MoleculeNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a MoleculeNode>) {
        match &self.reaction {
            None => out.push(self),
            Some(reaction) => {
                for precursor in &reaction.precursors {
                    precursor.collect_leaves(out);
                }
            }
        }
    }

    /// Number of reactions below this molecule.
    pub fn reaction_count(&self) -> usize {
        match &self.reaction {
            None => 0,
            Some(reaction) => {
                1 + reaction
                    .precursors
                    .iter()
                    .map(MoleculeNode::reaction_count)
                    .sum::<usize>()
            }
        }
    }

    /// Longest chain of reactions from this molecule to a leaf.
    pub fn depth(&self) -> usize {
        match &self.reaction {
            None => 0,
            Some(reaction) => {
                1 + reaction
                    .precursors
                    .iter()
                    .map(MoleculeNode::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }
}

/// A synthesis route: the target molecule and the reactions below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub target: MoleculeNode,
}

impl Route {
    /// True when every leaf is in stock.
    pub fn is_solved(&self) -> bool {
        self.target.leaves().iter().all(|leaf| leaf.in_stock)
    }

    pub fn reaction_count(&self) -> usize {
        self.target.reaction_count()
    }

    /// Starting materials (the leaves), depth-first order.
    pub fn precursors(&self) -> Vec<&MoleculeNode> {
        self.target.leaves()
    }
}

/// A route together with its rank and scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRoute {
    /// 1-based rank. Equal scores keep node creation order.
    pub rank: usize,
    /// Arena index of the search node the route was extracted from.
    pub node_id: usize,
    /// The score used for ranking (the search reward).
    pub score: f64,
    /// Every registered scorer evaluated on the route's node.
    pub scores: BTreeMap<String, f64>,
    pub solved: bool,
    pub route: Route,
}

/// How a search run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Iteration or time limit reached.
    BudgetReached,
    /// No leaf left that could be expanded.
    Exhausted,
    /// Root became solved and the search was asked to stop on the first solution.
    Solved,
    /// Stopped by an external cancellation request.
    Cancelled,
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetReached => write!(f, "budget_reached"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Solved => write!(f, "solved"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Counters and timings collected during one search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    /// Completed iterations (including failed ones).
    pub iterations: u32,
    /// Iterations abandoned because a collaborator failed.
    pub failed_iterations: u32,
    /// Nodes that went through `expand`.
    pub expansions: u32,
    /// Child nodes attached to the tree.
    pub nodes_created: u32,
    /// Nodes resolved by stock alone, without an edge.
    pub stock_resolutions: u32,
    /// Candidates returned by the expansion policy (after cutoffs).
    pub candidates_proposed: u32,
    /// Candidates whose template did not apply.
    pub candidates_inapplicable: u32,
    /// Candidates rejected by the filter policy.
    pub candidates_filtered: u32,
    /// Molecules for which the expansion policy had nothing to propose.
    pub molecules_without_candidates: u32,
    /// Collaborator calls that failed or timed out.
    pub collaborator_failures: u32,
    /// Set when the search stopped on its first solution.
    pub returned_first: bool,
    /// Iteration in which the root first became solved.
    pub first_solution_iteration: Option<u32>,
    /// Wall-clock time of the whole search in milliseconds.
    pub wall_time_ms: u64,
    /// Cumulative time in the expansion policy.
    pub total_policy_time_ms: u64,
    /// Cumulative time in the chemistry engine.
    pub total_chemistry_time_ms: u64,
    /// Cumulative time in the filter policy.
    pub total_filter_time_ms: u64,
    /// Cumulative time in stock lookups.
    pub total_stock_time_ms: u64,
    /// Expansion policy cache hits, when the policy is cached.
    pub cache_hits: u32,
    /// Expansion policy cache misses, when the policy is cached.
    pub cache_misses: u32,
}

/// Summary of a finished search tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStatistics {
    pub number_of_nodes: usize,
    /// Deepest node, in reactions from the root.
    pub max_depth: u32,
    pub max_children: usize,
    pub number_of_solved_nodes: usize,
    pub is_solved: bool,
    /// Reward of the best node.
    pub top_score: f64,
    /// Reactions in the best route.
    pub number_of_steps: usize,
    pub number_of_precursors: usize,
    pub number_of_precursors_in_stock: usize,
    pub precursors_in_stock: Vec<String>,
    pub precursors_not_in_stock: Vec<String>,
}

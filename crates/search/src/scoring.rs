//! Node scorers and the search reward.
//!
//! Every scorer maps a node's state to a number. The combined
//! [`StateScore`] is the reward used during search and for ranking routes
//! afterwards; the other built-ins are reported alongside it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ScorerWeights;
use crate::node::{SearchNode, State};

/// What a scorer sees of a node.
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub state: State,
    /// Reactions between the root and the node.
    pub reactions: usize,
}

impl ScoreInput {
    pub fn new(state: State) -> Self {
        let reactions = state.expanded_count();
        Self { state, reactions }
    }

    pub fn from_node(node: &SearchNode) -> Self {
        Self::new(node.state())
    }

    pub fn is_solved(&self) -> bool {
        self.state.is_solved()
    }
}

/// A named metric over a node.
pub trait Scorer: Send + Sync {
    /// Name the score is reported under.
    fn name(&self) -> &str;

    fn score(&self, input: &ScoreInput) -> f64;

    /// Ranking direction. Most scores are "higher is better".
    fn higher_is_better(&self) -> bool {
        true
    }
}

pub struct NumberOfReactions;

impl Scorer for NumberOfReactions {
    fn name(&self) -> &str {
        "number of reactions"
    }

    fn score(&self, input: &ScoreInput) -> f64 {
        input.reactions as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

pub struct FractionInStock;

impl Scorer for FractionInStock {
    fn name(&self) -> &str {
        "fraction in stock"
    }

    fn score(&self, input: &ScoreInput) -> f64 {
        input.state.fraction_in_stock()
    }
}

/// Leaves of the route, in stock or not.
pub struct NumberOfPrecursors;

impl Scorer for NumberOfPrecursors {
    fn name(&self) -> &str {
        "number of precursors"
    }

    fn score(&self, input: &ScoreInput) -> f64 {
        input.state.leaves().count() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }
}

pub struct NumberOfPrecursorsInStock;

impl Scorer for NumberOfPrecursorsInStock {
    fn name(&self) -> &str {
        "number of precursors in stock"
    }

    fn score(&self, input: &ScoreInput) -> f64 {
        input.state.in_stock_count() as f64
    }
}

/// Weighted combination of stock coverage and route length.
///
/// `c = (w_s * fraction_in_stock + w_r / (1 + reactions)) / (w_s + w_r)`
/// lies in `[0, 1]`. Solved states score `0.5 + 0.5 c`, others `0.5 c`, so
/// any solved state outranks any unsolved one.
#[derive(Debug, Clone, Copy)]
pub struct StateScore {
    weights: ScorerWeights,
}

impl StateScore {
    pub const NAME: &'static str = "state score";

    pub fn new(weights: ScorerWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScorerWeights {
        self.weights
    }

    fn combined(&self, input: &ScoreInput) -> f64 {
        let ScorerWeights { in_stock, reactions } = self.weights;
        let total = in_stock + reactions;
        if total <= 0.0 {
            return 0.0;
        }
        let length_term = 1.0 / (1.0 + input.reactions as f64);
        (in_stock * input.state.fraction_in_stock() + reactions * length_term) / total
    }
}

impl Scorer for StateScore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn score(&self, input: &ScoreInput) -> f64 {
        let c = self.combined(input);
        if input.is_solved() {
            0.5 + 0.5 * c
        } else {
            0.5 * c
        }
    }
}

/// Named scorers plus the reward function.
#[derive(Clone)]
pub struct ScorerSet {
    reward: StateScore,
    scorers: BTreeMap<String, Arc<dyn Scorer>>,
}

impl ScorerSet {
    /// The built-in scorers with the given reward weights.
    pub fn with_weights(weights: ScorerWeights) -> Self {
        let reward = StateScore::new(weights);
        let mut set = Self {
            reward,
            scorers: BTreeMap::new(),
        };
        set.register(Arc::new(reward));
        set.register(Arc::new(NumberOfReactions));
        set.register(Arc::new(FractionInStock));
        set.register(Arc::new(NumberOfPrecursors));
        set.register(Arc::new(NumberOfPrecursorsInStock));
        set
    }

    /// Add a scorer, replacing any scorer with the same name.
    ///
    /// The reward is always the built-in state score.
    pub fn register(&mut self, scorer: Arc<dyn Scorer>) {
        self.scorers.insert(scorer.name().to_string(), scorer);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Scorer>> {
        self.scorers.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.scorers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }

    /// Search reward of a node's state.
    pub fn reward(&self, input: &ScoreInput) -> f64 {
        self.reward.score(input)
    }

    pub fn score_all(&self, input: &ScoreInput) -> BTreeMap<String, f64> {
        self.scorers
            .iter()
            .map(|(name, scorer)| (name.clone(), scorer.score(input)))
            .collect()
    }
}

impl Default for ScorerSet {
    fn default() -> Self {
        Self::with_weights(ScorerWeights::default())
    }
}

impl fmt::Debug for ScorerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScorerSet")
            .field("reward", &self.reward)
            .field("scorers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chem::Molecule;

    fn mol(s: &str) -> Molecule {
        Molecule::from_canonical(s)
    }

    fn input(precursors: &[(&str, bool)]) -> ScoreInput {
        let flagged: Vec<(Molecule, bool)> =
            precursors.iter().map(|(s, hit)| (mol(s), *hit)).collect();
        ScoreInput::new(State::target(mol("T")).apply_reaction(0, &flagged))
    }

    #[test]
    fn test_builtin_names() {
        let set = ScorerSet::default();
        assert_eq!(
            set.names(),
            vec![
                "fraction in stock",
                "number of precursors",
                "number of precursors in stock",
                "number of reactions",
                "state score",
            ]
        );
        assert!(!set.get("number of reactions").unwrap().higher_is_better());
        assert!(set.get("fraction in stock").unwrap().higher_is_better());
    }

    #[test]
    fn test_score_all_values() {
        let set = ScorerSet::default();
        let scores = set.score_all(&input(&[("A", true), ("B", false)]));
        assert_eq!(scores["number of reactions"], 1.0);
        assert!((scores["fraction in stock"] - 0.5).abs() < 1e-9);
        assert_eq!(scores["number of precursors"], 2.0);
        assert_eq!(scores["number of precursors in stock"], 1.0);
    }

    #[test]
    fn test_reward_formula() {
        let set = ScorerSet::with_weights(ScorerWeights {
            in_stock: 0.5,
            reactions: 0.5,
        });
        // Unsolved: c = (0.5 * 0.5 + 0.5 * 0.5) / 1.0 = 0.5
        let unsolved = set.reward(&input(&[("A", true), ("B", false)]));
        assert!((unsolved - 0.25).abs() < 1e-9);
        // Solved: c = (0.5 * 1.0 + 0.5 * 0.5) / 1.0 = 0.75
        let solved = set.reward(&input(&[("A", true), ("B", true)]));
        assert!((solved - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_solved_outranks_unsolved_for_any_weights() {
        let cases = [(1.0, 0.0), (0.0, 1.0), (0.95, 0.05), (0.01, 100.0)];
        for (in_stock, reactions) in cases {
            let set = ScorerSet::with_weights(ScorerWeights { in_stock, reactions });
            // Longest solved route vs. the best unsolved state
            let long_solved = ScoreInput::new(
                State::target(mol("T"))
                    .apply_reaction(0, &[(mol("I"), false)])
                    .apply_reaction(1, &[(mol("J"), false)])
                    .apply_reaction(2, &[(mol("A"), true)]),
            );
            let root = ScoreInput::new(State::target(mol("T")));
            let almost = input(&[("A", true), ("B", true), ("C", false)]);
            let solved = set.reward(&long_solved);
            assert!(solved > set.reward(&root), "weights {in_stock}/{reactions}");
            assert!(solved > set.reward(&almost), "weights {in_stock}/{reactions}");
            assert!(solved > 0.5);
        }
    }

    #[test]
    fn test_shorter_solved_route_scores_higher() {
        let set = ScorerSet::default();
        let short = input(&[("A", true)]);
        let long = ScoreInput::new(
            State::target(mol("T"))
                .apply_reaction(0, &[(mol("I"), false)])
                .apply_reaction(1, &[(mol("A"), true)]),
        );
        assert_eq!(long.reactions, 2);
        assert!(set.reward(&short) > set.reward(&long));
    }

    struct ConstantScorer;

    impl Scorer for ConstantScorer {
        fn name(&self) -> &str {
            "constant"
        }

        fn score(&self, _input: &ScoreInput) -> f64 {
            42.0
        }
    }

    #[test]
    fn test_register_custom_scorer() {
        let mut set = ScorerSet::default();
        set.register(Arc::new(ConstantScorer));
        assert_eq!(set.len(), 6);
        let scores = set.score_all(&input(&[("A", true)]));
        assert_eq!(scores["constant"], 42.0);
    }
}

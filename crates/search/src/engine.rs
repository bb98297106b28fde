//! Monte Carlo tree search controller and the collaborator contracts.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};

use chem::{ChemistryEngine, Molecule, TemplateId};
use routes::{RouteRecord, ScoredRoute, SearchOutcome, SearchStats};

use crate::analysis::TreeAnalysis;
use crate::config::SearchConfig;
use crate::node::NodeId;
use crate::scoring::{ScoreInput, ScorerSet};
use crate::tree::{ExpansionReport, SearchTree, TreeParams};

/// Errors that can occur during route search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The configuration cannot be searched with.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A collaborator failed or timed out.
    #[error("{collaborator} unavailable: {source}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        #[source]
        source: anyhow::Error,
    },
    /// The search was cancelled while the operation was in flight.
    #[error("Search cancelled")]
    Cancelled,
    /// `search_one` was called while another search was running on this engine.
    #[error("A search is already running on this engine")]
    AlreadyRunning,
}

/// The pluggable services the search calls out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    ExpansionPolicy,
    FilterPolicy,
    Stock,
    ChemistryEngine,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpansionPolicy => write!(f, "expansion policy"),
            Self::FilterPolicy => write!(f, "filter policy"),
            Self::Stock => write!(f, "stock"),
            Self::ChemistryEngine => write!(f, "chemistry engine"),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A reaction template proposed for a molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionCandidate {
    pub template: TemplateId,
    /// Policy probability in `[0, 1]`.
    pub probability: f64,
}

impl ReactionCandidate {
    pub fn new(template: impl AsRef<str>, probability: f64) -> Self {
        Self {
            template: TemplateId::new(template),
            probability,
        }
    }
}

/// Purchase information for an in-stock molecule.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StockMetadata {
    pub price: Option<f64>,
    pub count: Option<u64>,
}

/// Proposes reaction templates for a molecule.
#[async_trait]
pub trait ExpansionPolicy: Send + Sync {
    /// Up to `max` candidates, ordered by decreasing probability.
    async fn propose(&self, molecule: &Molecule, max: usize)
        -> anyhow::Result<Vec<ReactionCandidate>>;

    /// `(hits, misses)` for policies that cache their answers.
    fn cache_stats(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Scores the feasibility of an applied reaction.
#[async_trait]
pub trait FilterPolicy: Send + Sync {
    /// Feasibility in `[0, 1]`; compared against the filter cutoff.
    async fn accept(
        &self,
        template: &TemplateId,
        product: &Molecule,
        precursors: &[Molecule],
    ) -> anyhow::Result<f64>;
}

/// Answers whether a molecule is a purchasable starting material.
#[async_trait]
pub trait Stock: Send + Sync {
    async fn contains(&self, molecule: &Molecule) -> anyhow::Result<bool>;

    async fn metadata(&self, _molecule: &Molecule) -> anyhow::Result<Option<StockMetadata>> {
        Ok(None)
    }
}

/// The collaborators injected into one search.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub expansion: &'a dyn ExpansionPolicy,
    pub filter: Option<&'a dyn FilterPolicy>,
    pub stock: &'a dyn Stock,
    pub chemistry: &'a dyn ChemistryEngine,
}

impl<'a> Collaborators<'a> {
    /// Collaborators without a filter policy (every reaction is accepted).
    pub fn new(
        expansion: &'a dyn ExpansionPolicy,
        stock: &'a dyn Stock,
        chemistry: &'a dyn ChemistryEngine,
    ) -> Self {
        Self {
            expansion,
            filter: None,
            stock,
            chemistry,
        }
    }

    pub fn with_filter(mut self, filter: &'a dyn FilterPolicy) -> Self {
        self.filter = Some(filter);
        self
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared with a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Ask the search to stop. Takes effect at the next check point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Whether the engine is currently searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Running,
}

/// Clears the running flag when a search ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// SearchEngine
// ---------------------------------------------------------------------------

/// Monte Carlo tree search over synthesis states.
///
/// Each iteration selects a leaf by UCT, expands it, scores the most
/// promising new child and backpropagates the reward. With
/// `expansion_workers > 1` several distinct leaves are expanded
/// concurrently per round; scoring and backpropagation stay serial.
#[derive(Clone)]
pub struct SearchEngine {
    config: SearchConfig,
    scorers: Arc<ScorerSet>,
    running: Arc<AtomicBool>,
    cancel: CancelHandle,
}

/// Outcome of one leaf's expansion within a round.
struct Iteration {
    leaf: NodeId,
    evaluate: NodeId,
    reports: Vec<ExpansionReport>,
    error: Option<SearchError>,
}

/// Collaborator time accumulated over a search.
#[derive(Default)]
struct Timings {
    policy: Duration,
    chemistry: Duration,
    filter: Duration,
    stock: Duration,
}

impl SearchEngine {
    /// Create a new engine, rejecting invalid configurations.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let scorers = Arc::new(ScorerSet::with_weights(config.weights));
        Ok(Self {
            config,
            scorers,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancelHandle::default(),
        })
    }

    /// Replace the scorer set used for reporting.
    pub fn with_scorers(mut self, scorers: ScorerSet) -> Self {
        self.scorers = Arc::new(scorers);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn scorers(&self) -> &ScorerSet {
        &self.scorers
    }

    /// Handle that cancels the current (or next) search.
    ///
    /// A cancel issued while idle is cleared when the next search starts.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn phase(&self) -> EnginePhase {
        if self.running.load(Ordering::Acquire) {
            EnginePhase::Running
        } else {
            EnginePhase::Idle
        }
    }

    /// Search for synthesis routes of a single target molecule.
    ///
    /// Collaborator failures never abort the search: the affected iteration
    /// is counted as failed and the loop continues.
    pub async fn search_one(
        &self,
        target: Molecule,
        collab: &Collaborators<'_>,
    ) -> Result<SearchRun, SearchError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(SearchError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);
        self.cancel.reset();

        let start_time = Instant::now();
        let params = TreeParams::from_config(&self.config, &target);
        let tree = SearchTree::with_cancel(target.clone(), params, self.cancel.clone());
        let mut stats = SearchStats::default();
        let mut timings = Timings::default();
        let cache_before = collab.expansion.cache_stats();

        tracing::info!(
            molecule = %target,
            iteration_limit = self.config.iteration_limit,
            time_limit_s = self.config.time_limit_secs,
            workers = self.config.expansion_workers,
            "Starting route search"
        );

        let pb = self.progress_bar();

        let outcome = loop {
            if let Some(outcome) = self.check_termination(&tree, stats.iterations, start_time) {
                break outcome;
            }

            let remaining = (self.config.iteration_limit - stats.iterations) as usize;
            let width = self.config.expansion_workers.min(remaining);
            let mut busy = HashSet::new();
            let mut leaves = Vec::with_capacity(width);
            for _ in 0..width {
                match tree.select_leaf_excluding(&busy) {
                    Some(leaf) => {
                        busy.insert(leaf);
                        leaves.push(leaf);
                    }
                    None => break,
                }
            }

            let results = join_all(
                leaves
                    .iter()
                    .map(|&leaf| self.run_iteration(&tree, leaf, collab)),
            )
            .await;

            for it in results {
                for report in &it.reports {
                    absorb_report(&mut stats, &mut timings, report);
                }
                match it.error {
                    Some(SearchError::Cancelled) => continue,
                    Some(err) => {
                        stats.iterations += 1;
                        stats.failed_iterations += 1;
                        stats.collaborator_failures += 1;
                        tracing::warn!(leaf = it.leaf, error = %err, "Iteration failed");
                    }
                    None => {
                        stats.iterations += 1;
                        let reward = self
                            .scorers
                            .reward(&ScoreInput::from_node(&tree.node(it.evaluate)));
                        tree.backpropagate(it.evaluate, reward);
                    }
                }
                pb.inc(1);

                if stats.first_solution_iteration.is_none() && tree.root().is_proven() {
                    stats.first_solution_iteration = Some(stats.iterations);
                    tracing::info!(
                        molecule = %target,
                        iteration = stats.iterations,
                        nodes = tree.len(),
                        "First solution found"
                    );
                }
            }
        };

        pb.finish_with_message(outcome.to_string());

        stats.returned_first = outcome == SearchOutcome::Solved;
        stats.nodes_created = tree.len().saturating_sub(1) as u32;
        stats.wall_time_ms = start_time.elapsed().as_millis() as u64;
        stats.total_policy_time_ms = timings.policy.as_millis() as u64;
        stats.total_chemistry_time_ms = timings.chemistry.as_millis() as u64;
        stats.total_filter_time_ms = timings.filter.as_millis() as u64;
        stats.total_stock_time_ms = timings.stock.as_millis() as u64;
        if let Some((hits, misses)) = collab.expansion.cache_stats() {
            let (hits0, misses0) = cache_before.unwrap_or((0, 0));
            stats.cache_hits = hits.saturating_sub(hits0);
            stats.cache_misses = misses.saturating_sub(misses0);
        }

        tracing::info!(
            molecule = %target,
            outcome = %outcome,
            iterations = stats.iterations,
            failed = stats.failed_iterations,
            nodes = tree.len(),
            solved = tree.root().is_proven(),
            time_ms = stats.wall_time_ms,
            "Route search finished"
        );

        Ok(SearchRun {
            target,
            tree,
            outcome,
            stats,
            scorers: Arc::clone(&self.scorers),
        })
    }

    /// First matching stop condition, in priority order.
    fn check_termination(
        &self,
        tree: &SearchTree,
        iterations: u32,
        start_time: Instant,
    ) -> Option<SearchOutcome> {
        if self.cancel.is_cancelled() {
            tracing::info!(iterations, "Search cancelled");
            return Some(SearchOutcome::Cancelled);
        }
        if iterations >= self.config.iteration_limit {
            return Some(SearchOutcome::BudgetReached);
        }
        if start_time.elapsed() >= self.config.time_limit() {
            tracing::info!(
                elapsed_s = start_time.elapsed().as_secs_f64(),
                iterations,
                "Search timed out"
            );
            return Some(SearchOutcome::BudgetReached);
        }
        if self.config.stop_on_first_solution && tree.root().is_proven() {
            return Some(SearchOutcome::Solved);
        }
        if tree.open_leaves() == 0 {
            return Some(SearchOutcome::Exhausted);
        }
        None
    }

    /// Expand `leaf` (plus the rollout steps) and pick the node to score.
    async fn run_iteration(
        &self,
        tree: &SearchTree,
        leaf: NodeId,
        collab: &Collaborators<'_>,
    ) -> Iteration {
        let mut it = Iteration {
            leaf,
            evaluate: leaf,
            reports: Vec::new(),
            error: None,
        };
        let mut current = leaf;
        for step in 0..=self.config.rollout_depth {
            if step > 0 {
                match tree.promising_child(current) {
                    Some(next) if !tree.is_terminal(next) => current = next,
                    _ => break,
                }
            }
            if tree.is_terminal(current) {
                break;
            }
            match tree
                .expand(current, collab, self.config.max_candidates)
                .await
            {
                Ok(report) => it.reports.push(report),
                Err(err) => {
                    it.error = Some(err);
                    return it;
                }
            }
        }
        it.evaluate = tree.promising_child(current).unwrap_or(current);
        it
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.config.iteration_limit as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .expect("valid progress bar template")
                .progress_chars("=> "),
        );
        pb
    }
}

fn absorb_report(stats: &mut SearchStats, timings: &mut Timings, report: &ExpansionReport) {
    if !report.skipped {
        stats.expansions += 1;
    }
    if report.resolved_by_stock {
        stats.stock_resolutions += 1;
    }
    stats.candidates_proposed += report.candidates_proposed as u32;
    stats.candidates_inapplicable += report.candidates_inapplicable as u32;
    stats.candidates_filtered += report.candidates_filtered as u32;
    stats.molecules_without_candidates += report.molecules_without_candidates as u32;
    stats.collaborator_failures += report.collaborator_failures as u32;
    timings.policy += report.policy_time;
    timings.chemistry += report.chemistry_time;
    timings.filter += report.filter_time;
    timings.stock += report.stock_time;
}

// ---------------------------------------------------------------------------
// SearchRun
// ---------------------------------------------------------------------------

/// A finished search: the tree, how it ended and its counters.
pub struct SearchRun {
    pub target: Molecule,
    pub tree: SearchTree,
    pub outcome: SearchOutcome,
    pub stats: SearchStats,
    scorers: Arc<ScorerSet>,
}

impl SearchRun {
    /// Whether some node of the tree is solved (a complete route exists).
    pub fn is_solved(&self) -> bool {
        self.tree.root().is_proven()
    }

    pub fn scorers(&self) -> &ScorerSet {
        &self.scorers
    }

    pub fn analysis(&self) -> TreeAnalysis<'_> {
        TreeAnalysis::new(&self.tree, &self.scorers)
    }

    /// Highest-reward node, preferring solved nodes.
    pub fn best_node(&self) -> NodeId {
        self.analysis().best_node()
    }

    /// Top-ranked routes, at least `min_nodes` when available plus ties.
    pub fn routes(&self, min_nodes: usize) -> Vec<ScoredRoute> {
        self.analysis().routes(min_nodes)
    }

    /// Serializable summary for a `RouteWriter`.
    pub fn to_record(&self, min_nodes: usize) -> RouteRecord {
        let analysis = self.analysis();
        RouteRecord {
            target: self.target.smiles().to_string(),
            outcome: self.outcome,
            stats: self.stats.clone(),
            statistics: Some(analysis.tree_statistics()),
            routes: analysis.routes(min_nodes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{candidate, mol, MockChemistry, MockExpansionPolicy, MockStock};

    fn one_step_fixture() -> (MockExpansionPolicy, MockChemistry, MockStock) {
        let mut policy = MockExpansionPolicy::new();
        policy.add_response("T", vec![candidate("t1", 0.9)]);
        let mut chem = MockChemistry::new();
        chem.add_reaction("t1", "T", &["A", "B"]);
        (policy, chem, MockStock::with(&["A", "B"]))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SearchConfig {
            exploration_constant: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            SearchEngine::new(config),
            Err(SearchError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_search_finds_one_step_route() {
        let (policy, chem, stock) = one_step_fixture();
        let collab = Collaborators::new(&policy, &stock, &chem);
        let engine = SearchEngine::new(SearchConfig::default()).unwrap();

        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert!(run.is_solved());
        assert_eq!(run.outcome, SearchOutcome::Exhausted);
        assert_eq!(run.stats.iterations, 1);
        assert_eq!(run.stats.first_solution_iteration, Some(1));
        assert_eq!(run.stats.nodes_created, 1);
        assert_eq!(run.best_node(), 1);
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[tokio::test]
    async fn test_stop_on_first_solution() {
        let mut policy = MockExpansionPolicy::new();
        policy.add_response("T", vec![candidate("t1", 0.5), candidate("t2", 0.5)]);
        policy.add_response("C", vec![candidate("t3", 1.0)]);
        let mut chem = MockChemistry::new();
        chem.add_reaction("t1", "T", &["A"]);
        chem.add_reaction("t2", "T", &["C"]);
        chem.add_reaction("t3", "C", &["D"]);
        let stock = MockStock::with(&["A"]);
        let collab = Collaborators::new(&policy, &stock, &chem);

        let config = SearchConfig {
            stop_on_first_solution: true,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.outcome, SearchOutcome::Solved);
        assert!(run.stats.returned_first);
        assert_eq!(run.stats.iterations, 1);
    }

    #[tokio::test]
    async fn test_iteration_budget() {
        let policy = MockExpansionPolicy::with_default(vec![candidate("grow", 1.0)]);
        let chem = MockChemistry::generative();
        let stock = MockStock::new();
        let collab = Collaborators::new(&policy, &stock, &chem);

        let config = SearchConfig {
            iteration_limit: 5,
            max_transforms: 20,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.outcome, SearchOutcome::BudgetReached);
        assert_eq!(run.stats.iterations, 5);
        assert!(!run.is_solved());
        assert_eq!(run.tree.root().visits(), 5);
    }

    #[tokio::test]
    async fn test_dead_end_exhausts() {
        let policy = MockExpansionPolicy::new();
        let chem = MockChemistry::new();
        let stock = MockStock::new();
        let collab = Collaborators::new(&policy, &stock, &chem);

        let engine = SearchEngine::new(SearchConfig::default()).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.outcome, SearchOutcome::Exhausted);
        assert_eq!(run.stats.molecules_without_candidates, 1);
        assert_eq!(run.tree.len(), 1);
    }

    #[tokio::test]
    async fn test_policy_failures_are_counted_not_returned() {
        let mut policy = MockExpansionPolicy::new();
        policy.fail_on("T");
        let chem = MockChemistry::new();
        let stock = MockStock::new();
        let collab = Collaborators::new(&policy, &stock, &chem);

        let config = SearchConfig {
            iteration_limit: 3,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.outcome, SearchOutcome::BudgetReached);
        assert_eq!(run.stats.iterations, 3);
        assert_eq!(run.stats.failed_iterations, 3);
        assert_eq!(run.stats.collaborator_failures, 3);
        assert_eq!(run.tree.root().visits(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_search_is_cleared() {
        let (policy, chem, stock) = one_step_fixture();
        let collab = Collaborators::new(&policy, &stock, &chem);
        let engine = SearchEngine::new(SearchConfig::default()).unwrap();

        engine.cancel_handle().cancel();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_ne!(run.outcome, SearchOutcome::Cancelled);
        assert!(run.is_solved());
    }

    #[tokio::test]
    async fn test_concurrent_search_rejected() {
        let policy = MockExpansionPolicy::with_default(vec![candidate("grow", 1.0)])
            .with_delay(Duration::from_millis(20));
        let chem = MockChemistry::generative();
        let stock = MockStock::new();
        let collab = Collaborators::new(&policy, &stock, &chem);
        let config = SearchConfig {
            iteration_limit: 3,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();

        let (first, second) = tokio::join!(
            engine.search_one(mol("T"), &collab),
            engine.search_one(mol("U"), &collab),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(SearchError::AlreadyRunning)));
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[tokio::test]
    async fn test_rollout_expands_deeper() {
        let mut policy = MockExpansionPolicy::new();
        policy.add_response("T", vec![candidate("t1", 1.0)]);
        policy.add_response("I", vec![candidate("t2", 1.0)]);
        let mut chem = MockChemistry::new();
        chem.add_reaction("t1", "T", &["I"]);
        chem.add_reaction("t2", "I", &["A"]);
        let stock = MockStock::with(&["A"]);
        let collab = Collaborators::new(&policy, &stock, &chem);

        let config = SearchConfig {
            iteration_limit: 1,
            rollout_depth: 1,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.stats.expansions, 2);
        assert_eq!(run.tree.len(), 3);
        assert!(run.is_solved());
        // Reward flowed from the solved grandchild
        assert_eq!(run.tree.node(2).visits(), 1);
    }

    #[tokio::test]
    async fn test_parallel_workers_expand_distinct_leaves() {
        let policy = MockExpansionPolicy::with_default(vec![
            candidate("a", 0.4),
            candidate("b", 0.3),
            candidate("c", 0.3),
        ]);
        let chem = MockChemistry::generative();
        let stock = MockStock::new();
        let collab = Collaborators::new(&policy, &stock, &chem);

        let config = SearchConfig {
            iteration_limit: 12,
            expansion_workers: 3,
            max_transforms: 3,
            ..Default::default()
        };
        let engine = SearchEngine::new(config).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();
        assert_eq!(run.stats.iterations, 12);
        assert_eq!(run.tree.root().visits(), 12);
        // A node expanded twice would hold six children
        for node in run.tree.nodes() {
            assert!(node.child_count() <= 3);
        }
    }

    #[tokio::test]
    async fn test_to_record_summarizes_run() {
        let (policy, chem, stock) = one_step_fixture();
        let collab = Collaborators::new(&policy, &stock, &chem);
        let engine = SearchEngine::new(SearchConfig::default()).unwrap();
        let run = engine.search_one(mol("T"), &collab).await.unwrap();

        let record = run.to_record(5);
        assert_eq!(record.target, "T");
        assert_eq!(record.outcome, SearchOutcome::Exhausted);
        assert_eq!(record.routes.len(), 1);
        assert!(record.routes[0].solved);
        let statistics = record.statistics.unwrap();
        assert!(statistics.is_solved);
        assert_eq!(statistics.number_of_steps, 1);
    }
}

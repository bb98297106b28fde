use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::engine::SearchError;

/// Weights of the combined "state score" used as search reward.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ScorerWeights {
    /// Weight of the fraction of leaf molecules in stock.
    #[serde(default = "default_in_stock_weight")]
    pub in_stock: f64,

    /// Weight of the reaction-count term `1 / (1 + reactions)`.
    #[serde(default = "default_reactions_weight")]
    pub reactions: f64,
}

fn default_in_stock_weight() -> f64 {
    0.95
}
fn default_reactions_weight() -> f64 {
    0.05
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            in_stock: default_in_stock_weight(),
            reactions: default_reactions_weight(),
        }
    }
}

/// Search configuration loaded from TOML.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct SearchConfig {
    /// Exploration constant `C` of the UCT formula.
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,

    /// Maximum number of search iterations.
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: u32,

    /// Maximum wall-clock seconds per target.
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f64,

    /// Maximum number of expansion candidates used per policy call.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Stop taking candidates once their cumulative probability reaches this value.
    #[serde(default = "default_cutoff_cumulative")]
    pub cutoff_cumulative: f64,

    /// Filter policy scores below this value reject a candidate.
    #[serde(default = "default_filter_cutoff")]
    pub filter_cutoff: f64,

    /// End the search as soon as the root is solved.
    #[serde(default)]
    pub stop_on_first_solution: bool,

    /// Maximum number of reactions from the target (tree depth).
    #[serde(default = "default_max_transforms")]
    pub max_transforms: u32,

    /// Treat the target as not purchasable even if the stock contains it.
    #[serde(default)]
    pub exclude_target_from_stock: bool,

    /// Mean reward assumed for a child that has never been visited.
    #[serde(default = "default_optimistic_value")]
    pub optimistic_value: f64,

    /// Extra expansions of the most promising child before scoring a leaf.
    ///
    /// The default of 0 scores the first promising child directly. A full
    /// rollout to a terminal node, as classic retrosynthesis MCTS does on
    /// every iteration, needs a value of at least `max_transforms`.
    #[serde(default)]
    pub rollout_depth: u32,

    /// Number of leaves expanded concurrently per round.
    #[serde(default = "default_expansion_workers")]
    pub expansion_workers: usize,

    /// Per-call timeout for collaborators in seconds (0 disables it).
    #[serde(default)]
    pub collaborator_timeout_secs: f64,

    /// Show a progress bar over iterations.
    #[serde(default)]
    pub show_progress: bool,

    /// Weights of the search reward.
    #[serde(default)]
    pub weights: ScorerWeights,
}

fn default_exploration_constant() -> f64 {
    1.4
}
fn default_iteration_limit() -> u32 {
    100
}
fn default_time_limit() -> f64 {
    120.0
}
fn default_max_candidates() -> usize {
    50
}
fn default_cutoff_cumulative() -> f64 {
    0.995
}
fn default_filter_cutoff() -> f64 {
    0.05
}
fn default_max_transforms() -> u32 {
    6
}
fn default_optimistic_value() -> f64 {
    1.0
}
fn default_expansion_workers() -> usize {
    1
}

impl SearchConfig {
    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |msg: String| Err(SearchError::InvalidConfiguration(msg));

        if !(self.exploration_constant.is_finite() && self.exploration_constant >= 0.0) {
            return invalid(format!(
                "exploration_constant must be finite and >= 0, got {}",
                self.exploration_constant
            ));
        }
        if !(self.time_limit_secs.is_finite() && self.time_limit_secs >= 0.0) {
            return invalid(format!(
                "time_limit_secs must be finite and >= 0, got {}",
                self.time_limit_secs
            ));
        }
        if self.iteration_limit == 0 && self.time_limit_secs == 0.0 {
            return invalid("iteration_limit and time_limit_secs must not both be zero".into());
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates must be > 0".into());
        }
        if !(self.cutoff_cumulative > 0.0 && self.cutoff_cumulative <= 1.0) {
            return invalid(format!(
                "cutoff_cumulative must be in (0, 1], got {}",
                self.cutoff_cumulative
            ));
        }
        if !(0.0..=1.0).contains(&self.filter_cutoff) {
            return invalid(format!(
                "filter_cutoff must be in [0, 1], got {}",
                self.filter_cutoff
            ));
        }
        if self.max_transforms == 0 {
            return invalid("max_transforms must be > 0".into());
        }
        if !self.optimistic_value.is_finite() {
            return invalid("optimistic_value must be finite".into());
        }
        if self.expansion_workers == 0 {
            return invalid("expansion_workers must be > 0".into());
        }
        if !(self.collaborator_timeout_secs.is_finite() && self.collaborator_timeout_secs >= 0.0) {
            return invalid(format!(
                "collaborator_timeout_secs must be finite and >= 0, got {}",
                self.collaborator_timeout_secs
            ));
        }

        let w = self.weights;
        for (name, value) in [("in_stock", w.in_stock), ("reactions", w.reactions)] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("weights.{name} must be finite and >= 0, got {value}"));
            }
        }
        if w.in_stock + w.reactions <= 0.0 {
            return invalid("scorer weights must not both be zero".into());
        }
        if w.in_stock == 0.0 || w.reactions == 0.0 {
            tracing::warn!(
                in_stock = w.in_stock,
                reactions = w.reactions,
                "one scorer weight is zero; the reward ignores that term"
            );
        }
        Ok(())
    }

    /// Wall-clock budget per target. Zero ends the search before the first iteration.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs)
    }

    /// Collaborator timeout, `None` when disabled.
    pub fn collaborator_timeout(&self) -> Option<Duration> {
        (self.collaborator_timeout_secs > 0.0)
            .then(|| Duration::from_secs_f64(self.collaborator_timeout_secs))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exploration_constant: default_exploration_constant(),
            iteration_limit: default_iteration_limit(),
            time_limit_secs: default_time_limit(),
            max_candidates: default_max_candidates(),
            cutoff_cumulative: default_cutoff_cumulative(),
            filter_cutoff: default_filter_cutoff(),
            stop_on_first_solution: false,
            max_transforms: default_max_transforms(),
            exclude_target_from_stock: false,
            optimistic_value: default_optimistic_value(),
            rollout_depth: 0,
            expansion_workers: default_expansion_workers(),
            collaborator_timeout_secs: 0.0,
            show_progress: false,
            weights: ScorerWeights::default(),
        }
    }
}

/// Load, deserialize and validate a `SearchConfig` from a TOML file.
pub fn load_search_config(path: &Path) -> anyhow::Result<SearchConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading search config {}", path.display()))?;
    let config: SearchConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing search config {}", path.display()))?;
    config.validate()?;
    tracing::info!(path = %path.display(), "Loaded search config");
    Ok(config)
}

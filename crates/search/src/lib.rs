//! Monte Carlo tree search for retrosynthesis route planning.
//!
//! Starting from a target molecule, the search repeatedly breaks molecules
//! down with reaction templates until every remaining molecule is
//! purchasable. The expansion policy, filter policy, stock and chemistry
//! engine are injected as trait objects so the algorithm can be tested with
//! mocks (no models, no chemistry toolkit).
//!
//! # Key types
//!
//! - [`SearchEngine`]: the search controller
//! - [`SearchConfig`]: configuration loaded from TOML
//! - [`SearchTree`] / [`SearchNode`] / [`State`]: the arena-backed tree
//! - [`ExpansionPolicy`] / [`FilterPolicy`] / [`Stock`]: collaborator traits
//!   (the chemistry engine contract lives in the `chem` crate)
//! - [`ScorerSet`]: node scorers and the search reward
//! - [`TreeAnalysis`]: ranked routes and tree statistics after a search

pub mod analysis;
pub mod cache;
pub mod config;
pub mod engine;
pub mod mocks;
pub mod node;
pub mod route;
pub mod scoring;
pub mod stock;
pub mod tree;

pub use analysis::TreeAnalysis;
pub use cache::CachedExpansionPolicy;
pub use config::{load_search_config, ScorerWeights, SearchConfig};
pub use engine::{
    CancelHandle, Collaborator, Collaborators, EnginePhase, ExpansionPolicy, FilterPolicy,
    ReactionCandidate, SearchEngine, SearchError, SearchRun, Stock, StockMetadata,
};
pub use node::{NodeId, NodeStats, Reaction, Resolution, SearchNode, State, StateEntry};
pub use route::{extract_path, extract_route};
pub use routes::{Route, ScoredRoute, SearchOutcome, SearchStats, TreeStatistics};
pub use scoring::{ScoreInput, Scorer, ScorerSet};
pub use stock::InMemoryStock;
pub use tree::{ExpansionReport, SearchTree, TreeParams};

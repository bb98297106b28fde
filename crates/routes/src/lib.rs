//! Output values of the route search.
//!
//! Routes are plain values (no pointers into the search tree) so they can be
//! serialized, compared and handed to post-processing such as clustering.

pub mod reader;
pub mod types;
pub mod writer;

pub use reader::RouteReader;
pub use types::{
    MoleculeNode, ReactionNode, Route, ScoredRoute, SearchOutcome, SearchStats, TreeStatistics,
};
pub use writer::{RouteRecord, RouteWriter};

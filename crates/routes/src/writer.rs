//! Writes scored routes to a JSON file for downstream consumers (clustering, reports).

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::{ScoredRoute, SearchOutcome, SearchStats, TreeStatistics};

/// One target's search results as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Target molecule (SMILES) the routes were searched for.
    pub target: String,
    pub outcome: SearchOutcome,
    pub stats: SearchStats,
    #[serde(default)]
    pub statistics: Option<TreeStatistics>,
    pub routes: Vec<ScoredRoute>,
}

/// Buffers route records and writes them as a JSON array.
pub struct RouteWriter {
    records: Vec<RouteRecord>,
    output_path: PathBuf,
}

impl RouteWriter {
    /// Create a new writer that will write to the given path.
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            records: Vec::new(),
            output_path,
        }
    }

    /// Buffer a single record.
    pub fn record(&mut self, record: RouteRecord) {
        self.records.push(record);
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write all buffered records and return the output path.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.output_path, json)
            .with_context(|| format!("writing {}", self.output_path.display()))?;

        tracing::info!(
            records = self.records.len(),
            path = %self.output_path.display(),
            "Wrote route records"
        );
        Ok(self.output_path)
    }
}

//! Reads route records written by [`RouteWriter`](crate::RouteWriter).

use std::path::Path;

use anyhow::Context;

use crate::writer::RouteRecord;

pub struct RouteReader;

impl RouteReader {
    /// Read every record from a JSON route file.
    pub fn read_all(path: &Path) -> anyhow::Result<Vec<RouteRecord>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let records: Vec<RouteRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(records = records.len(), path = %path.display(), "Read route records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MoleculeNode, Route, ScoredRoute, SearchOutcome, SearchStats};
    use crate::writer::RouteWriter;
    use std::collections::BTreeMap;

    fn record(target: &str) -> RouteRecord {
        let mut scores = BTreeMap::new();
        scores.insert("number of reactions".to_string(), 0.0);
        RouteRecord {
            target: target.to_string(),
            outcome: SearchOutcome::Solved,
            stats: SearchStats {
                iterations: 3,
                returned_first: true,
                ..SearchStats::default()
            },
            statistics: None,
            routes: vec![ScoredRoute {
                rank: 1,
                node_id: 0,
                score: 0.75,
                scores,
                solved: true,
                route: Route {
                    target: MoleculeNode::leaf(target, target, true),
                },
            }],
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");

        let mut writer = RouteWriter::new(path.clone());
        writer.record(record("CCO"));
        writer.record(record("CCN"));
        assert_eq!(writer.len(), 2);
        let written = writer.finish().unwrap();
        assert_eq!(written, path);

        let records = RouteReader::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].target, "CCN");
        assert_eq!(records[0].outcome, SearchOutcome::Solved);
        assert!(records[0].stats.returned_first);
        assert_eq!(records[0].routes[0].route.target.id, "CCO");
    }

    #[test]
    fn test_empty_writer_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let writer = RouteWriter::new(path.clone());
        assert!(writer.is_empty());
        writer.finish().unwrap();
        assert!(RouteReader::read_all(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RouteReader::read_all(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}

//! Per-dataset top-N extraction from a ranked result set

use crate::types::*;

pub const DEFAULT_TOP_N: usize = 5;

/// Take the first `n` records of each dataset from an already ranked set.
///
/// Datasets appear in the order they are first met in `ranked`. Records keep
/// their ranked order; nothing is re-sorted.
pub fn top_n_per_dataset(ranked: &RankedResultSet, n: usize) -> TopNSelection {
    let mut groups: Vec<(String, Vec<ScoredRecord>)> = Vec::new();

    for scored in &ranked.records {
        let idx = match groups.iter().position(|(name, _)| *name == scored.dataset) {
            Some(idx) => idx,
            None => {
                groups.push((scored.dataset.clone(), Vec::new()));
                groups.len() - 1
            }
        };

        let bucket = &mut groups[idx].1;
        if bucket.len() < n {
            bucket.push(scored.clone());
        }
    }

    for (name, records) in &groups {
        tracing::debug!("  top {} for {}: {} records", n, name, records.len());
    }

    TopNSelection { n, groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(dataset: &str, score: f64) -> ScoredRecord {
        ScoredRecord {
            record: ReferenceRecord {
                attributes: [score; SCORING_LEN],
                metadata: vec![],
            },
            dataset: dataset.to_string(),
            score,
        }
    }

    #[test]
    fn test_never_more_than_n() {
        let ranked = RankedResultSet {
            records: (0..12).map(|i| scored(if i % 3 == 0 { "A" } else { "B" }, i as f64)).collect(),
        };
        let top = top_n_per_dataset(&ranked, 5);
        assert_eq!(top.get("A").unwrap().len(), 4);
        assert_eq!(top.get("B").unwrap().len(), 5);
        let b_scores: Vec<f64> = top.get("B").unwrap().iter().map(|r| r.score).collect();
        assert_eq!(b_scores, vec![1.0, 2.0, 4.0, 5.0, 7.0]);
    }

    #[test]
    fn test_fewer_rows_than_n() {
        let ranked = RankedResultSet {
            records: vec![scored("A", 0.5), scored("A", 1.5)],
        };
        let top = top_n_per_dataset(&ranked, 3);
        assert_eq!(top.groups.len(), 1);
        assert_eq!(top.get("A").unwrap().len(), 2);
    }

    #[test]
    fn test_discovery_order() {
        let ranked = RankedResultSet {
            records: vec![scored("B", 0.1), scored("A", 0.2), scored("B", 0.3)],
        };
        let top = top_n_per_dataset(&ranked, DEFAULT_TOP_N);
        let names: Vec<&str> = top.groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}

//! Error scoring and ranking of reference records

use crate::types::*;

/// Mean absolute difference between the user vector and a record
pub fn error_score(
    user: &[Option<f64>; SCORING_LEN],
    attributes: &[f64; SCORING_LEN],
    policy: MissingValuePolicy,
) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;

    for (value, attr) in user.iter().zip(attributes.iter()) {
        let value = match (value, policy) {
            (Some(v), _) => *v,
            (None, MissingValuePolicy::ZeroFill) => 0.0,
            (None, MissingValuePolicy::Skip) => continue,
        };
        total += (value - attr).abs();
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Score every record of every dataset and merge them ascending by score.
///
/// Records are tagged in dataset order, then row order. The sort is stable,
/// so equal scores keep that order.
pub fn rank_datasets(
    datasets: &[ReferenceDataset],
    input: &DesignInput,
    policy: MissingValuePolicy,
) -> RankedResultSet {
    let user = input.scoring_vector();

    let mut records: Vec<ScoredRecord> = datasets
        .iter()
        .flat_map(|dataset| {
            dataset.records.iter().map(move |record| ScoredRecord {
                score: error_score(&user, &record.attributes, policy),
                dataset: dataset.name.clone(),
                record: record.clone(),
            })
        })
        .collect();

    records.sort_by(|a, b| a.score.total_cmp(&b.score));

    tracing::debug!(
        "Ranked {} records from {} datasets",
        records.len(),
        datasets.len()
    );

    RankedResultSet { records }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attributes: [f64; SCORING_LEN]) -> ReferenceRecord {
        ReferenceRecord { attributes, metadata: vec![] }
    }

    fn dataset(name: &str, rows: Vec<[f64; SCORING_LEN]>) -> ReferenceDataset {
        ReferenceDataset {
            name: name.to_string(),
            records: rows.into_iter().map(record).collect(),
        }
    }

    fn full_input(values: [f64; SCORING_LEN]) -> DesignInput {
        DesignField::SCORING
            .iter()
            .zip(values)
            .fold(DesignInput::new(), |input, (f, v)| input.with(*f, v))
    }

    #[test]
    fn test_identical_vectors_score_zero() {
        let values = [150.0, 60.0, 0.5, 1.0, 10.0, 20.0, 1000.0, 25.0];
        let ranked = rank_datasets(
            &[dataset("A", vec![values])],
            &full_input(values),
            MissingValuePolicy::ZeroFill,
        );
        assert_eq!(ranked.records[0].score, 0.0);
    }

    #[test]
    fn test_missing_values_are_zero_filled() {
        let input = DesignInput::new().with(DesignField::SubstrateLength, 8.0);
        let user = input.scoring_vector();
        let attrs = [0.0, 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        // |8-0| + |0-8| over eight fields
        assert_eq!(error_score(&user, &attrs, MissingValuePolicy::ZeroFill), 2.0);
    }

    #[test]
    fn test_skip_policy_ignores_missing_values() {
        let input = DesignInput::new()
            .with(DesignField::SubstrateLength, 10.0)
            .with(DesignField::SubstrateWidth, 20.0);
        let user = input.scoring_vector();
        let attrs = [12.0, 16.0, 99.0, 99.0, 99.0, 99.0, 99.0, 99.0];
        assert_eq!(error_score(&user, &attrs, MissingValuePolicy::Skip), 3.0);
        assert_eq!(
            error_score(&[None; SCORING_LEN], &attrs, MissingValuePolicy::Skip),
            0.0
        );
    }

    #[test]
    fn test_ranked_ascending_and_stable() {
        let input = full_input([0.0; SCORING_LEN]);
        let ranked = rank_datasets(
            &[
                dataset("A", vec![[3.0; SCORING_LEN], [2.0; SCORING_LEN]]),
                dataset("B", vec![[2.0; SCORING_LEN], [1.0; SCORING_LEN]]),
            ],
            &input,
            MissingValuePolicy::ZeroFill,
        );

        let order: Vec<(&str, f64)> = ranked
            .records
            .iter()
            .map(|r| (r.dataset.as_str(), r.score))
            .collect();
        assert_eq!(order, vec![("B", 1.0), ("A", 2.0), ("B", 2.0), ("A", 3.0)]);
    }

    #[test]
    fn test_empty_datasets_rank_empty() {
        let ranked = rank_datasets(
            &[dataset("A", vec![])],
            &DesignInput::new(),
            MissingValuePolicy::ZeroFill,
        );
        assert!(ranked.is_empty());
    }
}

//! Composes extractor outcomes into the statistics snapshot.

use crate::extract::{DurationSample, SourceOutcome};
use crate::model::{CategoryCounts, DateRange, Snapshot, Source};
use std::collections::BTreeMap;
use tracing::warn;

/// Builds the snapshot for `period`. Every source gets an entry: sources that could not be
/// extracted (or are absent from `outcomes`) contribute all-zero counts and a warning.
pub fn build_snapshot(
    period: DateRange,
    mut outcomes: BTreeMap<Source, SourceOutcome>,
) -> Snapshot {
    let mut snapshot = Snapshot {
        period,
        per_source: BTreeMap::new(),
        collaborator_averages: BTreeMap::new(),
        global_average: BTreeMap::new(),
        totals: BTreeMap::new(),
        rows_processed: BTreeMap::new(),
        unavailable: BTreeMap::new(),
        warnings: Vec::new(),
    };

    for source in Source::ALL {
        let outcome = outcomes
            .remove(&source)
            .unwrap_or_else(|| SourceOutcome::Unavailable {
                source,
                reason: "not extracted".to_string(),
            });

        let (counts, samples, rows) = match outcome {
            SourceOutcome::Available(e) => (e.counts, e.samples, e.rows_processed),
            SourceOutcome::Unavailable { reason, .. } => {
                let warning = format!("{} unavailable: {reason}", source.label());
                warn!("{warning}");
                snapshot.warnings.push(warning);
                snapshot.unavailable.insert(source, reason);
                (CategoryCounts::zeroed(source), Vec::new(), 0)
            }
        };

        let averages = collaborator_averages(&samples);
        if let Some(global) = mean_of_means(&averages) {
            snapshot.global_average.insert(source, global);
        }
        if !averages.is_empty() {
            snapshot.collaborator_averages.insert(source, averages);
        }
        snapshot.totals.insert(source, counts.total());
        snapshot.rows_processed.insert(source, rows);
        snapshot.per_source.insert(source, counts);
    }

    snapshot
}

/// Mean duration per collaborator.
pub fn collaborator_averages(samples: &[DurationSample]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    for sample in samples {
        let entry = sums.entry(sample.collaborator.trim()).or_default();
        entry.0 += sample.duration;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(name, (sum, n))| (name.to_string(), sum / f64::from(n)))
        .collect()
}

/// The unweighted mean of per-collaborator means: a collaborator with one row weighs as much as
/// one with a hundred. `None` when there are no collaborators.
pub fn mean_of_means(averages: &BTreeMap<String, f64>) -> Option<f64> {
    if averages.is_empty() {
        return None;
    }
    Some(averages.values().sum::<f64>() / averages.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_all, Extraction, SkipCounts};
    use crate::model::{Sheet, Workbook};
    use crate::test::{cm_rows, january};

    fn sample(name: &str, duration: f64) -> DurationSample {
        DurationSample {
            collaborator: name.to_string(),
            duration,
        }
    }

    #[test]
    fn test_global_average_is_mean_of_means() {
        let samples = vec![
            sample("Léa", 1.0),
            sample("Léa", 3.0),
            sample("Léa", 5.0),
            sample("Marc", 10.0),
        ];
        let averages = collaborator_averages(&samples);
        assert_eq!(averages["Léa"], 3.0);
        assert_eq!(averages["Marc"], 10.0);
        // not the row-weighted 4.75
        assert_eq!(mean_of_means(&averages), Some(6.5));
    }

    #[test]
    fn test_no_samples_no_average() {
        assert!(collaborator_averages(&[]).is_empty());
        assert_eq!(mean_of_means(&BTreeMap::new()), None);
    }

    #[test]
    fn test_collaborators_grouped_by_trimmed_name() {
        let averages = collaborator_averages(&[sample("Léa ", 2.0), sample("Léa", 4.0)]);
        assert_eq!(averages.len(), 1);
        assert_eq!(averages["Léa"], 3.0);
    }

    #[test]
    fn test_snapshot_from_workbook() {
        let wb = Workbook::new(vec![Sheet::from_text_rows("CM", cm_rows())]);
        let range = january();
        let snapshot = build_snapshot(range, extract_all(&wb, &range));

        assert_eq!(snapshot.period(), range);
        assert_eq!(snapshot.total(Source::Cm), Some(6));
        assert_eq!(snapshot.rows_processed(Source::Cm), 6);
        assert!(snapshot.global_average(Source::Cm).is_some());
        for source in Source::ALL {
            let counts = snapshot.counts(source).unwrap();
            assert_eq!(counts.total(), snapshot.total(source).unwrap());
        }
        // every other sheet is missing
        assert_eq!(snapshot.unavailable().len(), 5);
        assert_eq!(snapshot.warnings().len(), 5);
        assert!(snapshot.counts(Source::Rip).unwrap().is_all_zero());
        assert_eq!(snapshot.global_average(Source::Rip), None);
    }

    #[test]
    fn test_absent_outcome_is_unavailable() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            Source::Upr,
            SourceOutcome::Available(Extraction {
                source: Source::Upr,
                counts: CategoryCounts::zeroed(Source::Upr),
                samples: vec![],
                rows_processed: 0,
                skipped: SkipCounts::default(),
            }),
        );
        let snapshot = build_snapshot(january(), outcomes);
        assert!(!snapshot.unavailable().contains_key(&Source::Upr));
        assert_eq!(snapshot.unavailable()[&Source::Cm], "not extracted");
        assert_eq!(snapshot.per_source().len(), 6);
    }
}

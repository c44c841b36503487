use crate::model::{DateRange, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The count for one category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Counts per canonical category, in the source's chart order.
///
/// Counts are signed so that a snapshot read back from JSON can carry (and the validator can
/// reject) negative values.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(Vec<CategoryCount>);

impl CategoryCounts {
    /// Every category of `source`, at zero.
    pub fn zeroed(source: Source) -> Self {
        Self(
            source
                .categories()
                .iter()
                .map(|c| CategoryCount {
                    category: c.key().to_string(),
                    count: 0,
                })
                .collect(),
        )
    }

    /// Builds counts from arbitrary entries, without checking them against a source.
    pub fn from_entries<S, I>(entries: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, i64)>,
    {
        Self(
            entries
                .into_iter()
                .map(|(category, count)| CategoryCount {
                    category: category.into(),
                    count,
                })
                .collect(),
        )
    }

    /// Adds one to `category`. Returns false if there is no such key.
    pub fn increment(&mut self, category: &str) -> bool {
        match self.0.iter_mut().find(|c| c.category == category) {
            Some(entry) => {
                entry.count += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, category: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.count)
    }

    pub fn total(&self) -> i64 {
        self.0.iter().map(|c| c.count).sum()
    }

    /// The counts alone, in stored order.
    pub fn values(&self) -> Vec<i64> {
        self.0.iter().map(|c| c.count).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|c| c.count == 0)
    }
}

/// Everything the dashboard shows for one period. Built once per run by the aggregate builder,
/// then read by the validator and the injector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub(crate) period: DateRange,
    pub(crate) per_source: BTreeMap<Source, CategoryCounts>,
    /// Mean duration per collaborator, per source.
    pub(crate) collaborator_averages: BTreeMap<Source, BTreeMap<String, f64>>,
    /// Mean of the per-collaborator means; only present for sources with duration samples.
    pub(crate) global_average: BTreeMap<Source, f64>,
    pub(crate) totals: BTreeMap<Source, i64>,
    #[serde(default)]
    pub(crate) rows_processed: BTreeMap<Source, u64>,
    /// Sources whose sheet could not be used, with the reason.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) unavailable: BTreeMap<Source, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) warnings: Vec<String>,
}

impl Snapshot {
    pub fn period(&self) -> DateRange {
        self.period
    }

    pub fn counts(&self, source: Source) -> Option<&CategoryCounts> {
        self.per_source.get(&source)
    }

    pub fn per_source(&self) -> &BTreeMap<Source, CategoryCounts> {
        &self.per_source
    }

    pub fn total(&self, source: Source) -> Option<i64> {
        self.totals.get(&source).copied()
    }

    pub fn totals(&self) -> &BTreeMap<Source, i64> {
        &self.totals
    }

    pub fn collaborator_averages(&self, source: Source) -> Option<&BTreeMap<String, f64>> {
        self.collaborator_averages.get(&source)
    }

    pub fn global_average(&self, source: Source) -> Option<f64> {
        self.global_average.get(&source).copied()
    }

    pub fn rows_processed(&self, source: Source) -> u64 {
        self.rows_processed.get(&source).copied().unwrap_or(0)
    }

    pub fn unavailable(&self) -> &BTreeMap<Source, String> {
        &self.unavailable
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

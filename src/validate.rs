//! Checks a snapshot before anything is written. Errors block the injection; warnings are only
//! reported.

use crate::error::Res;
use crate::model::{Snapshot, Source};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A fallback category holding more than this share of a source's rows is suspicious.
const FALLBACK_SHARE: f64 = 0.5;

/// ...but only once the source has at least this many rows.
const FALLBACK_MIN_ROWS: i64 = 5;

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Turns a failed validation into an error that lists every problem.
    pub fn ensure_valid(&self) -> Res<()> {
        if self.is_valid() {
            return Ok(());
        }
        bail!(
            "The statistics are not consistent, nothing was written:\n  - {}",
            self.errors.join("\n  - ")
        )
    }
}

pub fn validate(snapshot: &Snapshot) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.warnings.extend(snapshot.warnings().iter().cloned());

    for source in Source::ALL {
        check_source(snapshot, source, &mut report);
    }

    for warning in &report.warnings {
        warn!("{warning}");
    }
    report
}

fn check_source(snapshot: &Snapshot, source: Source, report: &mut ValidationReport) {
    let Some(counts) = snapshot.counts(source) else {
        report.errors.push(format!("{source}: no counts"));
        return;
    };

    let declared = source.categories();
    if counts.len() != declared.len() {
        report.errors.push(format!(
            "{source}: {} categories instead of {}",
            counts.len(),
            declared.len()
        ));
    } else {
        for (expected, actual) in declared.iter().zip(counts.iter()) {
            if expected.key() != actual.category {
                report.errors.push(format!(
                    "{source}: expected category {} but found {}",
                    expected.key(),
                    actual.category
                ));
            }
        }
    }

    for entry in counts.iter().filter(|c| c.count < 0) {
        report.errors.push(format!(
            "{source}.{}: negative count {}",
            entry.category, entry.count
        ));
    }

    let sum = counts.total();
    match snapshot.total(source) {
        Some(total) if total == sum => {}
        Some(total) => report
            .errors
            .push(format!("{source}: total {total} but the counts sum to {sum}")),
        None => report.errors.push(format!("{source}: no total")),
    }

    if let Some(averages) = snapshot.collaborator_averages(source) {
        for (name, avg) in averages {
            if !avg.is_finite() || *avg < 0.0 {
                report
                    .errors
                    .push(format!("{source}: invalid average {avg} for {name}"));
            }
        }
    }
    if let Some(global) = snapshot.global_average(source) {
        if !global.is_finite() || global < 0.0 {
            report
                .errors
                .push(format!("{source}: invalid global average {global}"));
        }
    }

    if snapshot.unavailable().contains_key(&source) {
        // already reported through the snapshot warnings
        return;
    }
    if counts.is_all_zero() {
        report
            .warnings
            .push(format!("{}: no rows in the period", source.label()));
    } else if sum >= FALLBACK_MIN_ROWS {
        let fallback = source.fallback();
        let share = counts.get(fallback.key()).unwrap_or(0) as f64 / sum as f64;
        if share > FALLBACK_SHARE {
            report.warnings.push(format!(
                "{}: {:.0}% of rows fell into {}, check the labels in the sheet",
                source.label(),
                share * 100.0,
                fallback.key()
            ));
        }
    }
}

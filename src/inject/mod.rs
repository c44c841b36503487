//! Writes a snapshot into the two dashboard files.
//!
//! Both files are parsed, filled and rendered in memory first. Nothing touches the disk until
//! both have rendered, and then either both are replaced or neither is.

mod document;
mod persist;

pub use document::{Document, Flavor, Node, Slot, SlotKey};

use crate::billing::BillingReport;
use crate::error::Res;
use crate::fs;
use crate::model::{Snapshot, Source};
use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use persist::{Replacement, REMEDIATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// The display page and its companion chart script.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct InjectionTarget {
    display: PathBuf,
    script: PathBuf,
}

impl InjectionTarget {
    pub fn new(display: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            display: display.into(),
            script: script.into(),
        }
    }

    pub fn display(&self) -> &Path {
        &self.display
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

/// What an injection changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionSummary {
    pub display: PathBuf,
    pub script: PathBuf,
    pub display_slots: usize,
    pub script_slots: usize,
    pub generated_at: NaiveDateTime,
}

/// A heading and a count per category for every source.
pub fn required_display_keys() -> Vec<SlotKey> {
    let mut keys = Vec::new();
    for source in Source::ALL {
        keys.push(SlotKey::Heading(source));
        keys.extend(source.categories().iter().map(|c| SlotKey::Count {
            source,
            category: c.key(),
        }));
    }
    keys
}

/// A chart array for every source.
pub fn required_script_keys() -> Vec<SlotKey> {
    Source::ALL.into_iter().map(SlotKey::Series).collect()
}

/// The text a slot receives.
pub fn payload(key: SlotKey, snapshot: &Snapshot, billing: &BillingReport) -> String {
    let count = |source: Source, category: &str| {
        snapshot
            .counts(source)
            .and_then(|c| c.get(category))
            .unwrap_or(0)
    };
    match key {
        SlotKey::Heading(source) => snapshot.total(source).unwrap_or(0).to_string(),
        SlotKey::Count { source, category } => count(source, category).to_string(),
        SlotKey::Series(source) => {
            let values: Vec<String> = source
                .categories()
                .iter()
                .map(|c| count(source, c.key()).to_string())
                .collect();
            format!("[{}]", values.join(", "))
        }
        SlotKey::Amount(Some(source)) => billing.section_total(source).plain().to_string(),
        SlotKey::Amount(None) => billing.total.plain().to_string(),
        SlotKey::Dmt(source) => format!("{:.2}", snapshot.global_average(source).unwrap_or(0.0)),
        SlotKey::Period => snapshot.period().to_string(),
    }
}

fn generation_body(snapshot: &Snapshot, generated_at: NaiveDateTime) -> String {
    format!(
        "{} period {}",
        generated_at.format("%Y-%m-%dT%H:%M:%S"),
        snapshot.period()
    )
}

/// Fills one file's text. Returns the new text and the number of slots it filled.
pub fn render(
    flavor: Flavor,
    text: &str,
    snapshot: &Snapshot,
    billing: &BillingReport,
    generated_at: NaiveDateTime,
) -> Res<(String, usize)> {
    let body = flavor.strip_generation_comment(text);
    let mut document = Document::parse(flavor, body)?;

    let required = match flavor {
        Flavor::Display => required_display_keys(),
        Flavor::Script => required_script_keys(),
    };
    let missing = document.missing(required);
    if !missing.is_empty() {
        bail!(
            "{} marker(s) missing: {}",
            missing.len(),
            missing
                .iter()
                .map(SlotKey::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    document.fill(|key| payload(key, snapshot, billing));
    let slots = document.slots().count();

    let mut out = document.render().trim_end().to_string();
    out.push('\n');
    out.push_str(&flavor.generation_comment(&generation_body(snapshot, generated_at)));
    out.push('\n');
    Ok((out, slots))
}

fn read(path: &Path) -> Res<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Unable to read {}: {REMEDIATION}", path.display()))
}

/// Renders both files, then replaces both on disk.
pub fn inject(
    target: &InjectionTarget,
    snapshot: &Snapshot,
    billing: &BillingReport,
    generated_at: NaiveDateTime,
) -> Res<InjectionSummary> {
    let display_original = read(target.display())?;
    let script_original = read(target.script())?;

    let (display, display_slots) = render(
        Flavor::Display,
        &display_original,
        snapshot,
        billing,
        generated_at,
    )
    .with_context(|| format!("Unable to update {}", target.display().display()))?;
    let (script, script_slots) = render(
        Flavor::Script,
        &script_original,
        snapshot,
        billing,
        generated_at,
    )
    .with_context(|| format!("Unable to update {}", target.script().display()))?;

    persist::replace_all(&[
        Replacement {
            path: target.display(),
            original: &display_original,
            contents: &display,
        },
        Replacement {
            path: target.script(),
            original: &script_original,
            contents: &script,
        },
    ])?;

    info!(
        "Updated {} ({display_slots} values) and {} ({script_slots} values)",
        target.display().display(),
        target.script().display()
    );
    Ok(InjectionSummary {
        display: target.display().to_path_buf(),
        script: target.script().to_path_buf(),
        display_slots,
        script_slots,
        generated_at,
    })
}

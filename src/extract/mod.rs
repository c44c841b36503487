//! Per-source extraction: reads one sheet through its schema, keeps the rows inside the period,
//! classifies them and counts them.

mod schema;

pub use schema::{DurationColumns, DurationSplit, SheetSchema, TypeFilter};

use crate::error::Res;
use crate::model::{CategoryCounts, Cell, DateRange, Sheet, Source, Workbook};
use crate::normalize::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// One collaborator's processing time for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationSample {
    pub collaborator: String,
    pub duration: f64,
}

/// Rows that were read but not counted, by reason.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub no_date: u64,
    pub out_of_range: u64,
    pub filtered_type: u64,
    pub blank_category: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.no_date + self.out_of_range + self.filtered_type + self.blank_category
    }
}

/// What one extractor produced for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub source: Source,
    pub counts: CategoryCounts,
    pub samples: Vec<DurationSample>,
    /// Rows that passed every filter and were counted.
    pub rows_processed: u64,
    pub skipped: SkipCounts,
}

impl Extraction {
    fn empty(source: Source) -> Self {
        Self {
            source,
            counts: CategoryCounts::zeroed(source),
            samples: Vec::new(),
            rows_processed: 0,
            skipped: SkipCounts::default(),
        }
    }
}

/// The result of extracting a source. A missing or malformed sheet makes the source unavailable,
/// which the rest of the pipeline reports but survives.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Available(Extraction),
    Unavailable { source: Source, reason: String },
}

impl SourceOutcome {
    pub fn source(&self) -> Source {
        match self {
            SourceOutcome::Available(e) => e.source,
            SourceOutcome::Unavailable { source, .. } => *source,
        }
    }
}

/// Runs every extractor against the workbook. Each source is independent of the others.
pub fn extract_all(workbook: &Workbook, range: &DateRange) -> BTreeMap<Source, SourceOutcome> {
    Source::ALL
        .into_iter()
        .map(|source| (source, extract(workbook, source, range)))
        .collect()
}

/// Finds the source's sheet in the workbook and extracts it.
pub fn extract(workbook: &Workbook, source: Source, range: &DateRange) -> SourceOutcome {
    let schema = SheetSchema::for_source(source);
    let Some(sheet) = workbook.sheet(schema.sheet_name) else {
        let found: Vec<&str> = workbook.sheet_names().collect();
        let reason = format!(
            "sheet '{}' not found in the workbook (sheets: {})",
            schema.sheet_name,
            found.join(", ")
        );
        warn!("{source}: {reason}");
        return SourceOutcome::Unavailable { source, reason };
    };
    match extract_sheet(schema, sheet, range) {
        Ok(extraction) => {
            debug!(
                "{source}: {} rows counted, {} skipped",
                extraction.rows_processed,
                extraction.skipped.total()
            );
            SourceOutcome::Available(extraction)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!("{source}: {reason}");
            SourceOutcome::Unavailable { source, reason }
        }
    }
}

/// Extracts one sheet. Fails only when the sheet does not match the schema's shape; bad rows are
/// skipped.
pub fn extract_sheet(schema: &SheetSchema, sheet: &Sheet, range: &DateRange) -> Res<Extraction> {
    schema.check(sheet)?;
    let source = schema.source;
    let rules = RuleSet::for_source(source);
    let mut out = Extraction::empty(source);

    for (i, row) in sheet.rows().iter().enumerate() {
        // 1-based, the way the sheet shows it
        let line = i + 1;

        let Some(date) = cell(row, schema.date).as_date() else {
            trace!("{source} row {line}: no date, skipped");
            out.skipped.no_date += 1;
            continue;
        };

        if !range.contains(date) {
            trace!("{source} row {line}: {date} outside the period");
            out.skipped.out_of_range += 1;
            continue;
        }

        if let Some(filter) = &schema.type_filter {
            let accepted = cell(row, filter.column)
                .as_text()
                .is_some_and(|t| filter.accepts(&t));
            if !accepted {
                trace!("{source} row {line}: type not in {:?}", filter.allowed);
                out.skipped.filtered_type += 1;
                continue;
            }
        }

        let Some(raw) = cell(row, schema.category).as_text() else {
            debug!("{source} row {line}: blank category, skipped");
            out.skipped.blank_category += 1;
            continue;
        };

        let mut key = rules.classify(&raw).key();
        if let Some(split) = &schema.duration_split {
            if key == split.without_time && positive(cell(row, split.duration)).is_some() {
                key = split.with_time;
            }
        }

        if !out.counts.increment(key) {
            // classify only returns the source's own categories
            debug!("{source} row {line}: category {key} is not declared");
            continue;
        }
        out.rows_processed += 1;

        if let Some(columns) = &schema.durations {
            if let Some(sample) = sample(row, columns) {
                out.samples.push(sample);
            }
        }
    }

    Ok(out)
}

fn cell(row: &[Cell], index: usize) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    row.get(index).unwrap_or(EMPTY)
}

fn positive(cell: &Cell) -> Option<f64> {
    cell.as_number().filter(|d| *d > 0.0)
}

fn sample(row: &[Cell], columns: &DurationColumns) -> Option<DurationSample> {
    let collaborator = cell(row, columns.collaborator).as_text()?;
    let duration = positive(cell(row, columns.duration))?;
    Some(DurationSample {
        collaborator: collaborator.into_owned(),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{cm_rows, day, january};

    fn sheet(name: &str, rows: Vec<Vec<&str>>) -> Sheet {
        Sheet::from_text_rows(name, rows)
    }

    #[test]
    fn test_cm_counts() {
        let wb = Workbook::new(vec![Sheet::from_text_rows("CM", cm_rows())]);
        let SourceOutcome::Available(e) = extract(&wb, Source::Cm, &january()) else {
            panic!("CM should be available");
        };
        assert_eq!(e.counts.values(), vec![3, 1, 2, 0]);
        assert_eq!(e.rows_processed, 6);
        assert_eq!(e.counts.total() as u64, e.rows_processed);
        // the header row has no date
        assert_eq!(e.skipped.no_date, 1);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let rows = vec![
            vec!["1", "31/12/2024", "x", "x", "RAF", "A", "1"],
            vec!["2", "01/01/2025", "x", "x", "RAF", "A", "1"],
            vec!["3", "31/01/2025", "x", "x", "RAF", "A", "1"],
            vec!["4", "01/02/2025", "x", "x", "RAF", "A", "1"],
        ];
        let schema = SheetSchema::for_source(Source::Cm);
        let e = extract_sheet(schema, &sheet("CM", rows), &january()).unwrap();
        assert_eq!(e.counts.get("RAF"), Some(2));
        assert_eq!(e.skipped.out_of_range, 2);
    }

    #[test]
    fn test_native_and_serial_dates() {
        let rows = vec![
            vec![
                Cell::Empty,
                Cell::DateTime(day(2025, 1, 10).and_hms_opt(8, 0, 0).unwrap()),
                Cell::Empty,
                Cell::text("UPR OK"),
            ],
            vec![
                Cell::Empty,
                Cell::Number(45658.0),
                Cell::Empty,
                Cell::text("UPR NOK"),
            ],
        ];
        let schema = SheetSchema::for_source(Source::Upr);
        let e = extract_sheet(schema, &Sheet::new("UPR", rows), &january()).unwrap();
        assert_eq!(e.counts.values(), vec![1, 1, 0, 0, 0]);
        assert!(e.samples.is_empty());
    }

    #[test]
    fn test_pa_duration_split() {
        let rows = vec![
            vec!["1", "02/01/2025", "x", "AD RAS", "Léa", "0"],
            vec!["2", "03/01/2025", "x", "AD RAS", "Léa", ""],
            vec!["3", "04/01/2025", "x", "AD RAS", "Marc", "2,5"],
            vec!["4", "05/01/2025", "x", "AD créée", "Marc", "3"],
        ];
        let schema = SheetSchema::for_source(Source::Pa);
        let e = extract_sheet(schema, &sheet("PA", rows), &january()).unwrap();
        assert_eq!(e.counts.get("AD_RAS_SANS_TEMPS"), Some(2));
        assert_eq!(e.counts.get("AD_RAS_AVEC_TEMPS"), Some(1));
        assert_eq!(e.counts.get("AD_CREA"), Some(1));
        assert_eq!(e.samples.len(), 2);
        assert_eq!(e.samples[0].duration, 2.5);
    }

    #[test]
    fn test_type_filter_runs_before_category() {
        let rows = vec![
            vec!["T1", "501", "02/01/2025", "Traité", "A", "1"],
            vec!["T2", "511", "02/01/2025", "Rejeté", "A", "1"],
            vec!["T3", "502", "02/01/2025", "Traité", "A", "1"],
            vec!["T4", "502", "02/01/2025", "", "A", "1"],
            vec!["T5", "", "02/01/2025", "Traité", "A", "1"],
        ];
        let schema = SheetSchema::for_source(Source::Tickets);
        let e = extract_sheet(schema, &sheet("501-511", rows), &january()).unwrap();
        assert_eq!(e.counts.values(), vec![1, 1, 0, 0]);
        assert_eq!(e.skipped.filtered_type, 3);
        assert_eq!(e.skipped.blank_category, 0);
    }

    #[test]
    fn test_numeric_type_cell_passes_filter() {
        let rows = vec![
            vec![
                Cell::text("T1"),
                Cell::Number(501.0),
                Cell::text("2025-01-02"),
                Cell::text("Clos"),
                Cell::Empty,
                Cell::Empty,
            ],
            // short rows read as blank beyond their end
            vec![
                Cell::text("T2"),
                Cell::Number(511.0),
                Cell::text("2025-01-03"),
                Cell::text("Sans suite"),
            ],
        ];
        let schema = SheetSchema::for_source(Source::Tickets);
        let e = extract_sheet(schema, &Sheet::new("501-511", rows), &january()).unwrap();
        assert_eq!(e.counts.values(), vec![1, 0, 1, 0]);
        assert!(e.samples.is_empty());
    }

    #[test]
    fn test_samples_need_collaborator_and_positive_duration() {
        let rows = vec![
            vec!["1", "02/01/2025", "x", "x", "RAF", "", "3"],
            vec!["2", "02/01/2025", "x", "x", "RAF", "Léa", "-1"],
            vec!["3", "02/01/2025", "x", "x", "RAF", "Léa", "abc"],
            vec!["4", "02/01/2025", "x", "x", "RAF", " Léa ", "1.5"],
        ];
        let schema = SheetSchema::for_source(Source::Cm);
        let e = extract_sheet(schema, &sheet("CM", rows), &january()).unwrap();
        assert_eq!(e.rows_processed, 4);
        assert_eq!(
            e.samples,
            vec![DurationSample {
                collaborator: "Léa".to_string(),
                duration: 1.5
            }]
        );
    }

    #[test]
    fn test_blank_category_skipped() {
        let rows = vec![
            vec!["1", "02/01/2025", "x", "x", "  ", "A", "1"],
            vec!["2", "02/01/2025", "x", "x", "n'importe quoi", "A", "1"],
        ];
        let schema = SheetSchema::for_source(Source::Cm);
        let e = extract_sheet(schema, &sheet("CM", rows), &january()).unwrap();
        assert_eq!(e.skipped.blank_category, 1);
        assert_eq!(e.counts.get("AUTRE"), Some(1));
    }

    #[test]
    fn test_missing_and_narrow_sheets_are_unavailable() {
        let wb = Workbook::new(vec![
            sheet("UPR", vec![vec!["a", "b"]]),
            Sheet::new("RIP", vec![]),
        ]);
        let range = january();
        match extract(&wb, Source::Cm, &range) {
            SourceOutcome::Unavailable { reason, .. } => {
                assert!(reason.contains("'CM'"), "{reason}");
                assert!(reason.contains("(sheets: RIP, UPR)"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            extract(&wb, Source::Upr, &range),
            SourceOutcome::Unavailable { .. }
        ));
        let SourceOutcome::Available(rip) = extract(&wb, Source::Rip, &range) else {
            panic!("an empty sheet is still available");
        };
        assert!(rip.counts.is_all_zero());
    }

    #[test]
    fn test_extract_all_covers_every_source() {
        let all = extract_all(&Workbook::default(), &january());
        assert_eq!(all.len(), Source::ALL.len());
        for (source, outcome) in &all {
            assert_eq!(outcome.source(), *source);
        }
    }
}

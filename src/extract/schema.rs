//! The positional layout of each tracking sheet.
//!
//! Sheets are read by column index, never by header name. Every index used by the extractors
//! lives here, next to the sheet it belongs to.

use crate::error::Res;
use crate::model::{Sheet, Source};
use anyhow::ensure;

/// Collaborator and duration columns, for sources that track processing time.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DurationColumns {
    pub collaborator: usize,
    pub duration: usize,
}

/// Rows are only considered when the cell at `column` is one of `allowed`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TypeFilter {
    pub column: usize,
    pub allowed: &'static [&'static str],
}

impl TypeFilter {
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        self.allowed.iter().any(|a| a.eq_ignore_ascii_case(value))
    }
}

/// Moves rows classified as `without_time` into `with_time` when their duration is positive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DurationSplit {
    pub without_time: &'static str,
    pub with_time: &'static str,
    /// The column holding the duration that decides the split.
    pub duration: usize,
}

/// The layout of one source's sheet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SheetSchema {
    pub source: Source,
    pub sheet_name: &'static str,
    pub min_columns: usize,
    pub date: usize,
    pub category: usize,
    pub durations: Option<DurationColumns>,
    pub type_filter: Option<TypeFilter>,
    pub duration_split: Option<DurationSplit>,
}

// CM: référence, date, commune, voie, motif, collaborateur, durée
const CM: SheetSchema = SheetSchema {
    source: Source::Cm,
    sheet_name: "CM",
    min_columns: 7,
    date: 1,
    category: 4,
    durations: Some(DurationColumns {
        collaborator: 5,
        duration: 6,
    }),
    type_filter: None,
    duration_split: None,
};

// PA: référence, date, commune, motif, collaborateur, durée
const PA: SheetSchema = SheetSchema {
    source: Source::Pa,
    sheet_name: "PA",
    min_columns: 6,
    date: 1,
    category: 3,
    durations: Some(DurationColumns {
        collaborator: 4,
        duration: 5,
    }),
    type_filter: None,
    duration_split: Some(DurationSplit {
        without_time: "AD_RAS_SANS_TEMPS",
        with_time: "AD_RAS_AVEC_TEMPS",
        duration: 5,
    }),
};

// Communes: code INSEE, commune, date, statut, collaborateur, durée
const COMMUNES: SheetSchema = SheetSchema {
    source: Source::Communes,
    sheet_name: "Communes",
    min_columns: 6,
    date: 2,
    category: 3,
    durations: Some(DurationColumns {
        collaborator: 4,
        duration: 5,
    }),
    type_filter: None,
    duration_split: None,
};

// UPR: référence, date, commune, résultat
const UPR: SheetSchema = SheetSchema {
    source: Source::Upr,
    sheet_name: "UPR",
    min_columns: 4,
    date: 1,
    category: 3,
    durations: None,
    type_filter: None,
    duration_split: None,
};

// 501-511: ticket, type, date, statut, collaborateur, durée
const TICKETS: SheetSchema = SheetSchema {
    source: Source::Tickets,
    sheet_name: "501-511",
    min_columns: 6,
    date: 2,
    category: 3,
    durations: Some(DurationColumns {
        collaborator: 4,
        duration: 5,
    }),
    type_filter: Some(TypeFilter {
        column: 1,
        allowed: &["501", "511"],
    }),
    duration_split: None,
};

// RIP: ticket, date d'ouverture, opérateur, motif
const RIP: SheetSchema = SheetSchema {
    source: Source::Rip,
    sheet_name: "RIP",
    min_columns: 4,
    date: 1,
    category: 3,
    durations: None,
    type_filter: None,
    duration_split: None,
};

impl SheetSchema {
    pub fn for_source(source: Source) -> &'static SheetSchema {
        match source {
            Source::Cm => &CM,
            Source::Pa => &PA,
            Source::Communes => &COMMUNES,
            Source::Upr => &UPR,
            Source::Tickets => &TICKETS,
            Source::Rip => &RIP,
        }
    }

    /// The number of columns the indices of this schema actually need.
    pub fn required_columns(&self) -> usize {
        let mut max = self.date.max(self.category);
        if let Some(d) = self.durations {
            max = max.max(d.collaborator).max(d.duration);
        }
        if let Some(t) = self.type_filter {
            max = max.max(t.column);
        }
        if let Some(s) = self.duration_split {
            max = max.max(s.duration);
        }
        max + 1
    }

    /// Checked once per sheet before any row is read. An empty sheet passes: it simply has
    /// nothing in the period.
    pub fn check(&self, sheet: &Sheet) -> Res<()> {
        if sheet.is_empty() {
            return Ok(());
        }
        let width = sheet.width();
        ensure!(
            width >= self.min_columns,
            "Sheet '{}' has {} columns but at least {} are expected",
            sheet.name(),
            width,
            self.min_columns
        );
        Ok(())
    }
}

//! In-memory representation of a loaded workbook: named sheets made of positional cells.

use crate::model::date_range::{from_excel_serial, parse_date};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single cell value. Header names are never trusted, so nothing here knows which column it
/// came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Builds a cell from text, mapping blank text to `Empty`.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    /// The trimmed text form of the cell, `None` when blank. Integral numbers print without a
    /// decimal point so that a numeric `501` matches the text `"501"`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(Cow::Borrowed(t))
                }
            }
            Cell::Number(n) => Some(Cow::Owned(format_number(*n))),
            Cell::Bool(b) => Some(Cow::Owned(b.to_string())),
            Cell::DateTime(dt) => Some(Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
        }
    }

    /// Interprets the cell as a date: native date cells, Excel serial numbers, or text in one of
    /// the accepted formats.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Number(n) => from_excel_serial(*n).map(|dt| dt.date()),
            Cell::Text(s) => parse_date(s),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }

    /// Interprets the cell as a number, accepting a French decimal comma in text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parses `2.5`, `2,5` and ` 2 ` as numbers. Anything else is `None`.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// One named sheet: an ordered table of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Convenience constructor for text-only data, as read from CSV.
    pub fn from_text_rows<S, R, I>(name: impl Into<String>, rows: I) -> Self
    where
        S: AsRef<str>,
        R: IntoIterator<Item = S>,
        I: IntoIterator<Item = R>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|s| Cell::from(s.as_ref())).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The number of columns: the length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// A loaded workbook: sheets by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    pub fn new(sheets: impl IntoIterator<Item = Sheet>) -> Self {
        Self {
            sheets: sheets
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
        }
    }

    pub fn insert(&mut self, sheet: Sheet) {
        self.sheets.insert(sheet.name().to_string(), sheet);
    }

    /// Finds a sheet by exact name first, then ignoring case and surrounding whitespace, since
    /// operators rename tabs by hand.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name).or_else(|| {
            let wanted = name.trim().to_lowercase();
            self.sheets
                .values()
                .find(|s| s.name().trim().to_lowercase() == wanted)
        })
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

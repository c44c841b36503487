//! Loads the tracking workbook from disk: a spreadsheet file read with `calamine`, or a folder of
//! CSV exports (one file per sheet) read with `csv`.

use crate::error::Res;
use crate::model::{Cell, Sheet, Workbook};
use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

const HOURS_PER_DAY: f64 = 24.0;

/// Loads every sheet found at `path`.
pub fn load_workbook(path: &Path) -> Res<Workbook> {
    if path.is_dir() {
        return load_csv_dir(path);
    }
    if !path.is_file() {
        bail!("The workbook {} does not exist", path.display());
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if ext == "csv" {
        let mut workbook = Workbook::default();
        workbook.insert(load_csv_file(path)?);
        return Ok(workbook);
    }
    if !SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Unsupported workbook format '{}' for {}, expected one of {} or a folder of .csv files",
            ext,
            path.display(),
            SPREADSHEET_EXTENSIONS.join(", ")
        );
    }
    load_spreadsheet(path)
}

fn load_spreadsheet(path: &Path) -> Res<Workbook> {
    let mut spreadsheet = open_workbook_auto(path)
        .with_context(|| format!("Unable to open the workbook {}", path.display()))?;
    let mut workbook = Workbook::default();
    for name in spreadsheet.sheet_names() {
        match spreadsheet.worksheet_range(&name) {
            Ok(range) => {
                let sheet = sheet_from_range(&name, &range);
                debug!("Loaded sheet '{}' ({} rows)", name, sheet.rows().len());
                workbook.insert(sheet);
            }
            // one unreadable sheet should not hide the others
            Err(e) => warn!("Skipping sheet '{name}': {e}"),
        }
    }
    Ok(workbook)
}

/// Converts a calamine range into rows anchored at A1. Calamine ranges start at the first used
/// cell, so leading empty rows and columns are put back to keep column indices stable.
fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let (first_row, first_col) = match range.start() {
        Some((r, c)) => (r as usize, c as usize),
        None => return Sheet::new(name, Vec::new()),
    };
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); first_row];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; first_col];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    Sheet::new(name, rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        // [h]:mm cells hold a fraction of a day; durations are read in hours
        Data::DateTime(dt) if dt.is_duration() => Cell::Number(dt.as_f64() * HOURS_PER_DAY),
        // as_datetime applies the workbook's 1900 or 1904 epoch
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => iso_date_time(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::text(s.as_str())),
        Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}

fn iso_date_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn load_csv_dir(dir: &Path) -> Res<Workbook> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Unable to list the folder {}", dir.display()))?;
    let mut workbook = Workbook::default();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Unable to list the folder {}", dir.display()))?
            .path();
        let is_csv = path
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            workbook.insert(load_csv_file(&path)?);
        }
    }
    if workbook.is_empty() {
        bail!("The folder {} contains no .csv file", dir.display());
    }
    Ok(workbook)
}

/// The sheet is named after the file: `CM.csv` holds the `CM` sheet.
fn load_csv_file(path: &Path) -> Res<Sheet> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes =
        std::fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let rows = parse_csv(&text).with_context(|| format!("Unable to parse {}", path.display()))?;
    debug!("Loaded sheet '{}' ({} rows) from CSV", name, rows.len());
    Ok(Sheet::from_text_rows(name, rows))
}

/// French exports use `;` as the delimiter; anything else is read as `,`.
fn delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn parse_csv(text: &str) -> Res<Vec<Vec<String>>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter(text))
        .from_reader(Cursor::new(text.as_bytes()));

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_sheet, SheetSchema};
    use crate::model::Source;
    use crate::test::{day, january};
    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use tempfile::TempDir;

    fn date_cell(serial: f64, is_1904: bool) -> Data {
        Data::DateTime(ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, is_1904))
    }

    fn duration_cell(days: f64) -> Data {
        Data::DateTime(ExcelDateTime::new(days, ExcelDateTimeType::TimeDelta, false))
    }

    #[test]
    fn test_parse_csv_semicolons() {
        let text = "\u{feff}Réf;Date;Motif\n1;02/01/2025;\"RAF; vu\"\n2;03/01/2025\n";
        let rows = parse_csv(text).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "Réf");
        assert_eq!(rows[1][2], "RAF; vu");
        // ragged rows are kept as they are
        assert_eq!(rows[2].len(), 2);
    }

    #[test]
    fn test_parse_csv_commas() {
        let rows = parse_csv("a,b,c\n1,\"2,5\",x\n").unwrap();
        assert_eq!(rows[1], vec!["1", "2,5", "x"]);
    }

    #[test]
    fn test_load_csv_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("CM.csv"),
            "Réf;Date;Commune;Voie;Motif;Collaborateur;Durée\n1;02/01/2025;A;B;RAF;Léa;2,5\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("UPR.csv"), "Réf;Date;Commune;Résultat\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let wb = load_workbook(dir.path()).unwrap();
        assert_eq!(wb.len(), 2);
        let cm = wb.sheet("CM").unwrap();
        assert_eq!(cm.width(), 7);
        assert_eq!(cm.rows()[1][6].as_number(), Some(2.5));
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        assert!(load_workbook(dir.path()).is_err());
        assert!(load_workbook(&dir.path().join("missing.xlsx")).is_err());
        let txt = dir.path().join("data.txt");
        std::fs::write(&txt, "x").unwrap();
        let err = load_workbook(&txt).unwrap_err();
        assert!(err.to_string().contains("Unsupported workbook format 'txt'"));
        let bad = dir.path().join("broken.xlsx");
        std::fs::write(&bad, "not a zip").unwrap();
        assert!(load_workbook(&bad).is_err());
    }

    #[test]
    fn test_range_is_anchored_at_a1() {
        let mut range = Range::new((1, 2), (2, 3));
        range.set_value((1, 2), Data::String("Date".to_string()));
        range.set_value((2, 2), Data::Float(45658.0));
        range.set_value((2, 3), Data::Int(501));
        let sheet = sheet_from_range("T", &range);
        assert_eq!(sheet.rows().len(), 3);
        assert!(sheet.rows()[0].is_empty());
        assert_eq!(sheet.rows()[2][2], Cell::Number(45658.0));
        assert_eq!(sheet.rows()[2][3].as_text().unwrap(), "501");
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::String("  ".to_string())), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::DateTimeIso("2025-01-02T08:30:00".to_string())).as_date(),
            NaiveDate::from_ymd_opt(2025, 1, 2)
        );
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn test_date_cells_follow_the_workbook_epoch() {
        // 2025-01-01 is serial 45658 in the 1900 system and 44196 in the 1904 system
        let d1900 = cell_from_data(&date_cell(45658.0, false));
        let d1904 = cell_from_data(&date_cell(45658.0 - 1462.0, true));
        assert_eq!(d1900.as_date(), Some(day(2025, 1, 1)));
        assert_eq!(d1904.as_date(), Some(day(2025, 1, 1)));
    }

    #[test]
    fn test_duration_cells_are_hours() {
        // 1.5 days formatted [h]:mm
        assert_eq!(cell_from_data(&duration_cell(1.5)).as_number(), Some(36.0));
        assert_eq!(cell_from_data(&duration_cell(0.0)).as_number(), Some(0.0));
    }

    #[test]
    fn test_pa_duration_cells_split_ad_ras() {
        let mut range = Range::new((0, 0), (2, 5));
        let headers = ["Réf", "Date", "Commune", "Motif", "Collaborateur", "Durée"];
        for (col, header) in headers.iter().enumerate() {
            range.set_value((0, col as u32), Data::String(header.to_string()));
        }
        for (row, duration) in [(1, 0.0), (2, 2.5 / 24.0)] {
            range.set_value((row, 0), Data::String(format!("PA-{row}")));
            range.set_value((row, 1), date_cell(45660.0, false));
            range.set_value((row, 2), Data::String("Rennes".to_string()));
            range.set_value((row, 3), Data::String("AD RAS".to_string()));
            range.set_value((row, 4), Data::String("Léa".to_string()));
            range.set_value((row, 5), duration_cell(duration));
        }
        let sheet = sheet_from_range("PA", &range);

        let extraction =
            extract_sheet(SheetSchema::for_source(Source::Pa), &sheet, &january()).unwrap();
        assert_eq!(extraction.counts.get("AD_RAS_SANS_TEMPS"), Some(1));
        assert_eq!(extraction.counts.get("AD_RAS_AVEC_TEMPS"), Some(1));
        assert_eq!(extraction.samples.len(), 1);
        assert!((extraction.samples[0].duration - 2.5).abs() < 1e-9);
    }
}

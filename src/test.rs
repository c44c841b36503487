//! Shared test utilities: sample sheets, dashboard templates and a ready-to-use home directory.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::model::{DateRange, Sheet, Source, Workbook};
use crate::Config;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// January 2025, bounds included.
pub fn january() -> DateRange {
    DateRange::new(day(2025, 1, 1), day(2025, 1, 31)).unwrap()
}

/// 2025-02-01 at `hour` o'clock, used as the generation time.
pub fn stamp(hour: u32) -> NaiveDateTime {
    day(2025, 2, 1).and_hms_opt(hour, 0, 0).unwrap()
}

/// The CM sheet: a header, six rows in January (3 RAF, 1 MODIF, 2 CREA) and one in February.
pub fn cm_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec!["Référence", "Date", "Commune", "Voie", "Motif", "Collaborateur", "Durée"],
        vec!["CM-1", "02/01/2025", "Rennes", "Rue A", "RAF", "Léa", "1,5"],
        vec!["CM-2", "03/01/2025", "Rennes", "Rue B", "Rien à faire", "Marc", "2"],
        vec!["CM-3", "2025-01-10", "Vitré", "Rue C", "raf", "Léa", "0"],
        vec!["CM-4", "15/01/2025", "Vitré", "Rue D", "Modification voie", "Marc", "3"],
        vec!["CM-5", "20/01/2025 09:30", "Fougères", "Rue E", "Création", "Léa", "4,5"],
        vec!["CM-6", "31/01/2025", "Fougères", "Rue F", "CREA voie", "", ""],
        vec!["CM-7", "01/02/2025", "Rennes", "Rue G", "RAF", "Léa", "1"],
    ]
}

/// Every sheet of the sample workbook, by name.
pub fn sheet_rows() -> Vec<(&'static str, Vec<Vec<&'static str>>)> {
    vec![
        ("CM", cm_rows()),
        (
            "PA",
            vec![
                vec!["Référence", "Date", "Commune", "Motif", "Collaborateur", "Durée"],
                vec!["PA-1", "06/01/2025", "Rennes", "AD RAS", "Léa", "0"],
                vec!["PA-2", "07/01/2025", "Rennes", "AD RAS", "Marc", ""],
                vec!["PA-3", "08/01/2025", "Rennes", "AD RAS", "Marc", "2,5"],
                vec!["PA-4", "09/01/2025", "Rennes", "AD créée", "Léa", "3"],
            ],
        ),
        (
            "Communes",
            vec![
                vec!["Code INSEE", "Commune", "Date", "Statut", "Collaborateur", "Durée"],
                vec!["35238", "Rennes", "05/01/2025", "Traitée", "Léa", "5"],
                vec!["35360", "Vitré", "06/01/2025", "Non traitée", "", ""],
                vec!["35115", "Fougères", "07/01/2025", "Partiellement traitée", "Marc", "2"],
            ],
        ),
        (
            "UPR",
            vec![
                vec!["Référence", "Date", "Commune", "Résultat"],
                vec!["U1", "10/01/2025", "Rennes", "UPR OK"],
                vec!["U2", "11/01/2025", "Rennes", "UPR NOK"],
                vec!["U3", "12/01/2025", "Rennes", "OK"],
                vec!["U4", "13/01/2025", "Rennes", "KO"],
            ],
        ),
        (
            "501-511",
            vec![
                vec!["Ticket", "Type", "Date", "Statut", "Collaborateur", "Durée"],
                vec!["T1", "501", "14/01/2025", "Traité", "Léa", "1"],
                vec!["T2", "511", "15/01/2025", "Rejeté", "Marc", "2"],
                vec!["T3", "502", "15/01/2025", "Traité", "Léa", "1"],
                vec!["T4", "511", "16/01/2025", "Sans suite", "Marc", "0,5"],
            ],
        ),
        (
            "RIP",
            vec![
                vec!["Ticket", "Date d'ouverture", "Opérateur", "Motif"],
                vec!["R1", "17/01/2025", "Orange", "Adresse absente"],
                vec!["R2", "18/01/2025", "Orange", "Doublon"],
                vec!["R3", "19/01/2025", "SFR", "Hors périmètre"],
            ],
        ),
    ]
}

/// All six sheets, loaded.
pub fn full_workbook() -> Workbook {
    Workbook::new(
        sheet_rows()
            .into_iter()
            .map(|(name, rows)| Sheet::from_text_rows(name, rows)),
    )
}

/// A dashboard page with every marker, all at zero.
pub fn display_template() -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"fr\">\n<head><meta charset=\"utf-8\"><title>Suivi</title></head>\n<body>\n  <p>Période : <span data-period>-</span></p>\n  <p>Total facturé : <b data-amount=\"total\">0.00</b> €</p>\n",
    );
    for source in Source::ALL {
        let _ = write!(
            html,
            "  <section>\n    <h2 data-section=\"{source}\">{} (0)</h2>\n    <ul>\n",
            source.label()
        );
        for c in source.categories() {
            let _ = writeln!(
                html,
                "      <li>{} : <span data-count=\"{source}.{}\">0</span></li>",
                c.label(),
                c.key()
            );
        }
        let _ = write!(
            html,
            "    </ul>\n    <p>DMT <span data-dmt=\"{source}\">0.00</span> h, <span data-amount=\"{source}\">0.00</span> €</p>\n  </section>\n"
        );
    }
    html.push_str("  <script src=\"charts.js\"></script>\n</body>\n</html>\n");
    html
}

/// The chart script that goes with `display_template`.
pub fn script_template() -> String {
    let mut js = String::from("// Chart data.\nconst DATA = {\n");
    for source in Source::ALL {
        let labels: Vec<String> = source
            .categories()
            .iter()
            .map(|c| format!("{:?}", c.label()))
            .collect();
        let zeros = vec!["0"; source.categories().len()].join(", ");
        let _ = writeln!(
            js,
            "  \"{source}\": {{ labels: [{}], counts: /* counts:{source} */ [{zeros}], dmt: /* dmt:{source} */ 0.00 }},",
            labels.join(", ")
        );
    }
    js.push_str("};\nrenderCharts(DATA);\n");
    js
}

/// Test environment with a suivi home directory, a config, both dashboard files and the sample
/// workbook exported as a folder of CSV files. Holds TempDir to keep the directory alive for the
/// duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    workbook: PathBuf,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_prices("{}").await
    }

    /// `prices` is the JSON of the `prices` field of `config.json`.
    pub async fn with_prices(prices: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("suivi");
        let created = Config::create(&root, None, None).await.unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(created.config_path()).unwrap())
                .unwrap();
        json["prices"] = serde_json::from_str(prices).unwrap();
        std::fs::write(
            created.config_path(),
            serde_json::to_string_pretty(&json).unwrap(),
        )
        .unwrap();
        let config = Config::load(&root).await.unwrap();

        std::fs::create_dir_all(config.display_path().parent().unwrap()).unwrap();
        std::fs::write(config.display_path(), display_template()).unwrap();
        std::fs::write(config.script_path(), script_template()).unwrap();

        let workbook = temp_dir.path().join("classeur");
        std::fs::create_dir_all(&workbook).unwrap();
        for (name, rows) in sheet_rows() {
            write_csv(&workbook.join(format!("{name}.csv")), &rows);
        }

        Self {
            _temp_dir: temp_dir,
            config,
            workbook,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// The folder holding the sample workbook.
    pub fn workbook(&self) -> PathBuf {
        self.workbook.clone()
    }

    pub fn display_contents(&self) -> String {
        std::fs::read_to_string(self.config.display_path()).unwrap()
    }

    pub fn script_contents(&self) -> String {
        std::fs::read_to_string(self.config.script_path()).unwrap()
    }
}

/// Writes rows the way a French spreadsheet exports them: `;` separated.
fn write_csv(path: &Path, rows: &[Vec<&str>]) {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .unwrap();
    for row in rows {
        wtr.write_record(row).unwrap();
    }
    wtr.flush().unwrap();
}

#[tokio::test]
async fn test_env_round_trip() {
    let env = TestEnv::new().await;
    let wb = crate::workbook::load_workbook(&env.workbook()).unwrap();
    assert_eq!(wb, full_workbook());
}

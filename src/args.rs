//! These structs provide the CLI interface for the suivi CLI.

use crate::error::{ErrorType, IntoResult};
use crate::model::{parse_date_arg, DateRange};
use crate::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// suivi: monthly statistics for the address tracking dashboard.
///
/// Reads the tracking workbook (one sheet per source: CM, PA, Communes, UPR, 501-511, RIP), keeps
/// the rows of the chosen period, sorts each row into its category and writes the counts into the
/// dashboard page and its chart script.
///
/// Start with `suivi init`, then `suivi extract` to check the numbers and `suivi run` to update
/// the dashboard.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and its `config.json`.
    ///
    /// The home directory defaults to $HOME/suivi, pass --suivi-home to put it somewhere else.
    /// Unit prices for billing are added to `config.json` by hand afterwards.
    Init(InitArgs),
    /// Compute and check the statistics of a period without writing anything.
    Extract(PeriodArgs),
    /// Compute the statistics of a period and write them into both dashboard files.
    Run(PeriodArgs),
    /// Show what the period bills, per source and category, using the prices in `config.json`.
    Billing(PeriodArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration is held. Defaults to ~/suivi
    #[arg(long, env = "SUIVI_HOME", default_value_t = default_suivi_home())]
    suivi_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, suivi_home: PathBuf) -> Self {
        Self {
            log_level,
            suivi_home: suivi_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn suivi_home(&self) -> &DisplayPath {
        &self.suivi_home
    }
}

/// Args for the `suivi init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The dashboard page. Relative paths are taken from the home directory.
    #[arg(long)]
    display: Option<PathBuf>,

    /// The chart script that goes with the page. Relative paths are taken from the home
    /// directory.
    #[arg(long)]
    script: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(display: Option<PathBuf>, script: Option<PathBuf>) -> Self {
        Self { display, script }
    }

    pub fn display(&self) -> Option<&Path> {
        self.display.as_deref()
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }
}

/// Args for the commands that work on a period of the workbook.
#[derive(Debug, Parser, Clone)]
pub struct PeriodArgs {
    /// The workbook: an .xlsx, .xlsm, .xls, .xlsb or .ods file, or a folder holding one .csv file
    /// per sheet.
    #[arg(long)]
    workbook: PathBuf,

    /// First day of the period, included. e.g. 01/01/2025 or 2025-01-01
    #[arg(long, value_parser = parse_date_arg)]
    from: NaiveDate,

    /// Last day of the period, included.
    #[arg(long, value_parser = parse_date_arg)]
    to: NaiveDate,
}

impl PeriodArgs {
    pub fn new(workbook: impl Into<PathBuf>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            workbook: workbook.into(),
            from,
            to,
        }
    }

    pub fn workbook(&self) -> &Path {
        &self.workbook
    }

    /// The period, checked.
    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.from, self.to).pub_result(ErrorType::Request)
    }
}

fn default_suivi_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("suivi"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --suivi-home or SUIVI_HOME instead of relying on the default \
                suivi home directory.",
            );
            PathBuf::from("suivi")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

//! Command handlers for the suivi CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod billing;
mod extract;
mod init;
mod run;

use crate::error::{ErrorType, IntoResult};
use crate::model::Workbook;
use crate::Result;
use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tracing::{debug, info};

pub use billing::billing;
pub use extract::extract;
pub use init::init;
pub use run::run;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Reads the workbook off the async runtime; spreadsheet parsing is blocking work.
async fn load_workbook(path: &Path) -> Result<Workbook> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || crate::workbook::load_workbook(&owned))
        .await
        .context("The workbook loading task failed")
        .pub_result(ErrorType::Internal)?
        .pub_result(ErrorType::Workbook)
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

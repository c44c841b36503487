//! Reads an address-maintenance tracking workbook, computes per-source statistics for a
//! reporting period and writes them into a two-file HTML/JS dashboard.
//!
//! ```
//! use suivi_dashboard::model::Amount;
//! let amount: Amount = "1 234,50 €".parse().unwrap();
//! assert_eq!(amount.for_display().to_string(), "1 234.50 €");
//! ```
mod aggregate;
pub mod args;
mod billing;
pub mod commands;
mod config;
mod error;
mod extract;
mod fs;
mod inject;
pub mod model;
mod normalize;
mod pipeline;
mod utils;
mod validate;
mod workbook;

pub use billing::{BillingLine, BillingReport, BillingSection, BillingTable};
pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use inject::InjectionSummary;
pub use pipeline::{RunReport, Stage};
pub use validate::ValidationReport;

#[cfg(test)]
mod test;

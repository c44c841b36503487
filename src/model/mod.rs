//! Types that represent the core data model: sheets and cells, the reporting period, sources
//! and their categories, and the statistics snapshot.
mod amount;
mod date_range;
mod sheet;
mod snapshot;
mod source;

pub use amount::{Amount, AmountFormat};
pub use date_range::{from_excel_serial, parse_date, parse_date_arg, DateRange};
pub(crate) use sheet::parse_number;
pub use sheet::{Cell, Sheet, Workbook};
pub use snapshot::{CategoryCount, CategoryCounts, Snapshot};
pub use source::{Category, Source};

use crate::args::PeriodArgs;
use crate::billing::BillingReport;
use crate::commands::{load_workbook, now, Out};
use crate::pipeline::{Pipeline, RunContext};
use crate::{Config, Result};
use std::fmt::Write;

/// Prices the period's counts with the unit prices from `config.json`.
pub async fn billing(config: &Config, args: &PeriodArgs) -> Result<Out<BillingReport>> {
    let range = args.range()?;
    let workbook = load_workbook(args.workbook()).await?;
    let report = Pipeline::new().run(&RunContext {
        range,
        workbook: &workbook,
        prices: config.prices(),
        target: None,
        generated_at: now(),
    })?;

    let billing = report.billing;
    let mut message = format!("Billing for {}", billing.period);
    if config.prices().is_empty() {
        let _ = write!(
            message,
            "\nNo prices in {}, every amount is zero",
            config.config_path().display()
        );
    }
    for section in &billing.sections {
        let _ = write!(
            message,
            "\n  {}: {}",
            section.source.label(),
            section.total.for_display()
        );
        for line in section.lines.iter().filter(|l| !l.amount.is_zero()) {
            let _ = write!(
                message,
                "\n    {} x {} = {}",
                line.count,
                line.label,
                line.amount.for_display()
            );
        }
    }
    let _ = write!(message, "\nTotal: {}", billing.total.for_display());
    Ok(Out::new(message, billing))
}

use crate::args::PeriodArgs;
use crate::commands::{load_workbook, now, Out};
use crate::model::Source;
use crate::pipeline::{Pipeline, RunContext, RunReport};
use crate::{Config, Result};
use std::fmt::Write;

/// Computes and validates the statistics of a period. Nothing is written.
pub async fn extract(config: &Config, args: &PeriodArgs) -> Result<Out<RunReport>> {
    let range = args.range()?;
    let workbook = load_workbook(args.workbook()).await?;
    let report = Pipeline::new().run(&RunContext {
        range,
        workbook: &workbook,
        prices: config.prices(),
        target: None,
        generated_at: now(),
    })?;
    Ok(Out::new(summary(&report), report))
}

/// One line per source, then the warnings.
pub(super) fn summary(report: &RunReport) -> String {
    let snapshot = &report.snapshot;
    let mut s = format!("Period {}", snapshot.period());
    for source in Source::ALL {
        let Some(counts) = snapshot.counts(source) else {
            continue;
        };
        let detail: Vec<String> = counts
            .iter()
            .map(|c| format!("{} {}", c.category, c.count))
            .collect();
        let _ = write!(
            s,
            "\n  {}: {} ({})",
            source.label(),
            snapshot.total(source).unwrap_or(0),
            detail.join(", ")
        );
        if let Some(avg) = snapshot.global_average(source) {
            let _ = write!(s, ", DMT {avg:.2}");
        }
    }
    if !report.validation.warnings().is_empty() {
        s.push_str("\nWarnings:");
        for warning in report.validation.warnings() {
            let _ = write!(s, "\n  - {warning}");
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{january, TestEnv};

    #[tokio::test]
    async fn test_extract() {
        let env = TestEnv::new().await;
        let range = january();
        let args = PeriodArgs::new(env.workbook(), range.from(), range.to());

        let out = extract(&env.config(), &args).await.unwrap();
        let message = out.message();
        assert!(message.contains("CM: 6 (RAF 3, MODIF 1, CREA 2, AUTRE 0)"), "{message}");
        let report = out.structure().unwrap();
        assert_eq!(report.snapshot.total(Source::Pa), Some(4));
        assert!(report.injection.is_none());
        // extract never touches the dashboard
        assert_eq!(env.display_contents(), crate::test::display_template());
    }

    #[tokio::test]
    async fn test_extract_missing_workbook() {
        let env = TestEnv::new().await;
        let range = january();
        let args = PeriodArgs::new(env.root().join("nope.xlsx"), range.from(), range.to());
        let err = extract(&env.config(), &args).await.unwrap_err();
        assert_eq!(err.error_type(), crate::error::ErrorType::Workbook);
    }
}

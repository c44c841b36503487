use crate::args::PeriodArgs;
use crate::commands::extract::summary;
use crate::commands::{load_workbook, now, Out};
use crate::pipeline::{Pipeline, RunContext, RunReport};
use crate::{Config, Result};

/// Runs the whole pipeline for a period and writes both dashboard files.
pub async fn run(config: &Config, args: &PeriodArgs) -> Result<Out<RunReport>> {
    let range = args.range()?;
    let workbook = load_workbook(args.workbook()).await?;
    let target = config.target();
    let report = Pipeline::new().run(&RunContext {
        range,
        workbook: &workbook,
        prices: config.prices(),
        target: Some(&target),
        generated_at: now(),
    })?;
    let message = format!(
        "{}\nUpdated {} and {}",
        summary(&report),
        target.display().display(),
        target.script().display()
    );
    Ok(Out::new(message, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::test::{january, TestEnv};

    #[tokio::test]
    async fn test_run_updates_dashboard() {
        let env = TestEnv::new().await;
        let range = january();
        let args = PeriodArgs::new(env.workbook(), range.from(), range.to());

        let out = run(&env.config(), &args).await.unwrap();
        assert!(out.message().contains("Updated"));
        assert!(out.structure().unwrap().injection.is_some());

        let html = env.display_contents();
        assert!(html.contains(r#"<h2 data-section="cm">CM (6)</h2>"#));
        assert!(html.contains(r#"<span data-count="pa.AD_RAS_AVEC_TEMPS">1</span>"#));
        assert!(html.contains("suivi:generated"));
        let js = env.script_contents();
        assert!(js.contains("/* counts:cm */ [3, 1, 2, 0]"));
        assert!(js.contains("/* counts:pa */ [2, 1, 1, 0, 0]"));
    }

    #[tokio::test]
    async fn test_run_without_dashboard_files() {
        let env = TestEnv::new().await;
        std::fs::remove_file(env.config().script_path()).unwrap();
        let range = january();
        let args = PeriodArgs::new(env.workbook(), range.from(), range.to());

        let err = run(&env.config(), &args).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Injection);
        let message = err.to_string();
        assert!(message.contains("charts.js"), "{message}");
        assert!(message.contains("close the file"), "{message}");
        assert_eq!(env.display_contents(), crate::test::display_template());
    }
}

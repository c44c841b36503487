//! Drives one run: extraction, aggregation, validation and, when there is somewhere to write,
//! injection.

use crate::aggregate::build_snapshot;
use crate::billing::{bill, BillingReport, BillingTable};
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::extract::extract_all;
use crate::inject::{inject, InjectionSummary, InjectionTarget};
use crate::model::{DateRange, Snapshot, Workbook};
use crate::validate::{validate, ValidationReport};
use anyhow::{anyhow, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where a run is. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    RangeSelected,
    Extracting,
    Aggregating,
    Validating,
    Injecting,
    Done,
    Error,
}

serde_plain::derive_display_from_serialize!(Stage);
serde_plain::derive_fromstr_from_deserialize!(Stage);

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Done | Error, _) => false,
            (_, Error) => true,
            (Idle, RangeSelected)
            | (RangeSelected, Extracting)
            | (Extracting, Aggregating)
            | (Aggregating, Validating)
            | (Validating, Injecting)
            | (Validating, Done)
            | (Injecting, Done) => true,
            _ => false,
        }
    }

    /// The public error type of a failure in this stage.
    fn error_type(self) -> ErrorType {
        match self {
            Stage::Idle | Stage::RangeSelected => ErrorType::Request,
            Stage::Extracting | Stage::Aggregating => ErrorType::Extraction,
            Stage::Validating => ErrorType::Validation,
            Stage::Injecting => ErrorType::Injection,
            Stage::Done | Stage::Error => ErrorType::Internal,
        }
    }
}

/// Everything one run needs. Built by the caller; the pipeline holds no other state.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub range: DateRange,
    pub workbook: &'a Workbook,
    pub prices: &'a BillingTable,
    /// `None` stops the run after validation.
    pub target: Option<&'a InjectionTarget>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub snapshot: Snapshot,
    pub validation: ValidationReport,
    pub billing: BillingReport,
    pub injection: Option<InjectionSummary>,
}

/// The state machine of a single run. A pipeline runs once; start a new one for the next run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stage: Stage,
    history: Vec<Stage>,
    failed_at: Option<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            history: vec![Stage::Idle],
            failed_at: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Every stage entered so far, starting with `Idle`.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// The stage that was running when the run failed.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    fn advance(&mut self, next: Stage) -> Res<()> {
        ensure!(
            self.stage.can_advance_to(next),
            "Cannot go from {} to {}",
            self.stage,
            next
        );
        debug!("Pipeline: {} -> {}", self.stage, next);
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    pub fn run(&mut self, ctx: &RunContext<'_>) -> Result<RunReport> {
        if self.stage != Stage::Idle {
            return Err(anyhow!(
                "This pipeline already ran (it is {}), start a new one",
                self.stage
            ))
            .pub_result(ErrorType::Request);
        }
        match self.run_inner(ctx) {
            Ok(report) => Ok(report),
            Err(e) => {
                let stage = self.stage;
                self.failed_at = Some(stage);
                self.stage = Stage::Error;
                self.history.push(Stage::Error);
                Err(e.context(format!("The run failed while {stage}")))
                    .pub_result(stage.error_type())
            }
        }
    }

    fn run_inner(&mut self, ctx: &RunContext<'_>) -> Res<RunReport> {
        self.advance(Stage::RangeSelected)?;
        info!("Period {} ({} days)", ctx.range, ctx.range.days());

        self.advance(Stage::Extracting)?;
        let outcomes = extract_all(ctx.workbook, &ctx.range);

        self.advance(Stage::Aggregating)?;
        let snapshot = build_snapshot(ctx.range, outcomes);
        let billing = bill(&snapshot, ctx.prices);

        self.advance(Stage::Validating)?;
        let validation = validate(&snapshot);
        validation.ensure_valid()?;

        let injection = match ctx.target {
            Some(target) => {
                self.advance(Stage::Injecting)?;
                Some(inject(target, &snapshot, &billing, ctx.generated_at)?)
            }
            None => None,
        };

        self.advance(Stage::Done)?;
        Ok(RunReport {
            snapshot,
            validation,
            billing,
            injection,
        })
    }
}

//! Report → narration text.
//!
//! The narration comes in three parts so the CLI can stream it: a header
//! known before the run, one line per step as it happens, and a summary once
//! the observer has read the final value. Everything here goes to stdout;
//! errors are formatted for stderr.

use tally_core::{CommitOutcome, Error};
use tally_engine::{
    ConflictStage, Mode, ScenarioConfig, ScenarioReport, ScenarioStep, StepAction,
};

/// Execution plan printed before the increments.
pub fn format_plan(mode: Mode) -> &'static str {
    match mode {
        Mode::Serialized => {
            "execution is serialized:\n\
             \n\
             1: T1 reads counter\n\
             2: T1 increments counter and commits\n\
             3: T2 reads counter\n\
             4: T2 increments counter and commits\n"
        }
        Mode::Interleaved => {
            "execution is interleaved:\n\
             \n\
             1: T1 reads counter\n\
             2: T2 reads counter\n\
             3: T1 increments counter and commits\n\
             4: T2 increments counter and commits\n"
        }
    }
}

/// Lines printed before the run starts.
pub fn format_header(config: &ScenarioConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "setting transaction isolation level to: {}\n",
        config.isolation
    ));
    out.push_str("2 transactions are now trying to concurrently increment the counter\n\n");
    out.push_str(format_plan(config.mode));
    out.push('\n');
    out
}

/// One executed step, e.g. `T1 reads 1`.
pub fn format_step(step: &ScenarioStep) -> String {
    let what = match (step.action, step.value) {
        (StepAction::Initialize, Some(v)) => format!("initializes counter to {}", v),
        (StepAction::Initialize, None) => "initializes counter".to_string(),
        (StepAction::Read, Some(v)) => format!("reads {}", v),
        (StepAction::Read, None) => "reads nothing".to_string(),
        (StepAction::Update { .. }, Some(v)) => format!("writes {}", v),
        (StepAction::Update { requested }, None) => format!("could not write {}", requested),
        (StepAction::Commit(CommitOutcome::Committed), _) => "commits".to_string(),
        (StepAction::Commit(CommitOutcome::RolledBack), _) => "rolls back".to_string(),
    };
    format!("{} {}", step.session, what)
}

/// Lines printed once the run has finished.
pub fn format_summary(report: &ScenarioReport) -> String {
    let mut out = String::from("\n");
    if let Some(conflict) = &report.conflict {
        let verb = match conflict.stage {
            ConflictStage::Update => "update counter",
            ConflictStage::Commit => "commit",
        };
        out.push_str(&format!(
            "{} could not {}: {}\n",
            conflict.session, verb, conflict.message
        ));
    }
    out.push_str(&format!("initial counter value is {}\n", report.initial_value));
    out.push_str(&format!("final counter value is {}\n", report.final_value));
    out.push_str(&format!("outcome: {}\n", report.outcome()));
    out
}

/// Full narration of a finished run.
pub fn format_report(report: &ScenarioReport) -> String {
    let mut out = format_header(&report.config);
    for step in &report.steps {
        out.push_str(&format_step(step));
        out.push('\n');
    }
    out.push_str(&format_summary(report));
    out
}

/// Format an error for stderr.
pub fn format_error(err: &Error) -> String {
    format!("(error) {}", err)
}

//! Scenario orchestrator
//!
//! Two sessions increment one counter at the same isolation level, in one of
//! two fixed orders:
//!
//! ```text
//! serialized                      interleaved
//! 1: T1 reads counter             1: T1 reads counter
//! 2: T1 increments, commits       2: T2 reads counter
//! 3: T2 reads counter             3: T1 increments, commits
//! 4: T2 increments, commits       4: T2 increments, commits
//! ```
//!
//! Serialized execution must always end at `initial + 2`; a write conflict
//! there is returned as an error. In interleaved execution a write conflict
//! raised by T2's update or commit is the expected outcome under strong
//! isolation: it is recorded, T2 is committed anyway (which discards it), and
//! the run continues. A third session then reads the final value.
//!
//! Nothing is retried. An increment past `i64::MAX` is refused with
//! `Error::InvalidOperation` before it reaches the store.

use std::fmt;

use tally_core::{
    CommitOutcome, ConflictKind, CounterName, Error, IsolationLevel, Result, StoreConnection,
    TransactionalStore, DEFAULT_BASELINE,
};
use tracing::{info, warn};

use crate::counter::Counter;
use crate::session::{SessionLabel, TransactionSession};

/// Execution order of the two transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// T1 runs to completion before T2 starts
    Serialized,
    /// Both read before either writes
    #[default]
    Interleaved,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Serialized => "serialized",
            Mode::Interleaved => "interleaved",
        })
    }
}

/// Everything a run depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Isolation level of every session in the run
    pub isolation: IsolationLevel,
    /// Execution order
    pub mode: Mode,
    /// Value the counter is reset to before the run
    pub baseline: i64,
    /// Row both transactions increment
    pub counter: CounterName,
}

impl ScenarioConfig {
    /// Run at `isolation` in `mode`, on counter `"a"` from baseline 1
    pub fn new(isolation: IsolationLevel, mode: Mode) -> Self {
        ScenarioConfig {
            isolation,
            mode,
            baseline: DEFAULT_BASELINE,
            counter: CounterName::default(),
        }
    }

    /// Start from a different baseline
    pub fn with_baseline(mut self, baseline: i64) -> Self {
        self.baseline = baseline;
        self
    }

    /// Increment a different row
    pub fn with_counter(mut self, counter: CounterName) -> Self {
        self.counter = counter;
        self
    }
}

/// Operation performed by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Upsert to the baseline and commit
    Initialize,
    /// Read the counter
    Read,
    /// Write a new value
    Update {
        /// Value the session tried to store
        requested: i64,
    },
    /// End the transaction
    Commit(CommitOutcome),
}

/// One executed operation and the value it observed or stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioStep {
    /// Session that ran the operation
    pub session: SessionLabel,
    /// What it did
    pub action: StepAction,
    /// Value read or stored; `None` for commits and failed updates
    pub value: Option<i64>,
}

/// Statement a conflict surfaced on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStage {
    /// The update statement was refused
    Update,
    /// The commit was refused
    Commit,
}

impl fmt::Display for ConflictStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictStage::Update => "update",
            ConflictStage::Commit => "commit",
        })
    }
}

/// A write conflict caught by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// Session whose statement failed
    pub session: SessionLabel,
    /// Statement that failed
    pub stage: ConflictStage,
    /// Conflict classification
    pub kind: ConflictKind,
    /// Full error message from the store
    pub message: String,
}

/// How the run ended, relative to the two increments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both increments landed
    Consistent,
    /// One increment silently overwrote the other
    LostUpdate,
    /// The store refused the second increment
    ConflictDetected,
    /// Anything else
    Unexpected,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Consistent => "consistent: both increments applied",
            Outcome::LostUpdate => "lost update: one increment was overwritten",
            Outcome::ConflictDetected => "conflict detected: the second increment was refused",
            Outcome::Unexpected => "unexpected final value",
        })
    }
}

/// Everything observed during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Configuration the run used
    pub config: ScenarioConfig,
    /// Store backend name
    pub backend: &'static str,
    /// Value read right after initialization
    pub initial_value: i64,
    /// Executed operations in program order
    pub steps: Vec<ScenarioStep>,
    /// Write conflict caught in interleaved mode
    pub conflict: Option<ConflictReport>,
    /// Value read by the fresh observer session
    pub final_value: i64,
}

impl ScenarioReport {
    /// Classify the run from the initial value, the final value and the conflict
    pub fn outcome(&self) -> Outcome {
        match (self.final_value.checked_sub(self.initial_value), &self.conflict) {
            (Some(2), None) => Outcome::Consistent,
            (Some(1), None) => Outcome::LostUpdate,
            (Some(1), Some(_)) => Outcome::ConflictDetected,
            _ => Outcome::Unexpected,
        }
    }

    /// Steps run by one session
    pub fn steps_of(&self, session: SessionLabel) -> impl Iterator<Item = &ScenarioStep> {
        self.steps.iter().filter(move |s| s.session == session)
    }
}

/// A single run against a store
pub struct Scenario<'a, S: TransactionalStore> {
    store: &'a S,
    config: ScenarioConfig,
    steps: Vec<ScenarioStep>,
    on_step: Option<Box<dyn FnMut(&ScenarioStep) + 'a>>,
}

impl<'a, S: TransactionalStore> Scenario<'a, S> {
    /// Prepare a run; nothing touches the store until [`run`](Self::run)
    pub fn new(store: &'a S, config: ScenarioConfig) -> Self {
        Scenario {
            store,
            config,
            steps: Vec::new(),
            on_step: None,
        }
    }

    /// Call `f` with every step as it is recorded
    ///
    /// Steps reach `f` even when the run later fails.
    pub fn on_step(mut self, f: impl FnMut(&ScenarioStep) + 'a) -> Self {
        self.on_step = Some(Box::new(f));
        self
    }

    /// Execute the run and report what happened
    ///
    /// # Errors
    /// Connection failures, unexpected store errors, and any write conflict
    /// other than T2's update or commit in interleaved mode.
    pub fn run(mut self) -> Result<ScenarioReport> {
        info!(
            isolation = %self.config.isolation,
            mode = %self.config.mode,
            backend = self.store.backend_name(),
            baseline = self.config.baseline,
            "starting scenario"
        );

        let mut a = self.open(SessionLabel::A)?;
        let mut b = self.open(SessionLabel::B)?;

        let stored = a.initialize(self.config.baseline)?;
        self.record(SessionLabel::A, StepAction::Initialize, Some(stored));
        let initial_value = self.read(&mut a)?;

        let conflict = match self.config.mode {
            Mode::Serialized => {
                self.increment(&mut a)?;
                self.increment(&mut b)?;
                None
            }
            Mode::Interleaved => {
                let v1 = self.read(&mut a)?;
                let v2 = self.read(&mut b)?;
                self.update(&mut a, next_value(v1)?)?;
                self.commit(&mut a)?;
                self.finish_second(&mut b, next_value(v2)?)?
            }
        };

        let mut observer = self.open(SessionLabel::Observer)?;
        let final_value = self.read(&mut observer)?;
        self.commit(&mut observer)?;

        let report = ScenarioReport {
            config: self.config,
            backend: self.store.backend_name(),
            initial_value,
            steps: self.steps,
            conflict,
            final_value,
        };
        info!(
            initial = report.initial_value,
            final_value = report.final_value,
            outcome = ?report.outcome(),
            "scenario finished"
        );
        Ok(report)
    }

    fn open(&self, label: SessionLabel) -> Result<TransactionSession<S::Connection>> {
        TransactionSession::open(
            self.store,
            label,
            self.config.isolation,
            Counter::new(self.config.counter.clone()),
        )
    }

    /// Read, write read + 1, commit
    fn increment<C: StoreConnection>(&mut self, session: &mut TransactionSession<C>) -> Result<()> {
        let value = self.read(session)?;
        self.update(session, next_value(value)?)?;
        self.commit(session)?;
        Ok(())
    }

    /// T2's update and commit, where a write conflict is an outcome rather than a failure
    fn finish_second<C: StoreConnection>(
        &mut self,
        session: &mut TransactionSession<C>,
        value: i64,
    ) -> Result<Option<ConflictReport>> {
        let label = session.label();
        match self.update(session, value) {
            Ok(_) => match self.commit(session) {
                Ok(_) => Ok(None),
                Err(e) => Ok(Some(self.conflict(label, ConflictStage::Commit, e)?)),
            },
            Err(e) => {
                let report = self.conflict(label, ConflictStage::Update, e)?;
                self.commit(session)?;
                Ok(Some(report))
            }
        }
    }

    /// Keep a write conflict, pass anything else through
    fn conflict(&self, session: SessionLabel, stage: ConflictStage, err: Error) -> Result<ConflictReport> {
        match err.conflict_kind() {
            Some(kind) => {
                warn!(session = %session, stage = %stage, error = %err, "write conflict");
                Ok(ConflictReport {
                    session,
                    stage,
                    kind,
                    message: err.to_string(),
                })
            }
            None => Err(err),
        }
    }

    fn read<C: StoreConnection>(&mut self, session: &mut TransactionSession<C>) -> Result<i64> {
        let value = session.read()?;
        self.record(session.label(), StepAction::Read, Some(value));
        Ok(value)
    }

    fn update<C: StoreConnection>(&mut self, session: &mut TransactionSession<C>, value: i64) -> Result<i64> {
        let action = StepAction::Update { requested: value };
        match session.update(value) {
            Ok(stored) => {
                self.record(session.label(), action, Some(stored));
                Ok(stored)
            }
            Err(e) => {
                self.record(session.label(), action, None);
                Err(e)
            }
        }
    }

    fn commit<C: StoreConnection>(&mut self, session: &mut TransactionSession<C>) -> Result<CommitOutcome> {
        match session.commit() {
            Ok(outcome) => {
                self.record(session.label(), StepAction::Commit(outcome), None);
                Ok(outcome)
            }
            Err(e) => {
                self.record(session.label(), StepAction::Commit(CommitOutcome::RolledBack), None);
                Err(e)
            }
        }
    }

    fn record(&mut self, session: SessionLabel, action: StepAction, value: Option<i64>) {
        let step = ScenarioStep {
            session,
            action,
            value,
        };
        if let Some(f) = self.on_step.as_mut() {
            f(&step);
        }
        self.steps.push(step);
    }
}

fn next_value(value: i64) -> Result<i64> {
    value
        .checked_add(1)
        .ok_or_else(|| Error::InvalidOperation(format!("counter value {} cannot be incremented", value)))
}

//! Per-item outcomes accumulated by each provisioning phase.
//!
//! A failed item is logged and recorded, then the phase moves on. The run
//! fails overall if any phase recorded a failure; items applied before or
//! after it stay applied.

use std::fmt;

use tracing::{error, info};

use crate::error::QosInitError;

/// Result of one provisioning item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Applied,
    Skipped(String),
    Failed(QosInitError),
}

/// One provisioning item and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub target: String,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }
}

/// Outcomes of one phase (global objects, one port, one restricted rerun).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: String,
    pub outcomes: Vec<Outcome>,
}

impl PhaseReport {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn applied(&mut self, target: impl Into<String>) {
        self.outcomes.push(Outcome {
            target: target.into(),
            status: OutcomeStatus::Applied,
        });
    }

    pub fn skipped(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        let target = target.into();
        let reason = reason.into();
        info!("{}: skipping {}: {}", self.phase, target, reason);
        self.outcomes.push(Outcome {
            target,
            status: OutcomeStatus::Skipped(reason),
        });
    }

    pub fn failed(&mut self, target: impl Into<String>, err: QosInitError) {
        let target = target.into();
        error!(
            "{}: failed {}: {}; continuing with the rest of the initialization",
            self.phase, target, err
        );
        self.outcomes.push(Outcome {
            target,
            status: OutcomeStatus::Failed(err),
        });
    }

    /// Records `result` as applied or failed.
    pub fn record<T>(&mut self, target: impl Into<String>, result: Result<T, QosInitError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.applied(target);
                Some(value)
            }
            Err(err) => {
                self.failed(target, err);
                None
            }
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Applied)
            .count()
    }

    pub fn succeeded(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Looks up the outcome recorded for `target`.
    pub fn outcome(&self, target: &str) -> Option<&OutcomeStatus> {
        self.outcomes
            .iter()
            .find(|o| o.target == target)
            .map(|o| &o.status)
    }
}

/// Outcomes of a whole provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: PhaseReport) {
        self.phases.push(phase);
    }

    pub fn succeeded(&self) -> bool {
        self.phases.iter().all(PhaseReport::succeeded)
    }

    pub fn failure_count(&self) -> usize {
        self.phases.iter().map(|p| p.failures().count()).sum()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == name)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let applied: usize = self.phases.iter().map(PhaseReport::applied_count).sum();
        write!(
            f,
            "{} phases, {} applied, {} failed",
            self.phases.len(),
            applied,
            self.failure_count()
        )
    }
}

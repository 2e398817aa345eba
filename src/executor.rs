use crate::session::FileUnit;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Success(Vec<u8>),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Succeeded,
    PartiallySucceeded,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub successes: Vec<(String, Vec<u8>)>,
    pub failures: Vec<UnitFailure>,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn submitted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.name.clone()).collect()
    }

    pub fn status(&self) -> BatchStatus {
        if self.successes.is_empty() {
            BatchStatus::Failed
        } else if self.failures.is_empty() {
            BatchStatus::Succeeded
        } else {
            BatchStatus::PartiallySucceeded
        }
    }

    fn record(&mut self, name: &str, outcome: TransformOutcome) {
        match outcome {
            TransformOutcome::Success(bytes) => self.successes.push((name.to_string(), bytes)),
            TransformOutcome::Failure(reason) => self.failures.push(UnitFailure {
                name: name.to_string(),
                reason,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs a transform over units one at a time, in order.
///
/// `run_batch` borrows the executor mutably, so one executor never has two
/// batches in flight.
#[derive(Debug, Default)]
pub struct SequentialExecutor {
    cancel: CancelToken,
}

impl SequentialExecutor {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_batch<F, P>(
        &mut self,
        units: &[FileUnit],
        mut transform: F,
        mut progress: P,
    ) -> BatchResult
    where
        F: FnMut(&FileUnit) -> anyhow::Result<Vec<u8>>,
        P: FnMut(usize, usize, &str),
    {
        let total = units.len();
        let mut result = BatchResult::default();
        let mut attempted = 0;

        for (index, unit) in units.iter().enumerate() {
            if self.cancel.is_cancelled() {
                result.cancelled = true;
                result.record(&unit.name, TransformOutcome::Failure("cancelled".to_string()));
                continue;
            }

            progress(index, total, &unit.name);
            attempted += 1;

            let outcome = match transform(unit) {
                Ok(bytes) if bytes.is_empty() => {
                    warn!("unit {} ({}) produced empty output", index, unit.name);
                    TransformOutcome::Failure("empty output".to_string())
                }
                Ok(bytes) => {
                    info!("unit {} ({}) ok bytes={}", index, unit.name, bytes.len());
                    TransformOutcome::Success(bytes)
                }
                Err(err) => {
                    warn!("unit {} ({}) failed: {err:#}", index, unit.name);
                    TransformOutcome::Failure(format!("{err:#}"))
                }
            };
            result.record(&unit.name, outcome);
        }

        if result.cancelled {
            warn!("batch cancelled after {} of {} units", attempted, total);
        }
        result
    }
}

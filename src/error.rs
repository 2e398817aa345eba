use crate::session::SessionPhase;
use crate::single_flight::InitError;
use thiserror::Error;

/// Batch-level failures. Per-unit failures never show up here; they are
/// recorded in `BatchResult`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("cannot {action} while session is {phase:?}")]
    InvalidState {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("no files loaded")]
    EmptySession,

    #[error("all {} files failed: {}", .failed.len(), .failed.join(", "))]
    AllFailed { failed: Vec<String> },

    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("engine initialization failed: {0}")]
    EngineInit(#[from] InitError),

    #[error("delivering output failed: {0}")]
    Delivery(String),

    #[error("batch cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The single summary line a user gets for a failed action.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) => msg.clone(),
            PipelineError::InvalidState { .. } => {
                "Another batch is in progress or awaiting dismissal.".to_string()
            }
            PipelineError::EmptySession => "Select at least one file first.".to_string(),
            PipelineError::AllFailed { failed } => format!(
                "None of the {} file(s) could be processed.",
                failed.len()
            ),
            PipelineError::Packaging(_) | PipelineError::Delivery(_) => {
                "Processing finished but the output could not be produced.".to_string()
            }
            PipelineError::EngineInit(_) => {
                "The processing engine could not be started. Please try again.".to_string()
            }
            PipelineError::Cancelled => "Processing was cancelled.".to_string(),
        }
    }
}

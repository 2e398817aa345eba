use crate::executor::{BatchStatus, UnitFailure};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub tool: String,
    pub status: BatchStatus,
    pub submitted: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<UnitFailure>,
    pub artifact: ArtifactReport,
    pub message: String,
    pub started: String,
    pub finished: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub file_name: String,
    pub archive: bool,
    pub entries: Vec<String>,
    pub bytes: u64,
    pub size: String,
    pub path: PathBuf,
}

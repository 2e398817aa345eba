use crate::{
    error::PipelineError,
    executor::{BatchResult, BatchStatus, CancelToken, SequentialExecutor},
    packager::{ArchiveBuilder, Artifact, OutputPackager},
    primitives::format_bytes,
    report::{ArtifactReport, BatchReport},
    session::{FileId, IncomingFile, SessionPhase, SessionState},
    tools::Tool,
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Where a finished artifact goes. Called at most once per successful batch.
pub trait DownloadSink {
    fn deliver(&mut self, artifact: &Artifact) -> Result<PathBuf>;
}

pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&mut self, artifact: &Artifact) -> Result<PathBuf> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(artifact.file_name());
        std::fs::write(&path, artifact.bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Drives one tool through intake, processing, packaging and reset.
pub struct PageController<T: Tool, B: ArchiveBuilder, S: DownloadSink> {
    tool: T,
    packager: OutputPackager<B>,
    sink: S,
    executor: SequentialExecutor,
    session: SessionState,
    max_files: usize,
}

impl<T: Tool, B: ArchiveBuilder, S: DownloadSink> PageController<T, B, S> {
    pub fn new(tool: T, builder: B, sink: S) -> Self {
        let packager = OutputPackager::new(tool.naming(), tool.archive_name(), builder);
        let session = SessionState::new(tool.id());
        Self {
            tool,
            packager,
            sink,
            executor: SequentialExecutor::default(),
            session,
            max_files: usize::MAX,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_executor(mut self, executor: SequentialExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.executor.cancel_token()
    }

    /// Validates every file first; one rejection rejects the whole selection.
    pub fn accept_files(&mut self, incoming: Vec<IncomingFile>) -> Result<Vec<FileId>, PipelineError> {
        self.require(&[SessionPhase::Idle, SessionPhase::Loaded], "accept files")?;
        if incoming.is_empty() {
            return Err(PipelineError::Validation("No files were selected.".to_string()));
        }
        if self.session.files().len() + incoming.len() > self.max_files {
            return Err(PipelineError::Validation(format!(
                "At most {} files can be processed at once.",
                self.max_files
            )));
        }

        let policy = self.tool.accept_policy();
        let rejected = incoming
            .iter()
            .filter_map(|f| policy.check(f).err())
            .collect::<Vec<_>>();
        if !rejected.is_empty() {
            return Err(PipelineError::Validation(rejected.join("; ")));
        }

        let ids = incoming
            .into_iter()
            .map(|f| self.session.push(f))
            .collect::<Vec<_>>();
        self.session.set_phase(SessionPhase::Loaded);
        self.refresh_document();
        info!(
            "session tool={} files={} total={}",
            self.tool.id(),
            self.session.files().len(),
            format_bytes(self.session.total_bytes(), 2)
        );
        Ok(ids)
    }

    pub fn remove_file(&mut self, id: &FileId) -> Result<bool, PipelineError> {
        self.require(&[SessionPhase::Loaded], "remove files")?;
        let removed = self.session.remove(id).is_some();
        if self.session.files().is_empty() {
            self.session.reset();
        } else {
            self.refresh_document();
        }
        Ok(removed)
    }

    pub fn process<P>(&mut self, progress: P) -> Result<BatchReport, PipelineError>
    where
        P: FnMut(usize, usize, &str),
    {
        match self.session.phase() {
            SessionPhase::Loaded => {}
            SessionPhase::Idle => return Err(PipelineError::EmptySession),
            phase => {
                return Err(PipelineError::InvalidState {
                    action: "start processing",
                    phase,
                })
            }
        }

        let started = now_rfc3339();
        let cancel = self.executor.cancel_token();
        // Only a cancel raised while this batch runs applies to it.
        cancel.clear();
        self.session.set_phase(SessionPhase::Processing);

        if let Err(err) = self.tool.prepare(&self.session) {
            warn!("tool {} not ready: {err}", self.tool.id());
            self.session.set_phase(SessionPhase::Loaded);
            return Err(err);
        }

        let tool = &self.tool;
        let result = self
            .executor
            .run_batch(self.session.files(), |unit| tool.transform(unit), progress);
        cancel.clear();

        if result.cancelled {
            self.session.reset();
            return Err(PipelineError::Cancelled);
        }

        let status = result.status();
        if status == BatchStatus::Failed {
            self.session.set_phase(SessionPhase::Failed);
            return Err(PipelineError::AllFailed {
                failed: result.failed_names(),
            });
        }

        let artifact = match self.packager.package(&result.successes) {
            Ok(artifact) => artifact,
            Err(err) => {
                self.session.set_phase(SessionPhase::Failed);
                return Err(err);
            }
        };
        let path = match self.sink.deliver(&artifact) {
            Ok(path) => path,
            Err(err) => {
                self.session.set_phase(SessionPhase::Failed);
                return Err(PipelineError::Delivery(format!("{err:#}")));
            }
        };
        info!("delivered {} to {}", artifact.file_name(), path.display());
        self.session.set_last_output(path.clone());
        self.session.set_phase(match status {
            BatchStatus::Succeeded => SessionPhase::Succeeded,
            _ => SessionPhase::PartiallySucceeded,
        });

        Ok(self.report(&result, &artifact, path, started))
    }

    /// Dismisses a finished batch and returns to `Idle`.
    pub fn acknowledge(&mut self) {
        if self.session.phase().is_terminal() {
            self.session.reset();
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    fn require(&self, allowed: &[SessionPhase], action: &'static str) -> Result<(), PipelineError> {
        let phase = self.session.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(PipelineError::InvalidState { action, phase })
        }
    }

    fn refresh_document(&mut self) {
        let document = match self.session.files() {
            [only] => self.tool.open_document(only),
            _ => None,
        };
        self.session.set_document(document);
    }

    fn report(
        &self,
        result: &BatchResult,
        artifact: &Artifact,
        path: PathBuf,
        started: String,
    ) -> BatchReport {
        let submitted = result.submitted();
        let message = match result.status() {
            BatchStatus::PartiallySucceeded => format!(
                "Processed {} of {} files. Failed: {}.",
                result.successes.len(),
                submitted,
                result.failed_names().join(", ")
            ),
            _ if submitted == 1 => format!("Processed 1 file into {}.", artifact.file_name()),
            _ => format!("Processed {} files into {}.", submitted, artifact.file_name()),
        };
        let entries = match artifact {
            Artifact::Archive { entries, .. } => entries.clone(),
            Artifact::Single { .. } => Vec::new(),
        };
        let bytes = artifact.bytes().len() as u64;

        BatchReport {
            tool: self.tool.id().to_string(),
            status: result.status(),
            submitted,
            succeeded: result.successes.iter().map(|(name, _)| name.clone()).collect(),
            failed: result.failures.clone(),
            artifact: ArtifactReport {
                file_name: artifact.file_name().to_string(),
                archive: artifact.is_archive(),
                entries,
                bytes,
                size: format_bytes(bytes, 2),
                path,
            },
            message,
            started,
            finished: now_rfc3339(),
        }
    }
}

use crate::{
    document::DocumentHandle,
    primitives::format_bytes,
    util::{extension_of, sha256_hex},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as handed over by the host, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub size_bytes: u64,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileUnit {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub bytes: Vec<u8>,
}

impl FileUnit {
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct AcceptPolicy {
    extensions: Vec<String>,
    max_file_bytes: u64,
}

impl AcceptPolicy {
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            max_file_bytes: u64::MAX,
        }
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn check(&self, file: &IncomingFile) -> Result<(), String> {
        let ext = extension_of(&file.name);
        if !ext.as_ref().is_some_and(|e| self.extensions.contains(e)) {
            return Err(format!(
                "{} is not an accepted file type (expected {})",
                file.name,
                self.extensions.join(", ")
            ));
        }
        if file.bytes.is_empty() {
            return Err(format!("{} is empty", file.name));
        }
        if file.size_bytes > self.max_file_bytes {
            return Err(format!(
                "{} is {}, larger than the {} limit",
                file.name,
                format_bytes(file.size_bytes, 2),
                format_bytes(self.max_file_bytes, 2)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Loaded,
    Processing,
    Succeeded,
    PartiallySucceeded,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Succeeded | SessionPhase::PartiallySucceeded | SessionPhase::Failed
        )
    }
}

/// What one tool page currently holds. Owned and mutated by its controller.
pub struct SessionState {
    active_tool: Option<String>,
    files: Vec<FileUnit>,
    phase: SessionPhase,
    document: Option<Box<dyn DocumentHandle>>,
    last_output: Option<PathBuf>,
    next_seq: u64,
}

impl SessionState {
    pub fn new(tool_id: &str) -> Self {
        Self {
            active_tool: Some(tool_id.to_string()),
            files: Vec::new(),
            phase: SessionPhase::Idle,
            document: None,
            last_output: None,
            next_seq: 0,
        }
    }

    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool.as_deref()
    }

    pub fn files(&self) -> &[FileUnit] {
        &self.files
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn document(&self) -> Option<&dyn DocumentHandle> {
        self.document.as_deref()
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    pub(crate) fn push(&mut self, incoming: IncomingFile) -> FileId {
        self.next_seq += 1;
        let digest = sha256_hex(&incoming.bytes);
        let id = FileId(format!("{:04}-{}", self.next_seq, &digest[..12]));
        self.files.push(FileUnit {
            id: id.clone(),
            name: incoming.name,
            size_bytes: incoming.size_bytes,
            bytes: incoming.bytes,
        });
        id
    }

    pub(crate) fn remove(&mut self, id: &FileId) -> Option<FileUnit> {
        let pos = self.files.iter().position(|f| &f.id == id)?;
        Some(self.files.remove(pos))
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_document(&mut self, document: Option<Box<dyn DocumentHandle>>) {
        self.document = document;
    }

    pub(crate) fn set_last_output(&mut self, path: PathBuf) {
        self.last_output = Some(path);
    }

    /// Drops files, the document handle and the last output; back to `Idle`.
    pub(crate) fn reset(&mut self) {
        self.files.clear();
        self.document = None;
        self.last_output = None;
        self.phase = SessionPhase::Idle;
    }
}

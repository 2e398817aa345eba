use crate::{config::Config, error::PipelineError};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// How a tool names the output produced for one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingRule {
    /// `report.pdf` becomes `repaired_report.pdf`.
    Prefix(String),
    /// `scan.jpg` becomes `scan.pdf`.
    ReplaceExtension(String),
}

impl NamingRule {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingRule::Prefix(prefix) => format!("{prefix}{name}"),
            NamingRule::ReplaceExtension(ext) => {
                let stem = Path::new(name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name);
                format!("{stem}.{ext}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum Artifact {
    Single {
        file_name: String,
        bytes: Vec<u8>,
    },
    Archive {
        file_name: String,
        bytes: Vec<u8>,
        entries: Vec<String>,
    },
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        match self {
            Artifact::Single { file_name, .. } | Artifact::Archive { file_name, .. } => file_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Artifact::Single { bytes, .. } | Artifact::Archive { bytes, .. } => bytes,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Artifact::Archive { .. })
    }
}

pub trait ArchiveBuilder {
    fn build(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>>;
}

pub struct ZipArchiveBuilder {
    method: CompressionMethod,
}

impl ZipArchiveBuilder {
    pub fn new(method: CompressionMethod) -> Self {
        Self { method }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let method = match cfg.archive.compression.to_ascii_lowercase().as_str() {
            "stored" => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        Self::new(method)
    }
}

impl Default for ZipArchiveBuilder {
    fn default() -> Self {
        Self::new(CompressionMethod::Deflated)
    }
}

impl ArchiveBuilder for ZipArchiveBuilder {
    fn build(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(self.method);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in entries {
            writer
                .start_file(entry.name.as_str(), options)
                .with_context(|| format!("zip entry {}", entry.name))?;
            writer
                .write_all(&entry.bytes)
                .with_context(|| format!("zip write {}", entry.name))?;
        }
        let cursor = writer.finish().context("finishing zip")?;
        Ok(cursor.into_inner())
    }
}

pub struct OutputPackager<B: ArchiveBuilder> {
    naming: NamingRule,
    archive_name: String,
    builder: B,
}

impl<B: ArchiveBuilder> OutputPackager<B> {
    pub fn new(naming: NamingRule, archive_name: impl Into<String>, builder: B) -> Self {
        Self {
            naming,
            archive_name: archive_name.into(),
            builder,
        }
    }

    pub fn naming(&self) -> &NamingRule {
        &self.naming
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// One success is emitted as-is under its output name; two or more go
    /// into a single archive, one entry each, in the order given.
    pub fn package(&self, successes: &[(String, Vec<u8>)]) -> Result<Artifact, PipelineError> {
        match successes {
            [] => Err(PipelineError::Packaging("nothing to package".to_string())),
            [(name, bytes)] => Ok(Artifact::Single {
                file_name: self.naming.apply(name),
                bytes: bytes.clone(),
            }),
            many => {
                let entries = self.entries(many);
                let names = entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
                let bytes = self
                    .builder
                    .build(&entries)
                    .map_err(|e| PipelineError::Packaging(format!("{e:#}")))?;
                info!(
                    "archive {} entries={} bytes={}",
                    self.archive_name,
                    names.len(),
                    bytes.len()
                );
                Ok(Artifact::Archive {
                    file_name: self.archive_name.clone(),
                    bytes,
                    entries: names,
                })
            }
        }
    }

    fn entries(&self, successes: &[(String, Vec<u8>)]) -> Vec<ArchiveEntry> {
        let mut used = HashSet::new();
        successes
            .iter()
            .map(|(name, bytes)| {
                let name = unique_name(&self.naming.apply(name), &mut used);
                ArchiveEntry {
                    name,
                    bytes: bytes.clone(),
                }
            })
            .collect()
    }
}

/// Appends ` (2)`, ` (3)`, ... before the extension until the name is unused.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if used.insert(candidate.clone()) {
            debug!("renamed duplicate entry {name} -> {candidate}");
            return candidate;
        }
        n += 1;
    }
}

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use docbatch::{
    controller::DownloadSink,
    engine::{EngineLoader, SandboxedEngine},
    packager::{ArchiveBuilder, ArchiveEntry, Artifact},
    session::IncomingFile,
};
use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// PDF with `num_pages` pages; the MediaBox lives on the page tree root so
/// pages have to inherit it.
pub fn sample_pdf(num_pages: u32, width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(72)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ]),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let content = doc.get_page_content(*id).unwrap();
            String::from_utf8_lossy(&content).into_owned()
        })
        .collect()
}

/// Smallest byte stream the frame-header scan accepts: SOI, SOF0, SOS, EOI.
pub fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
    out.extend_from_slice(&[0x00, 0xFF, 0xD9]);
    out
}

pub fn incoming(name: &str, bytes: &[u8]) -> IncomingFile {
    IncomingFile::new(name, bytes.to_vec())
}

/// In-memory engine. Input markers steer it:
/// `THROW` makes `call_main` fail, `NOOUT` skips writing output,
/// `EMPTY` writes an empty output, `READFAIL` makes `read_file` fail.
pub struct FakeEngine {
    files: HashMap<String, Vec<u8>>,
    log: Arc<Mutex<Vec<String>>>,
    failing_unlinks: Vec<String>,
    call_delay: Duration,
}

impl FakeEngine {
    fn note(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn input(&self) -> Vec<u8> {
        self.files.get("/input.pdf").cloned().unwrap_or_default()
    }
}

fn has(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

impl SandboxedEngine for FakeEngine {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.note(format!("write {path}"));
        self.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn call_main(&mut self, argv: &[String]) -> Result<()> {
        self.note(format!("main {}", argv.join(" ")));
        if !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
        let input = self.input();
        if !has(&input, "NOOUT") {
            let output = if has(&input, "EMPTY") {
                Vec::new()
            } else {
                [b"REPAIRED:".as_slice(), input.as_slice()].concat()
            };
            self.files.insert("/output.pdf".to_string(), output);
        }
        if has(&input, "THROW") {
            bail!("engine aborted");
        }
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        self.note(format!("read {path}"));
        if has(&self.input(), "READFAIL") {
            bail!("read error");
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {path}"))
    }

    fn unlink(&mut self, path: &str) -> Result<()> {
        self.note(format!("unlink {path}"));
        if self.failing_unlinks.iter().any(|p| p == path) {
            bail!("unlink refused: {path}");
        }
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no such file: {path}"))
    }
}

#[derive(Clone, Default)]
pub struct FakeLoader {
    pub loads: Arc<AtomicUsize>,
    pub failures_left: Arc<AtomicUsize>,
    pub delay: Duration,
    pub log: Arc<Mutex<Vec<String>>>,
    pub failing_unlinks: Vec<String>,
    pub call_delay: Duration,
}

impl FakeLoader {
    pub fn failing(times: usize) -> Self {
        let loader = Self::default();
        loader.failures_left.store(times, Ordering::SeqCst);
        loader
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl EngineLoader for FakeLoader {
    type Engine = FakeEngine;

    fn load(&self) -> Result<FakeEngine> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            bail!("bootstrap failed");
        }
        Ok(FakeEngine {
            files: HashMap::new(),
            log: Arc::clone(&self.log),
            failing_unlinks: self.failing_unlinks.clone(),
            call_delay: self.call_delay,
        })
    }
}

#[derive(Default)]
pub struct MemorySink {
    pub delivered: Vec<(String, Vec<u8>, bool)>,
}

impl DownloadSink for MemorySink {
    fn deliver(&mut self, artifact: &Artifact) -> Result<PathBuf> {
        self.delivered.push((
            artifact.file_name().to_string(),
            artifact.bytes().to_vec(),
            artifact.is_archive(),
        ));
        Ok(PathBuf::from("memory").join(artifact.file_name()))
    }
}

pub struct FailingBuilder;

impl ArchiveBuilder for FailingBuilder {
    fn build(&self, _entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        bail!("out of memory while generating archive")
    }
}

pub fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

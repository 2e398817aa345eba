pub mod adapter;
pub mod process;
pub mod qpdf;
pub mod types;

use anyhow::Result;

pub use adapter::{EngineAdapter, EnginePaths};
pub use types::EngineDiag;

/// An external engine that only sees files through its own path namespace.
///
/// Every path handed to these methods is a virtual path inside the engine's
/// namespace, never a host path.
pub trait SandboxedEngine {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()>;
    fn call_main(&mut self, argv: &[String]) -> Result<()>;
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>>;
    fn unlink(&mut self, path: &str) -> Result<()>;
}

/// One-time bootstrap of a [`SandboxedEngine`]. May fail; callers may retry.
pub trait EngineLoader {
    type Engine: SandboxedEngine;

    fn load(&self) -> Result<Self::Engine>;
}

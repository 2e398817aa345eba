pub mod extract;
pub mod img2pdf;
pub mod repair;

use crate::{
    document::DocumentHandle,
    error::PipelineError,
    packager::NamingRule,
    session::{AcceptPolicy, FileUnit, SessionState},
};

pub use extract::ExtractTool;
pub use img2pdf::ImageTool;
pub use repair::RepairTool;

/// One document tool: what it accepts, how it names output, and the
/// per-file transform the executor runs.
pub trait Tool {
    fn id(&self) -> &str;

    fn accept_policy(&self) -> &AcceptPolicy;

    fn naming(&self) -> NamingRule;

    fn archive_name(&self) -> &str;

    /// Parsed handle for a file while it is the only one loaded.
    fn open_document(&self, _unit: &FileUnit) -> Option<Box<dyn DocumentHandle>> {
        None
    }

    /// Checks run after "start" and before any file is touched. An error here
    /// aborts the batch and leaves the files loaded.
    fn prepare(&self, _session: &SessionState) -> Result<(), PipelineError> {
        Ok(())
    }

    fn transform(&self, unit: &FileUnit) -> anyhow::Result<Vec<u8>>;
}

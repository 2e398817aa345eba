use super::Tool;
use crate::{
    config::Config,
    document::{DocumentHandle, LopdfDocument},
    error::PipelineError,
    packager::NamingRule,
    primitives::{page_range_tokens_valid, parse_page_ranges},
    session::{AcceptPolicy, FileUnit, SessionState},
};
use anyhow::{bail, Result};
use tracing::{debug, warn};

/// Copies a page selection such as `"1,3-5"` out of every input PDF.
pub struct ExtractTool {
    ranges: String,
    policy: AcceptPolicy,
    prefix: String,
    archive_name: String,
}

impl ExtractTool {
    pub fn new(ranges: impl Into<String>, cfg: &Config) -> Self {
        Self {
            ranges: ranges.into(),
            policy: AcceptPolicy::new(&["pdf"]).with_max_file_bytes(cfg.intake.max_file_bytes),
            prefix: cfg.tools.extract.output_prefix.clone(),
            archive_name: cfg.tools.extract.archive_name.clone(),
        }
    }

    pub fn ranges(&self) -> &str {
        &self.ranges
    }
}

impl Tool for ExtractTool {
    fn id(&self) -> &str {
        "extract"
    }

    fn accept_policy(&self) -> &AcceptPolicy {
        &self.policy
    }

    fn naming(&self) -> NamingRule {
        NamingRule::Prefix(self.prefix.clone())
    }

    fn archive_name(&self) -> &str {
        &self.archive_name
    }

    fn open_document(&self, unit: &FileUnit) -> Option<Box<dyn DocumentHandle>> {
        match LopdfDocument::load(&unit.bytes) {
            Ok(doc) => {
                debug!("opened {} pages={}", unit.name, doc.page_count());
                Some(Box::new(doc))
            }
            Err(err) => {
                warn!("could not open {}: {err:#}", unit.name);
                None
            }
        }
    }

    fn prepare(&self, session: &SessionState) -> Result<(), PipelineError> {
        if !page_range_tokens_valid(&self.ranges) {
            return Err(PipelineError::Validation(format!(
                "\"{}\" does not name any pages.",
                self.ranges
            )));
        }
        if let Some(doc) = session.document() {
            let pages = doc.page_count();
            if parse_page_ranges(&self.ranges, pages).is_empty() {
                return Err(PipelineError::Validation(format!(
                    "\"{}\" selects no pages of a {}-page document.",
                    self.ranges, pages
                )));
            }
        }
        Ok(())
    }

    fn transform(&self, unit: &FileUnit) -> Result<Vec<u8>> {
        let doc = LopdfDocument::load(&unit.bytes)?;
        let total = doc.page_count();
        let indices = parse_page_ranges(&self.ranges, total);
        if indices.is_empty() {
            bail!("\"{}\" selects no pages of {} ({} pages)", self.ranges, unit.name, total);
        }
        debug!("extract {} pages={:?}", unit.name, indices);
        let mut out = doc.extract_pages(&indices)?;
        out.serialize()
    }
}

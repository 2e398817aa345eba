use super::Tool;
use crate::{
    config::Config,
    document::{DocumentHandle, LopdfDocument},
    engine::{EngineAdapter, EngineLoader},
    error::PipelineError,
    packager::NamingRule,
    session::{AcceptPolicy, FileUnit, SessionState},
};
use anyhow::{bail, Context, Result};

pub struct RepairTool<'a, L: EngineLoader> {
    adapter: &'a EngineAdapter<L>,
    policy: AcceptPolicy,
    prefix: String,
    archive_name: String,
    verify_output: bool,
}

impl<'a, L: EngineLoader> RepairTool<'a, L> {
    pub fn new(adapter: &'a EngineAdapter<L>, cfg: &Config) -> Self {
        Self {
            adapter,
            policy: AcceptPolicy::new(&["pdf"]).with_max_file_bytes(cfg.intake.max_file_bytes),
            prefix: cfg.tools.repair.output_prefix.clone(),
            archive_name: cfg.tools.repair.archive_name.clone(),
            verify_output: cfg.engine.verify_output,
        }
    }
}

impl<L: EngineLoader> Tool for RepairTool<'_, L> {
    fn id(&self) -> &str {
        "repair"
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

    fn prepare(&self, _session: &SessionState) -> Result<(), PipelineError> {
        self.adapter.ensure_loaded()?;
        Ok(())
    }

    fn transform(&self, unit: &FileUnit) -> Result<Vec<u8>> {
        // Any non-empty output counts, even when the engine reported an error.
        let Some(repaired) = self.adapter.repair_one(&unit.bytes)? else {
            bail!("engine produced no output for {}", unit.name);
        };
        if self.verify_output {
            LopdfDocument::load(&repaired)
                .with_context(|| format!("repaired {} does not parse", unit.name))?;
        }
        Ok(repaired)
    }
}

use super::{EngineLoader, SandboxedEngine};
use crate::{cleanup, config::Config, error::PipelineError, single_flight::{InitError, SingleFlight}};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Fixed virtual paths and the argument list used for every repair call.
#[derive(Debug, Clone)]
pub struct EnginePaths {
    pub input: String,
    pub output: String,
    pub args: Vec<String>,
}

impl EnginePaths {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            input: cfg.engine.input_path.clone(),
            output: cfg.engine.output_path.clone(),
            args: cfg.engine.repair_args.clone(),
        }
    }

    /// Expands `{input}` and `{output}` placeholders in the configured args.
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{input}", &self.input).replace("{output}", &self.output))
            .collect()
    }
}

impl Default for EnginePaths {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Lazily loads one engine and serializes every call made against it.
///
/// The engine's input and output paths are fixed, so two calls running at
/// once would overwrite each other; the engine mutex rules that out.
pub struct EngineAdapter<L: EngineLoader> {
    loader: L,
    engine: SingleFlight<Mutex<L::Engine>>,
    paths: EnginePaths,
}

impl<L: EngineLoader> EngineAdapter<L> {
    pub fn new(loader: L, paths: EnginePaths) -> Self {
        Self {
            loader,
            engine: SingleFlight::new(),
            paths,
        }
    }

    pub fn paths(&self) -> &EnginePaths {
        &self.paths
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    pub fn ensure_loaded(&self) -> Result<Arc<Mutex<L::Engine>>, InitError> {
        self.engine.get_or_try_init(|| {
            info!("loading repair engine");
            self.loader.load().map(Mutex::new)
        })
    }

    /// Runs the engine over one file. `Ok(None)` means the engine left no
    /// usable output; only a failed bootstrap is an error.
    pub fn repair_one(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>, PipelineError> {
        let handle = self.ensure_loaded()?;
        let mut engine = handle.lock().unwrap_or_else(PoisonError::into_inner);
        let input = self.paths.input.as_str();
        let output = self.paths.output.as_str();

        let produced = match engine.write_file(input, bytes) {
            Err(err) => {
                warn!("writing {input} into engine failed: {err:#}");
                None
            }
            Ok(()) => {
                let argv = self.paths.argv();
                debug!(?argv, "engine call");
                if let Err(err) = engine.call_main(&argv) {
                    warn!("engine reported failure, reading output anyway: {err:#}");
                }
                match engine.read_file(output) {
                    Ok(out) => Some(out),
                    Err(err) => {
                        debug!("no engine output at {output}: {err:#}");
                        None
                    }
                }
            }
        };

        cleanup::release_all([input, output], |path| engine.unlink(path));

        Ok(produced.filter(|out| !out.is_empty()))
    }
}

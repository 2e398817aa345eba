use super::{process::run_captured, types::EngineDiag, EngineLoader, SandboxedEngine};
use crate::{config::Config, util::ensure_dir};
use anyhow::{anyhow, bail, Context, Result};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// Boots a `qpdf` executable with a private scratch directory as its
/// filesystem namespace.
pub struct QpdfLoader {
    cfg: Config,
}

impl QpdfLoader {
    pub fn new(cfg: &Config) -> Self {
        Self { cfg: cfg.clone() }
    }

    fn scratch_dir(&self) -> PathBuf {
        PathBuf::from(&self.cfg.paths.work_dir).join(format!("engine-{}", std::process::id()))
    }

    pub fn doctor(&self) -> EngineDiag {
        let exe = resolve_qpdf_exe(&self.cfg.engine.qpdf_exe);
        let version = probe_version(&exe, self.cfg.engine.version_timeout_seconds);
        EngineDiag {
            exe: exe.display().to_string(),
            version: version.as_ref().ok().cloned(),
            scratch_dir: self.scratch_dir().display().to_string(),
            ok: version.is_ok(),
            error: version.err().map(|e| format!("{e:#}")),
        }
    }
}

impl EngineLoader for QpdfLoader {
    type Engine = QpdfEngine;

    fn load(&self) -> Result<QpdfEngine> {
        let exe = resolve_qpdf_exe(&self.cfg.engine.qpdf_exe);
        let version = probe_version(&exe, self.cfg.engine.version_timeout_seconds)
            .with_context(|| format!("bootstrapping engine: {}", exe.display()))?;
        let root = self.scratch_dir();
        ensure_dir(&root)?;
        info!("engine ready exe={} version={} scratch={}", exe.display(), version, root.display());

        let timeout = match self.cfg.engine.call_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(QpdfEngine::new(exe, root, timeout))
    }
}

pub struct QpdfEngine {
    exe: PathBuf,
    root: PathBuf,
    timeout: Option<Duration>,
}

impl QpdfEngine {
    pub fn new(exe: PathBuf, root: PathBuf, timeout: Option<Duration>) -> Self {
        Self { exe, root, timeout }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a virtual path like `/input.pdf` into the scratch directory.
    fn resolve(&self, virtual_path: &str) -> Result<PathBuf> {
        let rel = virtual_path.trim_start_matches('/');
        let escapes = Path::new(rel)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if rel.is_empty() || escapes {
            bail!("virtual path is outside the engine namespace: {virtual_path}");
        }
        Ok(self.root.join(rel))
    }
}

impl SandboxedEngine for QpdfEngine {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let host = self.resolve(path)?;
        std::fs::write(&host, bytes).with_context(|| format!("write {}", host.display()))
    }

    fn call_main(&mut self, argv: &[String]) -> Result<()> {
        let mut args: Vec<OsString> = Vec::with_capacity(argv.len());
        for arg in argv {
            if arg.starts_with('/') {
                args.push(self.resolve(arg)?.into_os_string());
            } else {
                args.push(OsString::from(arg));
            }
        }

        let mut cmd = Command::new(&self.exe);
        cmd.args(&args).current_dir(&self.root);
        let output = run_captured(&mut cmd, self.timeout)?;

        if !output.stderr.is_empty() {
            debug!("qpdf stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        if !output.status.success() {
            // qpdf exits 3 when it succeeded with warnings and 2 on errors;
            // either way an output file may exist.
            return Err(anyhow!(
                "qpdf exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let host = self.resolve(path)?;
        std::fs::read(&host).with_context(|| format!("read {}", host.display()))
    }

    fn unlink(&mut self, path: &str) -> Result<()> {
        let host = self.resolve(path)?;
        std::fs::remove_file(&host).with_context(|| format!("remove {}", host.display()))
    }
}

impl Drop for QpdfEngine {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.root) {
            debug!("leaving scratch dir {}: {err}", self.root.display());
        }
    }
}

fn resolve_qpdf_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("DOCBATCH_QPDF") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("qpdf");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn probe_version(exe: &Path, timeout_seconds: u64) -> Result<String> {
    let mut cmd = Command::new(exe);
    cmd.arg("--version");
    let timeout = (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds));
    let output = run_captured(&mut cmd, timeout)?;
    if !output.status.success() {
        bail!(
            "{} --version failed: {}",
            exe.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

use tracing::warn;

#[derive(Debug, Default, Clone)]
pub struct CleanupReport {
    pub attempted: usize,
    pub failures: Vec<CleanupFailure>,
}

#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub target: String,
    pub error: String,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Releases every target, one attempt each. A failed release is logged and
/// recorded; it never stops the remaining releases.
pub fn release_all<'a, I, F>(targets: I, mut release: F) -> CleanupReport
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> anyhow::Result<()>,
{
    let mut report = CleanupReport::default();
    for target in targets {
        report.attempted += 1;
        if let Err(err) = release(target) {
            warn!("cleanup of {target} failed: {err:#}");
            report.failures.push(CleanupFailure {
                target: target.to_string(),
                error: format!("{err:#}"),
            });
        }
    }
    report
}

//! Report stage: persist the run report to every configured sink.

use archive_core::{render_report_location, Error, ReportSink, RunReport, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{info, warn};

/// Writes reports as pretty JSON files, one per run date.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    template: String,
}

impl FileReportSink {
    /// `template` must contain `{date}`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Path the report for `report.date` is written to.
    pub fn path_for(&self, report: &RunReport) -> PathBuf {
        PathBuf::from(render_report_location(&self.template, report.date))
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    /// Writes to a sibling temp file and renames it over the target, so a
    /// reader never sees a half-written report.
    async fn write(&self, report: &RunReport) -> StoreResult<String> {
        let path = self.path_for(report);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = report.to_json_pretty()?;
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(path.display().to_string())
    }

    fn sink_name(&self) -> &'static str {
        "file"
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Where a report ended up.
#[derive(Debug, Default)]
pub struct ReportDelivery {
    pub locations: Vec<String>,
    pub failures: Vec<Error>,
}

impl ReportDelivery {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans a report out to its sinks. Each sink is attempted independently
/// and a failure never propagates past the report stage.
#[derive(Clone, Default)]
pub struct Reporter {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl Reporter {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub async fn publish(&self, report: &RunReport) -> ReportDelivery {
        let mut delivery = ReportDelivery::default();

        for sink in &self.sinks {
            match sink.write(report).await {
                Ok(location) => {
                    info!(
                        sink = sink.sink_name(),
                        location = %location,
                        "Report written"
                    );
                    delivery.locations.push(location);
                }
                Err(source) => {
                    let err = Error::report(sink.sink_name(), source);
                    metrics().report_errors.inc();
                    warn!(code = err.error_code(), error = %err, "Report write failed");
                    delivery.failures.push(err);
                }
            }
        }

        delivery
    }
}

use crate::reporting;
use kestrel_domain::entities::metrics::Results;
use kestrel_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use kestrel_domain::services::audit::AuditEvent;
use kestrel_domain::value_objects::equity_point::EquityPoint;
use kestrel_domain::value_objects::trade::Trade;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Read,
    Write,
}

/// Runs one artifact operation and records `kestrel.infra.artifacts.*`
/// call counts and latency labelled by artifact kind and outcome.
fn timed<T>(
    direction: Direction,
    kind: &'static str,
    op: impl FnOnce() -> Result<T, String>,
) -> Result<T, String> {
    let start = Instant::now();
    let result = op();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let outcome = if result.is_ok() { "ok" } else { "err" };

    match direction {
        Direction::Read => {
            metrics::counter!("kestrel.infra.artifacts.read.calls_total", "kind" => kind, "result" => outcome)
                .increment(1);
            metrics::histogram!("kestrel.infra.artifacts.read_ms", "kind" => kind, "result" => outcome)
                .record(elapsed_ms);
        }
        Direction::Write => {
            metrics::counter!("kestrel.infra.artifacts.write.calls_total", "kind" => kind, "result" => outcome)
                .increment(1);
            metrics::histogram!("kestrel.infra.artifacts.write_ms", "kind" => kind, "result" => outcome)
                .record(elapsed_ms);
        }
    }
    if let Err(err) = &result {
        tracing::error!(kind, ?direction, error = %err, "artifact operation failed");
    }
    result
}

/// Writes run artifacts under a run directory on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        timed(Direction::Write, "ensure_dir", || {
            fs::create_dir_all(path)
                .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
        })
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String> {
        timed(Direction::Write, "trades_csv", || {
            reporting::write_trades_csv(path, trades)
        })
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        timed(Direction::Write, "equity_csv", || {
            reporting::write_equity_csv(path, points)
        })
    }

    fn write_summary_json(
        &self,
        path: &Path,
        results: &Results,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        timed(Direction::Write, "summary_json", || {
            reporting::write_summary_json(path, results, meta)
        })
    }

    fn write_summary_html(
        &self,
        path: &Path,
        results: &Results,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        timed(Direction::Write, "summary_html", || {
            reporting::write_summary_html(path, results, meta)
        })
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        timed(Direction::Write, "audit_jsonl", || {
            reporting::write_audit_jsonl(path, events)
        })
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        timed(Direction::Write, "config_snapshot_toml", || {
            fs::write(path, contents).map_err(|err| {
                format!("failed to write config snapshot {}: {}", path.display(), err)
            })
        })
    }
}

/// Reads a finished run directory back for report regeneration.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactReader;

impl FilesystemArtifactReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactReader for FilesystemArtifactReader {
    fn read_trades_csv(&self, path: &Path) -> Result<Vec<Trade>, String> {
        timed(Direction::Read, "trades_csv", || reporting::read_trades_csv(path))
    }

    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String> {
        timed(Direction::Read, "equity_csv", || reporting::read_equity_csv(path))
    }

    fn read_summary_json(&self, path: &Path) -> Result<serde_json::Value, String> {
        timed(Direction::Read, "summary_json", || {
            reporting::read_summary_json(path)
        })
    }

    /// A run written before snapshots existed has none; that is not an error.
    fn read_config_snapshot_toml(&self, path: &Path) -> Result<Option<String>, String> {
        timed(Direction::Read, "config_snapshot_toml", || {
            if !path.exists() {
                return Ok(None);
            }
            fs::read_to_string(path).map(Some).map_err(|err| {
                format!("failed to read config snapshot {}: {}", path.display(), err)
            })
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

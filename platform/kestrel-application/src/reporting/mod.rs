use crate::config::{parse_config_str, Config};
use crate::shared::{
    build_metrics_config, config_snapshot_json, html_enabled, resolve_commission,
    resolve_execution_config, summary_meta_json,
};
use kestrel_domain::entities::metrics::{results_from_parts, MetricsConfig, Results};
use kestrel_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use kestrel_domain::services::audit::AuditEvent;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info_span;

pub struct GenerateReportResult {
    pub input_dir: PathBuf,
    pub run_id: String,
    pub results: Results,
    pub wrote_html: bool,
}

/// Recomputes a run's results from its `trades.csv` and `equity.csv` and
/// rewrites `summary.json` (and `summary.html` when enabled).
pub fn generate_report(
    input_dir: &Path,
    reader: &dyn ArtifactReader,
    writer: &dyn ArtifactWriter,
) -> Result<GenerateReportResult, String> {
    let _span = info_span!("generate_report", input_dir = %input_dir.display()).entered();

    let stage_start = Instant::now();
    let trades_path = input_dir.join("trades.csv");
    let equity_path = input_dir.join("equity.csv");
    let summary_path = input_dir.join("summary.json");
    let config_path = input_dir.join("config_snapshot.toml");

    if !reader.exists(&trades_path) || !reader.exists(&equity_path) {
        return Err(format!(
            "missing trades.csv or equity.csv in {}",
            input_dir.display()
        ));
    }

    let trades = reader.read_trades_csv(&trades_path)?;
    let equity = reader.read_equity_csv(&equity_path)?;

    let config = reader
        .read_config_snapshot_toml(&config_path)?
        .and_then(|raw| parse_config_str(&raw).ok().map(|config| (config, raw)));
    let metrics_config = match &config {
        Some((config, _)) => build_metrics_config(config)?,
        None => MetricsConfig::default(),
    };
    let initial_capital = resolve_initial_capital(
        config.as_ref().map(|(config, _)| config),
        reader,
        &summary_path,
    )
    .or_else(|| equity.first().map(|point| point.equity))
    .unwrap_or(0.0);

    let results = results_from_parts(initial_capital, &trades, &equity, &metrics_config);
    metrics::histogram!("kestrel.report.generate_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("kestrel.report.trades").set(trades.len() as f64);
    metrics::gauge!("kestrel.report.ticks_processed").set(results.ticks_processed as f64);

    let (run_id, meta, wrote_html) = match &config {
        Some((config, raw)) => {
            let strategy = serde_json::to_value(config.strategy.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let mut meta = summary_meta_json(config, &strategy, Some(raw), &equity);
            meta["config"] = config_snapshot_json(
                config,
                &resolve_execution_config(config)?,
                &resolve_commission(config)?,
                &metrics_config,
            );
            (config.run.run_id.clone(), Some(meta), html_enabled(config))
        }
        None => ("unknown".to_string(), None, false),
    };

    writer.write_summary_json(&summary_path, &results, meta.as_ref())?;
    if wrote_html {
        writer.write_summary_html(
            input_dir.join("summary.html").as_path(),
            &results,
            meta.as_ref(),
        )?;
    }

    let event = AuditEvent {
        run_id: run_id.clone(),
        timestamp: equity.last().map(|p| p.timestamp).unwrap_or(0),
        stage: "report".to_string(),
        symbol: None,
        action: "recompute".to_string(),
        error: None,
        details: serde_json::json!({
            "input_dir": input_dir.display().to_string(),
            "trades": results.total_trades,
            "ticks_processed": results.ticks_processed,
            "total_return": results.total_return,
            "sharpe_ratio": results.sharpe_ratio,
            "max_drawdown": results.max_drawdown,
        }),
    };
    writer.write_audit_jsonl(input_dir.join("report.jsonl").as_path(), &[event])?;

    Ok(GenerateReportResult {
        input_dir: input_dir.to_path_buf(),
        run_id,
        results,
        wrote_html,
    })
}

fn resolve_initial_capital(
    config: Option<&Config>,
    reader: &dyn ArtifactReader,
    summary_path: &Path,
) -> Option<f64> {
    if let Some(config) = config {
        return Some(config.run.initial_capital);
    }
    if !reader.exists(summary_path) {
        return None;
    }
    reader
        .read_summary_json(summary_path)
        .ok()?
        .get("summary")?
        .get("initial_capital")?
        .as_f64()
}

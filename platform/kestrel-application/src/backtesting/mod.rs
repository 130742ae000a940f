use crate::config::Config;
use crate::shared::{
    build_metrics_config, build_strategy, config_snapshot_json, html_enabled, load_series,
    resolve_commission, resolve_execution_config, summary_meta_json,
};
use kestrel_domain::entities::metrics::Results;
use kestrel_domain::repositories::artifacts::ArtifactWriter;
use kestrel_domain::repositories::market_data::TickRepository;
use kestrel_domain::services::audit::AuditEvent;
use kestrel_domain::services::engine::backtest::{BacktestConfig, BacktestResults, BacktestRunner};
use kestrel_domain::services::strategy::Strategy;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

pub struct BacktestReport {
    pub run_dir: PathBuf,
    pub results: Results,
}

pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    ticks: &dyn TickRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestReport, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        seed = config.run.seed
    )
    .entered();

    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let execution = resolve_execution_config(config)?;
    let commission = resolve_commission(config)?;
    let metrics_config = build_metrics_config(config)?;
    let strategy = build_strategy(config, &execution)?;

    let stage_start = Instant::now();
    let series = load_series(config, ticks)?;
    metrics::histogram!("kestrel.backtest.load_ticks_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    audit_extras.push(timing_event(
        &config.run.run_id,
        "load_ticks",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({
            "rows": series.len(),
            "source": config.data.source,
        }),
    ));
    tracing::info!(ticks = series.len(), "tick data ready");

    let strategy_name = strategy.name().to_string();
    let backtest_config = BacktestConfig {
        run_id: config.run.run_id.clone(),
        initial_capital: config.run.initial_capital,
        commission,
        execution,
        metrics: metrics_config,
    };

    let stage_start = Instant::now();
    let mut runner = BacktestRunner::new(backtest_config, strategy, series);
    let results = runner.run();
    let engine_ms = stage_start.elapsed().as_millis() as f64;
    metrics::histogram!("kestrel.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("kestrel.backtest.ticks_processed")
        .set(results.results.ticks_processed as f64);
    metrics::gauge!("kestrel.backtest.trades").set(results.results.total_trades as f64);
    metrics::gauge!("kestrel.backtest.engine_ticks_per_sec").set(if engine_ms > 0.0 {
        (results.results.ticks_processed as f64) / (engine_ms / 1000.0)
    } else {
        0.0
    });
    audit_extras.push(timing_event(
        &config.run.run_id,
        "run_engine",
        engine_ms as u64,
        serde_json::json!({ "strategy": strategy_name }),
    ));

    let snapshot = config_snapshot_json(config, &execution, &commission, &metrics_config);
    let run_dir = write_outputs(
        config,
        config_toml,
        out,
        &strategy_name,
        &results,
        &snapshot,
        artifacts,
        audit_extras,
    )?;

    Ok(BacktestReport {
        run_dir,
        results: results.results,
    })
}

fn timing_event(
    run_id: &str,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        timestamp: 0,
        stage: "timing".to_string(),
        symbol: None,
        action: action.to_string(),
        error: None,
        details: serde_json::json!({
            "duration_ms": duration_ms,
            "details": details,
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    strategy_name: &str,
    results: &BacktestResults,
    snapshot: &serde_json::Value,
    artifacts: &dyn ArtifactWriter,
    mut audit_extras: Vec<AuditEvent>,
) -> Result<PathBuf, String> {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;

    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &results.trades)?;
    artifacts.write_equity_csv(
        run_dir.join("equity.csv").as_path(),
        &results.results.equity_curve,
    )?;

    let mut meta = summary_meta_json(
        config,
        strategy_name,
        Some(config_toml),
        &results.results.equity_curve,
    );
    meta["config"] = snapshot.clone();
    artifacts.write_summary_json(
        run_dir.join("summary.json").as_path(),
        &results.results,
        Some(&meta),
    )?;

    let mut audit_events = results.audit_events.clone();
    audit_events.append(&mut audit_extras);
    audit_events.sort_by_key(|event| event.timestamp);
    artifacts.write_audit_jsonl(run_dir.join("logs.jsonl").as_path(), &audit_events)?;

    if html_enabled(config) {
        artifacts.write_summary_html(
            run_dir.join("summary.html").as_path(),
            &results.results,
            Some(&meta),
        )?;
    }

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(run_dir)
}

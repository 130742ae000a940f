use crate::config::Config;
use crate::shared::{
    build_metrics_config, build_strategy, load_series, resolve_commission,
    resolve_execution_config,
};
use kestrel_domain::repositories::market_data::TickRepository;
use kestrel_domain::services::strategy::Strategy;
use kestrel_domain::services::tick_quality::tick_quality;
use std::time::Instant;
use tracing::info_span;

/// Resolves every setting and scans the tick data without running the
/// engine. `strict` turns any data-quality issue into an error.
pub fn validate(
    config: &Config,
    strict: bool,
    ticks: &dyn TickRepository,
) -> Result<serde_json::Value, String> {
    let _span = info_span!("validate", strict = strict, run_id = %config.run.run_id).entered();

    if !config.run.initial_capital.is_finite() || config.run.initial_capital <= 0.0 {
        return Err(format!(
            "run.initial_capital must be finite and > 0 (got {})",
            config.run.initial_capital
        ));
    }
    let execution = resolve_execution_config(config)?;
    let commission = resolve_commission(config)?;
    let metrics_config = build_metrics_config(config)?;
    let strategy = build_strategy(config, &execution)?;

    let stage_start = Instant::now();
    let series = load_series(config, ticks)?;
    metrics::histogram!("kestrel.validate.load_ticks_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let report = tick_quality(series.ticks());
    metrics::gauge!("kestrel.validate.rows").set(report.rows as f64);
    metrics::gauge!("kestrel.validate.duplicates").set(report.duplicates as f64);
    metrics::gauge!("kestrel.validate.out_of_order").set(report.out_of_order as f64);
    metrics::gauge!("kestrel.validate.invalid_price").set(report.invalid_price as f64);

    if report.issue_count() > 0 {
        tracing::warn!(issues = report.issue_count(), "tick data has quality issues");
    }
    if strict && report.issue_count() > 0 {
        return Err(format!(
            "strict validation failed: {} tick data issue(s)",
            report.issue_count()
        ));
    }

    Ok(serde_json::json!({
        "run_id": config.run.run_id,
        "strategy": strategy.name(),
        "ticks": report,
        "costs": {
            "commission_per_fill": commission.per_fill,
            "commission_bps": commission.bps,
        },
        "execution": {
            "market_urgency": execution.market_urgency,
            "price_scale": execution.price_scale,
            "max_slippage_pct": execution.max_slippage_pct,
        },
        "metrics": {
            "risk_free_rate": metrics_config.risk_free_rate,
            "periods_per_year": metrics_config.periods_per_year,
        },
        "strict": strict,
    }))
}

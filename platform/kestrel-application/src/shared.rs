use crate::config::{Config, DataSourceKind, StrategyName};
use chrono::DateTime;
use kestrel_domain::entities::ledger::CommissionModel;
use kestrel_domain::entities::metrics::{MetricsConfig, ReturnBucketing};
use kestrel_domain::repositories::market_data::TickRepository;
use kestrel_domain::services::engine::execution::ExecutionConfig;
use kestrel_domain::services::market_data_source::{TickSeries, DEFAULT_START_PRICE};
use kestrel_domain::services::strategy::{
    HoldStrategy, SmaCrossover, SmaCrossoverParams, StrategyKind,
};
use kestrel_domain::value_objects::equity_point::EquityPoint;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Data and slippage draw from separate streams derived from `run.seed`.
pub fn data_seed(config: &Config) -> u64 {
    config.run.seed
}

pub fn execution_seed(config: &Config) -> u64 {
    config.run.seed.wrapping_add(1)
}

pub fn resolve_execution_config(config: &Config) -> Result<ExecutionConfig, String> {
    let defaults = ExecutionConfig::default();
    let section = config.execution.as_ref();
    let price_scale = section
        .and_then(|e| e.price_scale)
        .unwrap_or(defaults.price_scale);
    if !price_scale.is_finite() || price_scale <= 0.0 {
        return Err(format!(
            "execution.price_scale must be finite and > 0 (got {price_scale})"
        ));
    }
    let max_slippage_pct = section
        .and_then(|e| e.max_slippage_pct)
        .unwrap_or(defaults.max_slippage_pct);
    if !max_slippage_pct.is_finite() || !(0.0..1.0).contains(&max_slippage_pct) {
        return Err(format!(
            "execution.max_slippage_pct must be in [0, 1) (got {max_slippage_pct})"
        ));
    }

    Ok(ExecutionConfig {
        market_urgency: section
            .and_then(|e| e.market_urgency)
            .unwrap_or(defaults.market_urgency),
        price_scale,
        max_slippage_pct,
        seed: execution_seed(config),
    })
}

pub fn resolve_commission(config: &Config) -> Result<CommissionModel, String> {
    let per_fill = config
        .costs
        .as_ref()
        .and_then(|c| c.commission_per_fill)
        .unwrap_or(0.0);
    let bps = config
        .costs
        .as_ref()
        .and_then(|c| c.commission_bps)
        .unwrap_or(0.0);
    for (name, value) in [("commission_per_fill", per_fill), ("commission_bps", bps)] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("costs.{name} must be finite and >= 0 (got {value})"));
        }
    }
    Ok(CommissionModel { per_fill, bps })
}

pub fn build_metrics_config(config: &Config) -> Result<MetricsConfig, String> {
    let defaults = MetricsConfig::default();
    let section = config.metrics.as_ref();
    let periods_per_year = section
        .and_then(|m| m.periods_per_year)
        .unwrap_or(defaults.periods_per_year);
    if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
        return Err(format!(
            "metrics.periods_per_year must be finite and > 0 (got {periods_per_year})"
        ));
    }

    let bucketing = match section
        .and_then(|m| m.daily_returns.as_deref())
        .unwrap_or("calendar")
        .trim()
        .to_lowercase()
        .as_str()
    {
        "calendar" | "calendar_day" | "day" => ReturnBucketing::CalendarDay,
        "window" | "fixed_window" => {
            let size = section.and_then(|m| m.window_size).unwrap_or(0);
            if size == 0 {
                return Err(
                    "metrics.window_size must be > 0 when daily_returns = \"window\"".to_string(),
                );
            }
            ReturnBucketing::FixedWindow(size)
        }
        other => {
            return Err(format!(
                "unsupported metrics.daily_returns: {other} (expected calendar|window)"
            ))
        }
    };

    Ok(MetricsConfig {
        risk_free_rate: section
            .and_then(|m| m.risk_free_rate)
            .unwrap_or(defaults.risk_free_rate),
        periods_per_year,
        bucketing,
    })
}

pub fn resolve_sma_params(config: &Config, price_scale: f64) -> Result<SmaCrossoverParams, String> {
    let defaults = SmaCrossoverParams::default();
    let short_window = config.strategy.short_window.unwrap_or(defaults.short_window);
    let long_window = config.strategy.long_window.unwrap_or(defaults.long_window);
    if short_window == 0 || long_window <= short_window {
        return Err(format!(
            "strategy windows must satisfy 0 < short_window < long_window (got {short_window}/{long_window})"
        ));
    }
    let quantity = config.strategy.quantity.unwrap_or(defaults.quantity);
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(format!("strategy.quantity must be > 0 (got {quantity})"));
    }
    Ok(SmaCrossoverParams {
        short_window,
        long_window,
        quantity,
        urgency: config.strategy.urgency.unwrap_or(defaults.urgency),
        price_scale,
    })
}

pub fn build_strategy(config: &Config, execution: &ExecutionConfig) -> Result<StrategyKind, String> {
    Ok(match config.strategy.kind {
        StrategyName::Hold => StrategyKind::Hold(HoldStrategy),
        StrategyName::SmaCrossover => StrategyKind::SmaCrossover(SmaCrossover::new(
            resolve_sma_params(config, execution.price_scale)?,
        )),
    })
}

pub struct SyntheticParams {
    pub symbol: String,
    pub start_time_ns: i64,
    pub duration_ns: i64,
    pub interval_ns: i64,
    pub start_price: f64,
}

pub fn resolve_synthetic_params(config: &Config) -> Result<SyntheticParams, String> {
    let data = &config.data;
    let symbol = data
        .symbol
        .clone()
        .ok_or_else(|| "data.symbol is required for synthetic data".to_string())?;
    let duration_ns = data
        .duration_ns
        .ok_or_else(|| "data.duration_ns is required for synthetic data".to_string())?;
    let interval_ns = data
        .interval_ns
        .ok_or_else(|| "data.interval_ns is required for synthetic data".to_string())?;
    Ok(SyntheticParams {
        symbol,
        start_time_ns: data.start_time_ns.unwrap_or(0),
        duration_ns,
        interval_ns,
        start_price: data.start_price.unwrap_or(DEFAULT_START_PRICE),
    })
}

/// Fills a tick series from the configured source.
pub fn load_series(config: &Config, repo: &dyn TickRepository) -> Result<TickSeries, String> {
    let mut series = TickSeries::new(data_seed(config));
    match config.data.source {
        DataSourceKind::Csv => {
            let path = config
                .data
                .csv_path
                .as_deref()
                .ok_or_else(|| "data.csv_path is required when data.source = \"csv\"".to_string())?;
            series
                .load(repo, Path::new(path))
                .map_err(|err| format!("failed to load ticks: {err}"))?;
        }
        DataSourceKind::Synthetic => {
            let params = resolve_synthetic_params(config)?;
            series = series.with_start_price(params.start_price);
            series
                .generate(
                    &params.symbol,
                    params.start_time_ns,
                    params.duration_ns,
                    params.interval_ns,
                )
                .map_err(|err| format!("failed to generate ticks: {err}"))?;
        }
    }
    Ok(series)
}

pub fn config_hash(config_toml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config_toml.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

pub fn format_timestamp_ns(timestamp_ns: i64) -> String {
    DateTime::from_timestamp_nanos(timestamp_ns).to_rfc3339()
}

pub fn summary_meta_json(
    config: &Config,
    strategy: &str,
    config_toml: Option<&str>,
    equity: &[EquityPoint],
) -> serde_json::Value {
    let start = equity.first().map(|p| p.timestamp);
    let end = equity.last().map(|p| p.timestamp);
    serde_json::json!({
        "run_id": config.run.run_id,
        "strategy": strategy,
        "seed": config.run.seed,
        "source": config.data.source,
        "start": start,
        "end": end,
        "start_utc": start.map(format_timestamp_ns),
        "end_utc": end.map(format_timestamp_ns),
        "config_sha256": config_toml.map(config_hash),
    })
}

pub fn config_snapshot_json(
    config: &Config,
    execution: &ExecutionConfig,
    commission: &CommissionModel,
    metrics: &MetricsConfig,
) -> serde_json::Value {
    serde_json::json!({
        "run": {
            "initial_capital": config.run.initial_capital,
            "seed": config.run.seed,
        },
        "data": config.data,
        "strategy": config.strategy,
        "costs": {
            "commission_per_fill": commission.per_fill,
            "commission_bps": commission.bps,
        },
        "execution": {
            "market_urgency": execution.market_urgency,
            "price_scale": execution.price_scale,
            "max_slippage_pct": execution.max_slippage_pct,
            "seed": execution.seed,
        },
        "metrics": {
            "risk_free_rate": metrics.risk_free_rate,
            "periods_per_year": metrics.periods_per_year,
            "daily_returns": match metrics.bucketing {
                ReturnBucketing::CalendarDay => serde_json::json!("calendar"),
                ReturnBucketing::FixedWindow(size) => serde_json::json!({ "window": size }),
            },
        },
    })
}

pub fn html_enabled(config: &Config) -> bool {
    config
        .report
        .as_ref()
        .and_then(|report| report.html)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{
        build_metrics_config, config_hash, resolve_commission, resolve_execution_config,
        resolve_sma_params,
    };
    use crate::config::Config;
    use kestrel_domain::entities::metrics::ReturnBucketing;

    fn config_with(extra: &str) -> Config {
        let toml_str = format!(
            r#"
[run]
run_id = "x"
initial_capital = 1000.0
seed = 5

[data]
source = "synthetic"
symbol = "SYN"
duration_ns = 100
interval_ns = 1

[strategy]
kind = "sma_crossover"

[paths]
out_dir = "runs/"

{extra}
"#
        );
        toml::from_str(&toml_str).expect("config should parse")
    }

    #[test]
    fn execution_defaults_and_derived_seed() {
        let execution = resolve_execution_config(&config_with("")).expect("execution");
        assert_eq!(execution.market_urgency, 100);
        assert_eq!(execution.price_scale, 100.0);
        assert_eq!(execution.max_slippage_pct, 0.001);
        assert_eq!(execution.seed, 6);
    }

    #[test]
    fn execution_rejects_zero_price_scale() {
        let config = config_with("[execution]\nprice_scale = 0.0\n");
        assert!(resolve_execution_config(&config).is_err());
    }

    #[test]
    fn commission_rejects_negative_values() {
        let config = config_with("[costs]\ncommission_bps = -1.0\n");
        let err = resolve_commission(&config).unwrap_err();
        assert!(err.contains("commission_bps"));
    }

    #[test]
    fn metrics_default_to_calendar_days() {
        let metrics = build_metrics_config(&config_with("")).expect("metrics");
        assert_eq!(metrics.bucketing, ReturnBucketing::CalendarDay);
        assert_eq!(metrics.risk_free_rate, 0.02);
        assert_eq!(metrics.periods_per_year, 252.0);
    }

    #[test]
    fn window_bucketing_requires_size() {
        let config = config_with("[metrics]\ndaily_returns = \"window\"\n");
        assert!(build_metrics_config(&config).is_err());

        let config = config_with("[metrics]\ndaily_returns = \"window\"\nwindow_size = 10\n");
        assert_eq!(
            build_metrics_config(&config).unwrap().bucketing,
            ReturnBucketing::FixedWindow(10)
        );
    }

    #[test]
    fn sma_windows_must_be_ordered() {
        let mut config = config_with("");
        config.strategy.short_window = Some(10);
        config.strategy.long_window = Some(5);
        assert!(resolve_sma_params(&config, 100.0).is_err());
    }

    #[test]
    fn config_hash_is_hex_sha256() {
        let hash = config_hash("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

use chrono::{DateTime, Utc};
use kestrel_application::config::load_config_with_source;
use kestrel_application::generation::{generate_ticks, GenerateRequest};
use kestrel_application::meta::engine_name;
use kestrel_domain::entities::metrics::Results;
use kestrel_infrastructure::artifacts::{FilesystemArtifactReader, FilesystemArtifactWriter};
use kestrel_infrastructure::market_data::CsvTickRepository;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub enum Command {
    Backtest {
        config: PathBuf,
        out: Option<PathBuf>,
    },
    Validate {
        config: PathBuf,
        strict: bool,
    },
    Generate {
        out: PathBuf,
        symbol: String,
        start: String,
        duration: String,
        interval: String,
        start_price: f64,
        seed: u64,
    },
    Report {
        input: PathBuf,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Backtest { .. } => "backtest",
            Command::Validate { .. } => "validate",
            Command::Generate { .. } => "generate",
            Command::Report { .. } => "report",
        }
    }
}

/// Runs one command and returns the JSON document printed on stdout.
pub fn run(command: Command) -> Result<serde_json::Value, String> {
    let name = command.name();
    let start = Instant::now();
    let result = dispatch(command);
    let label = if result.is_ok() { "ok" } else { "err" };
    metrics::histogram!("kestrel.cli.command_ms", "command" => name, "result" => label)
        .record(start.elapsed().as_secs_f64() * 1000.0);
    result
}

fn dispatch(command: Command) -> Result<serde_json::Value, String> {
    match command {
        Command::Backtest { config, out } => run_backtest(&config, out),
        Command::Validate { config, strict } => run_validate(&config, strict),
        Command::Generate {
            out,
            symbol,
            start,
            duration,
            interval,
            start_price,
            seed,
        } => {
            let request = GenerateRequest {
                symbol,
                start_time_ns: parse_start_ns(&start)?,
                duration_ns: parse_duration_ns(&duration)?,
                interval_ns: parse_duration_ns(&interval)?,
                start_price,
                seed,
            };
            run_generate(&request, &out)
        }
        Command::Report { input } => run_report(&input),
    }
}

fn artifacts_for_run(run_dir: &Path) -> serde_json::Value {
    serde_json::json!({
        "run_dir": run_dir.display().to_string(),
        "trades_csv": run_dir.join("trades.csv").display().to_string(),
        "equity_csv": run_dir.join("equity.csv").display().to_string(),
        "summary_json": run_dir.join("summary.json").display().to_string(),
        "logs_jsonl": run_dir.join("logs.jsonl").display().to_string(),
        "config_snapshot_toml": run_dir.join("config_snapshot.toml").display().to_string(),
    })
}

fn results_json(results: &Results) -> Result<serde_json::Value, String> {
    serde_json::to_value(results).map_err(|err| format!("failed to serialize results: {err}"))
}

fn run_backtest(config_path: &Path, out: Option<PathBuf>) -> Result<serde_json::Value, String> {
    let (config, config_toml) = load_config_with_source(config_path)?;
    let ticks = CsvTickRepository::new();
    let artifacts = FilesystemArtifactWriter::new();

    let report = kestrel_application::backtesting::run_backtest(
        &config,
        &config_toml,
        out,
        &ticks,
        &artifacts,
    )?;
    tracing::info!(
        engine = engine_name(),
        run_dir = %report.run_dir.display(),
        total_return = report.results.total_return,
        "backtest finished"
    );
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "backtest",
        "run_id": config.run.run_id,
        "results": results_json(&report.results)?,
        "artifacts": artifacts_for_run(&report.run_dir),
    }))
}

fn run_validate(config_path: &Path, strict: bool) -> Result<serde_json::Value, String> {
    let (config, _) = load_config_with_source(config_path)?;
    let ticks = CsvTickRepository::new();
    let report = kestrel_application::validation::validate(&config, strict, &ticks)?;
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "validate",
        "strict": strict,
        "run_id": config.run.run_id,
        "report": report,
    }))
}

fn run_generate(request: &GenerateRequest, out: &Path) -> Result<serde_json::Value, String> {
    let ticks = CsvTickRepository::new();
    let count = generate_ticks(request, out, &ticks)?;
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "generate",
        "symbol": request.symbol,
        "seed": request.seed,
        "ticks": count,
        "out": out.display().to_string(),
    }))
}

fn run_report(input: &Path) -> Result<serde_json::Value, String> {
    let reader = FilesystemArtifactReader::new();
    let writer = FilesystemArtifactWriter::new();
    let report = kestrel_application::reporting::generate_report(input, &reader, &writer)?;
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "report",
        "run_id": report.run_id,
        "input_dir": report.input_dir.display().to_string(),
        "wrote_html": report.wrote_html,
        "results": results_json(&report.results)?,
    }))
}

/// Accepts RFC3339 or raw epoch nanoseconds.
pub fn parse_start_ns(value: &str) -> Result<i64, String> {
    let trimmed = value.trim();
    if let Ok(ns) = trimmed.parse::<i64>() {
        return Ok(ns);
    }
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map_err(|err| format!("invalid --start '{value}' (RFC3339 or epoch ns): {err}"))?;
    parsed
        .with_timezone(&Utc)
        .timestamp_nanos_opt()
        .ok_or_else(|| format!("--start '{value}' is outside the nanosecond range"))
}

/// Parses `<n><unit>` with unit one of `ns`, `ms`, `s`, `m`, `h`, `d`.
pub fn parse_duration_ns(value: &str) -> Result<i64, String> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{value}' is missing a unit (ns|ms|s|m|h|d)"))?;
    let (number_part, unit) = trimmed.split_at(split);
    let multiplier: i64 = match unit {
        "ns" => 1,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        "d" => 86_400 * 1_000_000_000,
        _ => return Err(format!("unsupported duration unit '{unit}' in '{value}'")),
    };
    let number: i64 = number_part
        .parse()
        .map_err(|_| format!("invalid duration: {value}"))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{value}' overflows"))
}

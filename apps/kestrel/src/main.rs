use clap::{Parser, Subcommand};
use kestrel::commands::{self, Command};
use kestrel::obs::{init_metrics, init_tracing};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(about = "Kestrel tick backtester", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  kestrel generate --out data/ticks.csv --symbol SYN --duration 30d --interval 1h\n  kestrel validate --config configs/sample.toml --strict\n  kestrel backtest --config configs/sample.toml --out runs/\n  kestrel report --input runs/<run_id>/\n"
)]
struct Cli {
    /// Log filter (e.g. info, debug, kestrel_domain=trace). `KESTREL_LOG` wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text | json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Expose Prometheus metrics on host:port while the command runs.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a backtest and write its artifacts under <out>/<run_id>/.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Resolve the config and scan the tick data without running.
    Validate {
        #[arg(long)]
        config: PathBuf,
        /// Fail on any tick data quality issue.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Write a seeded random-walk tick CSV.
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "SYN")]
        symbol: String,
        /// RFC3339 timestamp or epoch nanoseconds.
        #[arg(long, default_value = "2024-01-01T00:00:00Z")]
        start: String,
        #[arg(long, default_value = "30d")]
        duration: String,
        #[arg(long, default_value = "1h")]
        interval: String,
        #[arg(long, default_value_t = 100.0)]
        start_price: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Recompute summary.json from a run directory's trades and equity.
    Report {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
    if let Err(err) = init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
    tracing::debug!(
        git_sha = env!("KESTREL_GIT_SHA"),
        target = env!("KESTREL_TARGET"),
        "kestrel starting"
    );

    let command = match cli.command {
        CliCommand::Backtest { config, out } => Command::Backtest { config, out },
        CliCommand::Validate { config, strict } => Command::Validate { config, strict },
        CliCommand::Generate {
            out,
            symbol,
            start,
            duration,
            interval,
            start_price,
            seed,
        } => Command::Generate {
            out,
            symbol,
            start,
            duration,
            interval,
            start_price,
            seed,
        },
        CliCommand::Report { input } => Command::Report { input },
    };

    match commands::run(command) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("error: failed to serialize output: {}", err);
                std::process::exit(1);
            }
        },
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    }
}

use chrono::DateTime;
use kestrel_domain::entities::metrics::Results;
use kestrel_domain::services::audit::AuditEvent;
use kestrel_domain::value_objects::equity_point::EquityPoint;
use kestrel_domain::value_objects::trade::{ExitReason, Trade};
use serde::Deserialize;
use std::fs;
use std::path::Path;

fn write_text(path: &Path, what: &str, contents: &str) -> Result<(), String> {
    fs::write(path, contents)
        .map_err(|err| format!("failed to write {} {}: {}", what, path.display(), err))
}

/// One JSON object per line, in the order given.
pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut out = String::new();
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        out.push_str(&line);
        out.push('\n');
    }
    write_text(path, "audit log", &out)
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn exit_reason_label(reason: Option<ExitReason>) -> &'static str {
    match reason {
        Some(ExitReason::Signal) => "signal",
        Some(ExitReason::EndOfRun) => "end_of_run",
        None => "",
    }
}

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "symbol",
        "strategy_id",
        "entry_order_id",
        "exit_order_id",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "signed_quantity",
        "commission",
        "pnl",
        "exit_reason",
    ])
    .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        wtr.write_record([
            trade.symbol.clone(),
            trade.strategy_id.clone(),
            trade.entry_order_id.to_string(),
            opt_to_string(trade.exit_order_id),
            trade.entry_time.to_string(),
            opt_to_string(trade.exit_time),
            trade.entry_price.to_string(),
            opt_to_string(trade.exit_price),
            trade.signed_quantity.to_string(),
            trade.commission.to_string(),
            opt_to_string(trade.pnl),
            exit_reason_label(trade.exit_reason).to_string(),
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "timestamp_ns",
        "equity",
        "cash",
        "open_trades",
        "unrealized_pnl",
        "realized_pnl",
    ])
    .map_err(|err| format!("failed to write equity csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            point.timestamp.to_string(),
            point.equity.to_string(),
            point.cash.to_string(),
            point.open_trades.to_string(),
            point.unrealized_pnl.to_string(),
            point.realized_pnl.to_string(),
        ])
        .map_err(|err| format!("failed to write equity row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush equity csv: {}", err))
}

pub fn summary_json(results: &Results, meta: Option<&serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "meta": meta,
        "summary": results,
    })
}

pub fn write_summary_json(
    path: &Path,
    results: &Results,
    meta: Option<&serde_json::Value>,
) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&summary_json(results, meta))
        .map_err(|err| format!("failed to serialize summary: {}", err))?;
    write_text(path, "summary", &json)
}

pub fn read_summary_json(path: &Path) -> Result<serde_json::Value, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read summary {}: {}", path.display(), err))?;
    serde_json::from_str(&raw)
        .map_err(|err| format!("failed to parse summary {}: {}", path.display(), err))
}

fn meta_str<'a>(meta: Option<&'a serde_json::Value>, key: &str) -> &'a str {
    meta.and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn format_ns(timestamp_ns: i64) -> String {
    DateTime::from_timestamp_nanos(timestamp_ns).to_rfc3339()
}

pub fn write_summary_html(
    path: &Path,
    results: &Results,
    meta: Option<&serde_json::Value>,
) -> Result<(), String> {
    let run_id = escape_html(meta_str(meta, "run_id"));
    let strategy = escape_html(meta_str(meta, "strategy"));
    let start = escape_html(meta_str(meta, "start_utc"));
    let end = escape_html(meta_str(meta, "end_utc"));
    let avg_duration = if results.total_trades > 0 {
        format!("{:.3}s", results.avg_trade_duration / 1e9)
    } else {
        "n/a".to_string()
    };
    let last_point = results
        .equity_curve
        .last()
        .map(|p| format_ns(p.timestamp))
        .unwrap_or_else(|| "n/a".to_string());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>Kestrel Backtest Summary</title>
  <style>
    body {{ font-family: Menlo, Consolas, monospace; margin: 32px; color: #1d2330; }}
    dl {{ display: grid; grid-template-columns: max-content auto; gap: 4px 16px; }}
    dt {{ color: #5a6272; }}
    table {{ border-collapse: collapse; min-width: 480px; }}
    th, td {{ border-bottom: 1px solid #d8dce3; padding: 6px 10px; }}
    th {{ text-align: left; font-weight: normal; color: #5a6272; }}
    td {{ text-align: right; }}
  </style>
</head>
<body>
  <h1>Kestrel Backtest Summary</h1>
  <dl>
    <dt>run</dt><dd><code>{run_id}</code></dd>
    <dt>strategy</dt><dd><code>{strategy}</code></dd>
    <dt>window</dt><dd>{start} .. {end}</dd>
  </dl>
  <h2>Results</h2>
  <table>
    <tr><th>initial_capital</th><td>{:.2}</td></tr>
    <tr><th>final_capital</th><td>{:.2}</td></tr>
    <tr><th>total_return</th><td>{:.4}</td></tr>
    <tr><th>sharpe_ratio</th><td>{:.4}</td></tr>
    <tr><th>max_drawdown</th><td>{:.4}</td></tr>
    <tr><th>total_trades</th><td>{}</td></tr>
    <tr><th>winning / losing</th><td>{} / {}</td></tr>
    <tr><th>win_rate</th><td>{:.4}</td></tr>
    <tr><th>best / worst trade</th><td>{:.2} / {:.2}</td></tr>
    <tr><th>avg_trade_duration</th><td>{avg_duration}</td></tr>
    <tr><th>total_commission</th><td>{:.2}</td></tr>
    <tr><th>ticks_processed</th><td>{}</td></tr>
    <tr><th>last equity sample</th><td>{last_point}</td></tr>
  </table>
</body>
</html>"#,
        results.initial_capital,
        results.final_capital,
        results.total_return,
        results.sharpe_ratio,
        results.max_drawdown,
        results.total_trades,
        results.winning_trades,
        results.losing_trades,
        results.win_rate,
        results.best_trade,
        results.worst_trade,
        results.total_commission,
        results.ticks_processed,
    );

    write_text(path, "summary html", &html)
}

#[derive(Debug, Clone, Deserialize)]
struct TradeRecord {
    symbol: String,
    strategy_id: String,
    entry_order_id: u64,
    exit_order_id: Option<u64>,
    entry_time: i64,
    exit_time: Option<i64>,
    entry_price: f64,
    exit_price: Option<f64>,
    signed_quantity: f64,
    commission: f64,
    pnl: Option<f64>,
    exit_reason: String,
}

pub fn read_trades_csv(path: &Path) -> Result<Vec<Trade>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open trades csv {}: {}", path.display(), err))?;
    let mut trades = Vec::new();
    for result in rdr.deserialize::<TradeRecord>() {
        let record = result.map_err(|err| format!("failed to parse trade record: {}", err))?;
        let exit_reason = match record.exit_reason.trim() {
            "" => None,
            "signal" => Some(ExitReason::Signal),
            "end_of_run" => Some(ExitReason::EndOfRun),
            other => return Err(format!("invalid exit_reason '{}'", other)),
        };
        trades.push(Trade {
            symbol: record.symbol,
            strategy_id: record.strategy_id,
            entry_order_id: record.entry_order_id,
            exit_order_id: record.exit_order_id,
            entry_time: record.entry_time,
            exit_time: record.exit_time,
            entry_price: record.entry_price,
            exit_price: record.exit_price,
            signed_quantity: record.signed_quantity,
            commission: record.commission,
            pnl: record.pnl,
            exit_reason,
        });
    }
    Ok(trades)
}

#[derive(Debug, Clone, Deserialize)]
struct EquityRecord {
    timestamp_ns: i64,
    equity: f64,
    cash: f64,
    open_trades: usize,
    unrealized_pnl: f64,
    realized_pnl: f64,
}

pub fn read_equity_csv(path: &Path) -> Result<Vec<EquityPoint>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open equity csv {}: {}", path.display(), err))?;
    let mut points = Vec::new();
    for result in rdr.deserialize::<EquityRecord>() {
        let record = result.map_err(|err| format!("failed to parse equity record: {}", err))?;
        points.push(EquityPoint {
            timestamp: record.timestamp_ns,
            equity: record.equity,
            cash: record.cash,
            open_trades: record.open_trades,
            unrealized_pnl: record.unrealized_pnl,
            realized_pnl: record.realized_pnl,
        });
    }
    Ok(points)
}

use kestrel_domain::repositories::market_data::TickRepository;
use kestrel_domain::services::market_data_source::TickSeries;
use std::path::Path;
use tracing::info_span;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub symbol: String,
    pub start_time_ns: i64,
    pub duration_ns: i64,
    pub interval_ns: i64,
    pub start_price: f64,
    pub seed: u64,
}

/// Writes a seeded random-walk tick file. Returns the number of ticks.
pub fn generate_ticks(
    request: &GenerateRequest,
    out: &Path,
    repo: &dyn TickRepository,
) -> Result<usize, String> {
    let _span = info_span!(
        "generate_ticks",
        symbol = %request.symbol,
        seed = request.seed,
        out = %out.display()
    )
    .entered();

    let mut series = TickSeries::new(request.seed).with_start_price(request.start_price);
    let count = series
        .generate(
            &request.symbol,
            request.start_time_ns,
            request.duration_ns,
            request.interval_ns,
        )
        .map_err(|err| format!("failed to generate ticks: {err}"))?;
    repo.save_ticks(out, series.ticks())
        .map_err(|err| format!("failed to write ticks {}: {}", out.display(), err))?;
    metrics::gauge!("kestrel.generate.ticks").set(count as f64);
    Ok(count)
}

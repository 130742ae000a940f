use crate::error::DataError;
use crate::repositories::market_data::TickRepository;
use crate::value_objects::tick::Tick;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;

pub const DEFAULT_START_PRICE: f64 = 100.0;
/// Peak-to-peak width of the per-step return draw.
pub const WALK_VOLATILITY: f64 = 0.02;
const QUOTE_HALF_SPREAD: f64 = 0.01;
const MIN_VOLUME: u64 = 1_000;
const MAX_VOLUME: u64 = 6_000;

pub trait MarketDataSource {
    fn next_tick(&mut self) -> Option<Tick>;
}

/// Plain in-memory source, handed out in insertion order.
#[derive(Debug, Clone, Default)]
pub struct VecTickSource {
    ticks: Vec<Tick>,
    index: usize,
}

impl VecTickSource {
    pub fn new(ticks: Vec<Tick>) -> Self {
        Self { ticks, index: 0 }
    }
}

impl MarketDataSource for VecTickSource {
    fn next_tick(&mut self) -> Option<Tick> {
        let tick = self.ticks.get(self.index)?.clone();
        self.index += 1;
        Some(tick)
    }
}

/// Ordered tick sequence filled from files and/or the seeded random walk.
/// Loads and generations append; the series is consumed front to back.
#[derive(Debug, Clone)]
pub struct TickSeries {
    ticks: Vec<Tick>,
    cursor: usize,
    rng: ChaCha8Rng,
    start_price: f64,
}

impl TickSeries {
    pub fn new(seed: u64) -> Self {
        Self {
            ticks: Vec::new(),
            cursor: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            start_price: DEFAULT_START_PRICE,
        }
    }

    pub fn with_start_price(mut self, start_price: f64) -> Self {
        self.start_price = start_price;
        self
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn extend(&mut self, ticks: impl IntoIterator<Item = Tick>) {
        self.ticks.extend(ticks);
    }

    /// Appends every record of the file at `path`. On error nothing is
    /// appended. Returns the number of ticks added.
    pub fn load<R>(&mut self, repo: &R, path: &Path) -> Result<usize, DataError>
    where
        R: TickRepository + ?Sized,
    {
        let loaded = repo.load_ticks(path)?;
        let count = loaded.len();
        self.ticks.extend(loaded);
        tracing::debug!(path = %path.display(), ticks = count, "loaded ticks");
        Ok(count)
    }

    /// Appends `duration / interval` random-walk ticks for `symbol` starting
    /// at `start_time`. Returns the number of ticks added.
    pub fn generate(
        &mut self,
        symbol: &str,
        start_time: i64,
        duration: i64,
        interval: i64,
    ) -> Result<usize, DataError> {
        if interval <= 0 {
            return Err(DataError::InvalidGenerator(format!(
                "interval must be > 0 (got {interval})"
            )));
        }
        if duration < 0 {
            return Err(DataError::InvalidGenerator(format!(
                "duration must be >= 0 (got {duration})"
            )));
        }
        if !self.start_price.is_finite() || self.start_price <= 0.0 {
            return Err(DataError::InvalidGenerator(format!(
                "start price must be finite and > 0 (got {})",
                self.start_price
            )));
        }

        let count = duration / interval;
        if count > 0 {
            (count - 1)
                .checked_mul(interval)
                .and_then(|offset| start_time.checked_add(offset))
                .ok_or_else(|| {
                    DataError::InvalidGenerator(format!(
                        "last timestamp overflows i64 (start {start_time}, {count} ticks every {interval}ns)"
                    ))
                })?;
        }

        let half = WALK_VOLATILITY / 2.0;
        let mut price = self.start_price;
        let mut timestamp = start_time;
        for i in 0..count {
            if i > 0 {
                timestamp += interval;
            }
            let step: f64 = self.rng.gen_range(-half..=half);
            price *= 1.0 + step;
            let volume = self.rng.gen_range(MIN_VOLUME..MAX_VOLUME) as f64;
            self.ticks.push(Tick {
                timestamp,
                symbol: symbol.to_string(),
                price,
                volume,
                bid: price - QUOTE_HALF_SPREAD,
                ask: price + QUOTE_HALF_SPREAD,
            });
        }
        Ok(count as usize)
    }
}

impl MarketDataSource for TickSeries {
    fn next_tick(&mut self) -> Option<Tick> {
        let tick = self.ticks.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(tick)
    }
}

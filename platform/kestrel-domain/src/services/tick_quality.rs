use crate::value_objects::tick::Tick;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TickQualityReport {
    pub rows: usize,
    pub rows_per_symbol: BTreeMap<String, usize>,
    /// Same symbol and timestamp as the previous tick of that symbol.
    pub duplicates: usize,
    pub out_of_order: usize,
    pub invalid_price: usize,
    pub crossed_quotes: usize,
    pub negative_volume: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub first_duplicate: Option<i64>,
    pub first_out_of_order: Option<i64>,
    pub first_invalid_price: Option<i64>,
}

impl TickQualityReport {
    pub fn issue_count(&self) -> usize {
        self.duplicates
            + self.out_of_order
            + self.invalid_price
            + self.crossed_quotes
            + self.negative_volume
    }
}

/// Scans ticks in replay order. Ordering checks compare against the previous
/// tick overall; duplicate checks against the previous tick of the same symbol.
pub fn tick_quality(ticks: &[Tick]) -> TickQualityReport {
    let mut report = TickQualityReport {
        rows: ticks.len(),
        first_timestamp: ticks.first().map(|t| t.timestamp),
        last_timestamp: ticks.last().map(|t| t.timestamp),
        ..TickQualityReport::default()
    };

    let mut last_ts: Option<i64> = None;
    let mut last_by_symbol: BTreeMap<&str, i64> = BTreeMap::new();
    for tick in ticks {
        *report
            .rows_per_symbol
            .entry(tick.symbol.clone())
            .or_insert(0) += 1;

        if let Some(prev) = last_ts {
            if tick.timestamp < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(tick.timestamp);
            }
        }
        if last_by_symbol.get(tick.symbol.as_str()) == Some(&tick.timestamp) {
            report.duplicates += 1;
            report.first_duplicate.get_or_insert(tick.timestamp);
        }
        if !tick.price.is_finite() || tick.price <= 0.0 {
            report.invalid_price += 1;
            report.first_invalid_price.get_or_insert(tick.timestamp);
        }
        if tick.bid > tick.ask {
            report.crossed_quotes += 1;
        }
        if tick.volume < 0.0 {
            report.negative_volume += 1;
        }

        last_ts = Some(tick.timestamp);
        last_by_symbol.insert(tick.symbol.as_str(), tick.timestamp);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::tick_quality;
    use crate::value_objects::tick::Tick;

    fn tick(ts: i64, symbol: &str, price: f64, bid: f64, ask: f64) -> Tick {
        Tick {
            timestamp: ts,
            symbol: symbol.to_string(),
            price,
            volume: 10.0,
            bid,
            ask,
        }
    }

    #[test]
    fn clean_series_has_no_issues() {
        let ticks = vec![
            tick(1, "A", 10.0, 9.9, 10.1),
            tick(1, "B", 20.0, 19.9, 20.1),
            tick(2, "A", 10.5, 10.4, 10.6),
        ];
        let report = tick_quality(&ticks);
        assert_eq!(report.rows, 3);
        assert_eq!(report.issue_count(), 0);
        assert_eq!(report.rows_per_symbol.get("A"), Some(&2));
        assert_eq!(report.first_timestamp, Some(1));
        assert_eq!(report.last_timestamp, Some(2));
    }

    #[test]
    fn flags_each_issue_kind() {
        let ticks = vec![
            tick(5, "A", 10.0, 9.9, 10.1),
            tick(5, "A", 10.0, 9.9, 10.1),
            tick(3, "A", 0.0, 9.9, 10.1),
            tick(6, "A", 10.0, 10.2, 10.1),
        ];
        let report = tick_quality(&ticks);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.first_duplicate, Some(5));
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.first_out_of_order, Some(3));
        assert_eq!(report.invalid_price, 1);
        assert_eq!(report.crossed_quotes, 1);
        assert_eq!(report.issue_count(), 4);
    }
}

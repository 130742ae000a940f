use kestrel_domain::error::DataError;
use kestrel_domain::repositories::market_data::TickRepository;
use kestrel_domain::value_objects::tick::Tick;
use std::fs::File;
use std::path::Path;
use std::time::Instant;

pub const TICK_CSV_HEADER: [&str; 6] = ["timestamp_ns", "symbol_id", "price", "volume", "bid", "ask"];

/// Tick files: one header line (ignored), then positional
/// `timestamp_ns,symbol_id,price,volume,bid,ask` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTickRepository;

impl CsvTickRepository {
    pub fn new() -> Self {
        Self
    }
}

impl TickRepository for CsvTickRepository {
    fn load_ticks(&self, path: &Path) -> Result<Vec<Tick>, DataError> {
        let start = Instant::now();
        let result = load_tick_csv(path);
        let result_label = if result.is_ok() { "ok" } else { "err" };
        metrics::histogram!("kestrel.infra.ticks.load_ms", "result" => result_label)
            .record(start.elapsed().as_millis() as f64);
        if let Err(err) = &result {
            tracing::error!(path = %path.display(), error = %err, "tick load failed");
        }
        result
    }

    fn save_ticks(&self, path: &Path, ticks: &[Tick]) -> Result<(), DataError> {
        write_tick_csv(path, ticks)
    }
}

pub fn load_tick_csv(path: &Path) -> Result<Vec<Tick>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut ticks = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| csv_error(path, err))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let timestamp = parse_field::<i64>(&record, 0, line, "timestamp_ns")?;
        let symbol = required(&record, 1, line, "symbol_id")?.to_string();
        let price = parse_field::<f64>(&record, 2, line, "price")?;
        let volume = parse_field::<f64>(&record, 3, line, "volume")?;
        let bid = parse_field::<f64>(&record, 4, line, "bid")?;
        let ask = parse_field::<f64>(&record, 5, line, "ask")?;
        if record.len() > TICK_CSV_HEADER.len() {
            return Err(DataError::Malformed(format!(
                "line {line}: expected {} fields, found {}",
                TICK_CSV_HEADER.len(),
                record.len()
            )));
        }

        ticks.push(Tick {
            timestamp,
            symbol,
            price,
            volume,
            bid,
            ask,
        });
    }
    Ok(ticks)
}

fn required<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    line: u64,
    field: &'static str,
) -> Result<&'r str, DataError> {
    match record.get(idx) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DataError::MissingField { line, field }),
    }
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    line: u64,
    field: &'static str,
) -> Result<T, DataError> {
    let raw = required(record, idx, line, field)?;
    raw.parse::<T>().map_err(|_| DataError::Parse {
        line,
        field,
        value: raw.to_string(),
    })
}

fn csv_error(path: &Path, err: csv::Error) -> DataError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return DataError::Io {
                path: path.display().to_string(),
                source,
            };
        }
        return DataError::Malformed(format!("{}: unreadable record", path.display()));
    }
    DataError::Malformed(format!("{}: {}", path.display(), err))
}

pub fn write_tick_csv(path: &Path, ticks: &[Tick]) -> Result<(), DataError> {
    let io_err = |source: std::io::Error| DataError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(|err| csv_error(path, err))?;
    wtr.write_record(TICK_CSV_HEADER)
        .map_err(|err| csv_error(path, err))?;
    for tick in ticks {
        wtr.write_record([
            tick.timestamp.to_string(),
            tick.symbol.clone(),
            tick.price.to_string(),
            tick.volume.to_string(),
            tick.bid.to_string(),
            tick.ask.to_string(),
        ])
        .map_err(|err| csv_error(path, err))?;
    }
    wtr.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::{load_tick_csv, write_tick_csv};
    use kestrel_domain::error::DataError;
    use kestrel_domain::value_objects::tick::Tick;
    use std::fs;

    #[test]
    fn loads_positional_records_after_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ticks.csv");
        fs::write(
            &path,
            "ts,sym,p,v,b,a\n1000,7,100.5,250,100.49,100.51\n2000,7,100.75,300,100.74,100.76\n",
        )
        .expect("write");

        let ticks = load_tick_csv(&path).expect("load");
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].timestamp, 1000);
        assert_eq!(ticks[0].symbol, "7");
        assert_eq!(ticks[1].price, 100.75);
        assert_eq!(ticks[1].ask, 100.76);
    }

    #[test]
    fn bad_number_reports_line_and_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ticks.csv");
        fs::write(&path, "h\n1,A,1,1,1,1\n2,A,abc,1,1,1\n").expect("write");

        match load_tick_csv(&path) {
            Err(DataError::Parse { line, field, value }) => {
                assert_eq!(line, 3);
                assert_eq!(field, "price");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn short_record_is_missing_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ticks.csv");
        fs::write(&path, "h\n1,A,1,1\n").expect("write");
        assert!(matches!(
            load_tick_csv(&path),
            Err(DataError::MissingField { field: "bid", .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_tick_csv(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }

    #[test]
    fn written_file_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");
        let ticks = vec![Tick {
            timestamp: 42,
            symbol: "SYN".to_string(),
            price: 99.123456789,
            volume: 1234.0,
            bid: 99.113456789,
            ask: 99.133456789,
        }];
        write_tick_csv(&path, &ticks).expect("write");
        assert_eq!(load_tick_csv(&path).expect("load"), ticks);
    }
}

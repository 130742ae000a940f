pub mod csv_ticks;

pub use csv_ticks::CsvTickRepository;

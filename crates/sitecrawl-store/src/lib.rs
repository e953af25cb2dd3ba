mod config;
mod sink;

pub use config::{CsvSinkConfig, CsvTerminator, FileMode};
pub use sink::{CsvSink, STDOUT};

pub mod csv;

pub use self::csv::{CsvFileSink, DEFAULT_OUTPUT, MemorySink, RecordSink, SinkError, write_csv};

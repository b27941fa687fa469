//! Series output: the CSV sink and its writer.

pub mod sink;
pub mod writer;

use thiserror::Error;

pub use sink::{open_truncated, output_path, DEFAULT_FILE_NAME, DEFAULT_OUTPUT_DIR};
pub use writer::{SeriesWriter, HEADER};

/// Failures writing the series file.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Header already written")]
    HeaderAlreadyWritten,

    #[error("Row written before header")]
    HeaderMissing,
}

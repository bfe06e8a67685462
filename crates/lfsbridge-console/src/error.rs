//! Console error types.

use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors a console command or its setup can report.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Fs(#[from] lfsbridge::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid number {arg:?}: {source}")]
    InvalidNumber {
        arg: String,
        #[source]
        source: ParseIntError,
    },

    #[error("size of hexdump must be between 1 and 512, got {0}")]
    DumpSize(usize),

    #[error("failed to read {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse geometry: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("the file device needs --image")]
    MissingImage,
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

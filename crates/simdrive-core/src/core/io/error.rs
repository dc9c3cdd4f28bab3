use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{format} parse error on line {line}: {message}")]
    Parse {
        format: &'static str,
        line: usize,
        message: String,
    },
    #[error("Inconsistent {format} data: {message}")]
    Inconsistent {
        format: &'static str,
        message: String,
    },
}

impl FormatError {
    pub(crate) fn parse(format: &'static str, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            message: message.into(),
        }
    }

    pub(crate) fn inconsistent(format: &'static str, message: impl Into<String>) -> Self {
        Self::Inconsistent {
            format,
            message: message.into(),
        }
    }
}

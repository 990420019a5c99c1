use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum CsvError {
    Io(std::io::Error),
    UnterminatedQuote { line: usize },
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvError::Io(err) => write!(f, "I/O error: {}", err),
            CsvError::UnterminatedQuote { line } => {
                write!(f, "quoted field opened on line {} is never closed", line)
            }
        }
    }
}

impl Error for CsvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CsvError::Io(err) => Some(err),
            CsvError::UnterminatedQuote { .. } => None,
        }
    }
}

impl From<std::io::Error> for CsvError {
    fn from(value: std::io::Error) -> Self {
        CsvError::Io(value)
    }
}

// Collector error taxonomy.

use thiserror::Error;

/// Errors raised while reading or parsing a kernel counter source.
///
/// None of these ever cross a collector boundary: the monitor logs them and
/// carries on with whatever collectors did come up.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The source file is missing or unreadable.
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but its layout is not what the parser expects.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// A single value could not be parsed.
    #[error("Failed to parse {metric} from {location}: {reason}")]
    ParseError {
        metric: String,
        location: String,
        reason: String,
    },

    /// `statvfs(3)` failed for a mount point.
    #[error("statvfs failed for {path}")]
    Statvfs {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type CollectorResult<T> = std::result::Result<T, CollectorError>;

impl CollectorError {
    pub(crate) fn invalid_format(location: impl Into<String>, reason: impl Into<String>) -> Self {
        CollectorError::InvalidFormat {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Reads a whole pseudo-file, mapping the I/O error onto [`CollectorError::FileRead`].
pub(crate) fn read_source(path: &std::path::Path) -> CollectorResult<String> {
    std::fs::read_to_string(path).map_err(|source| CollectorError::FileRead {
        path: path.display().to_string(),
        source,
    })
}

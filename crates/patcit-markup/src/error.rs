//! Error types for markup parsing.

use std::fmt;

/// Result type alias for patcit-markup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during markup parsing.
///
/// Structural problems (mismatched or missing end tags, stray end tags,
/// undefined entities) are recovered from and never surface here. Only
/// input that cannot be read at all is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input bytes are not valid UTF-8.
    Encoding {
        /// Byte offset of the first invalid sequence.
        position: usize,
    },

    /// The reader failed before any node could be recovered.
    Syntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Encoding { position } => {
                write!(f, "Markup is not valid UTF-8 (byte {})", position)
            }
            Error::Syntax { message, position } => {
                write!(f, "Markup syntax error: {}", message)?;
                if let Some(pos) = position {
                    write!(f, " at byte {}", pos)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Syntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Encoding {
            position: err.valid_up_to(),
        }
    }
}

//! # Error Types
//!
//! This module defines all error types for the Pavia converter.
//!
//! Errors carry enough location information (byte offset, staff index, measure
//! number) to find the offending node in the source score.
//!
//! ## Error Types
//! - `ParseError` - The score member is not well-formed XML
//! - `StructureError` - An expected staff, clef or attribute is absent
//! - `MeasureError` - A chord inside a given measure could not be interpreted
//! - `AlignmentMismatch` - Staves have differing measure counts (strict policy only)
//! - `ConfigError` - Invalid YAML configuration
//!
//! ## Usage
//! ```rust,no_run
//! use pavia::{convert_file, PaviaError, Style};
//!
//! let pipeline = Style::Condensed.pipeline();
//! match convert_file("in.mscz".as_ref(), "out.mscz".as_ref(), &pipeline) {
//!     Ok(()) => println!("Success!"),
//!     Err(PaviaError::MeasureError { staff, measure, message }) => {
//!         eprintln!("Staff {} measure {}: {}", staff, measure, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaviaError>;

#[derive(Error, Debug)]
pub enum PaviaError {
    /// Parse error with location information.
    ///
    /// Occurs when a score member is not UTF-8 or not well-formed XML. No
    /// output is written for the file.
    ///
    /// # Example
    /// ```
    /// # use pavia::PaviaError;
    /// let err = PaviaError::ParseError {
    ///     position: 120,
    ///     message: "unexpected end of input".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at byte 120: unexpected end of input");
    /// ```
    #[error("Parse error at byte {position}: {message}")]
    ParseError { position: usize, message: String },

    /// A node the transforms rely on is missing or inconsistent.
    ///
    /// # Example
    /// ```
    /// # use pavia::PaviaError;
    /// let err = PaviaError::StructureError {
    ///     staff: 1,
    ///     message: "no defaultClef to copy".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Structure error at staff 1: no defaultClef to copy");
    /// ```
    #[error("Structure error at staff {staff}: {message}")]
    StructureError { staff: usize, message: String },

    /// A chord-level failure with its staff index and 1-based measure number.
    #[error("Structure error at staff {staff}, measure {measure}: {message}")]
    MeasureError {
        staff: usize,
        measure: usize,
        message: String,
    },

    #[error("No tonal pitch class for pitch {pitch}")]
    MissingTpc { pitch: i32 },

    #[error("Tonal pitch class {tpc} is outside the 35-entry table")]
    InvalidTpc { tpc: i32 },

    #[error("Malformed <{element}> value: {value:?}")]
    MalformedValue { element: String, value: String },

    /// Staves disagree on their number of measures.
    ///
    /// Only raised under [`Alignment::Strict`](crate::Alignment::Strict);
    /// the default policy processes the common prefix.
    #[error("Staves have between {shortest} and {longest} measures")]
    AlignmentMismatch { shortest: usize, longest: usize },

    /// Invalid configuration error.
    ///
    /// # Example
    /// ```
    /// # use pavia::PaviaError;
    /// let err = PaviaError::ConfigError("no styles defined".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: no styles defined");
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaviaError {
    /// Attach a staff index and 0-based measure position to a chord-level error.
    pub fn in_measure(self, staff: usize, position: usize) -> Self {
        match self {
            e @ PaviaError::MeasureError { .. } => e,
            e => PaviaError::MeasureError {
                staff,
                measure: position + 1,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_measure_wraps_chord_errors() {
        let err = PaviaError::MissingTpc { pitch: 48 }.in_measure(2, 0);
        assert_eq!(
            err.to_string(),
            "Structure error at staff 2, measure 1: No tonal pitch class for pitch 48"
        );
    }

    #[test]
    fn test_in_measure_keeps_existing_location() {
        let err = PaviaError::MeasureError {
            staff: 0,
            measure: 7,
            message: "voice slot 5 out of range".to_string(),
        }
        .in_measure(2, 0);
        assert!(matches!(err, PaviaError::MeasureError { staff: 0, measure: 7, .. }));
    }
}

//! Error types for the inventory crate.

use fmrc_common::FmrcError;
use thiserror::Error;

/// Reasons a run summary is rejected.
///
/// A rejected summary is skipped as a whole; runs added before it are not
/// affected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummaryError {
    #[error("run has no forecast offsets")]
    NoOffsets,

    #[error("variable '{0}' has no forecast offsets")]
    NoVariableOffsets(String),

    #[error("offset {value} at index {index} is not a finite number")]
    NonFiniteOffset { index: usize, value: f64 },

    #[error("offset {value} at index {index} puts the forecast time outside the supported date range")]
    OffsetOutOfRange { index: usize, value: f64 },

    #[error("offsets are not strictly increasing at index {index}")]
    UnorderedOffsets { index: usize },

    #[error("variable name is empty")]
    EmptyVariableName,

    #[error("variable '{0}' appears more than once in the run")]
    DuplicateVariable(String),

    #[error("variable '{variable}' has a non-finite level at index {index}")]
    NonFiniteLevel { variable: String, index: usize },

    #[error(
        "variable '{variable}' marks slot ({time_index}, {vert_index}) missing, \
         outside its {ntimes}x{nverts} inventory"
    )]
    MissingSlotOutOfRange {
        variable: String,
        time_index: usize,
        vert_index: usize,
        ntimes: usize,
        nverts: usize,
    },
}

impl SummaryError {
    /// Convert into the shared error type, tagging the summary's source.
    pub fn into_fmrc_error(self, source_name: impl Into<String>) -> FmrcError {
        FmrcError::MalformedSummary {
            source_name: source_name.into(),
            message: self.to_string(),
        }
    }
}

/// Errors raised while reading, resolving or writing a definition.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("failed to read definition: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid definition XML: {0}")]
    Xml(String),

    #[error("invalid number '{token}' in {context}")]
    InvalidNumber { context: String, token: String },

    #[error("offset {value} in {context} is too large to represent")]
    OffsetOutOfRange { context: String, value: f64 },

    #[error("no offsetHours with id '{0}'")]
    UnknownTimeCoord(String),

    #[error("no vertCoord with id '{0}'")]
    UnknownVertCoord(String),

    #[error("variable '{variable}' restricts levels at hour {hour}, which its time coordinate lacks")]
    RestrictionHour { variable: String, hour: f64 },

    #[error("variable '{0}' restricts levels but has no vertical coordinate")]
    RestrictionWithoutVertCoord(String),
}

impl From<quick_xml::de::DeError> for DefinitionError {
    fn from(err: quick_xml::de::DeError) -> Self {
        DefinitionError::Xml(err.to_string())
    }
}

impl From<DefinitionError> for FmrcError {
    fn from(err: DefinitionError) -> Self {
        match err {
            DefinitionError::Io(e) => FmrcError::Io(e.to_string()),
            other => FmrcError::MalformedDefinition(other.to_string()),
        }
    }
}

/// Result type for definition operations.
pub type DefinitionResult<T> = std::result::Result<T, DefinitionError>;

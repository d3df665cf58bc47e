//! Error taxonomy of the normalization engine.

use thiserror::Error;

/// Errors raised while detecting, enumerating, parsing or normalizing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmartError {
    /// smartctl could not be run at all (missing binary, timeout, I/O error).
    #[error("smartctl is unavailable: {0}")]
    ToolUnavailable(String),

    /// The version token does not have the `<major>[.<minor>[.<patch>]]` shape.
    #[error("unable to parse smartctl version '{0}'")]
    VersionUnparsable(String),

    /// The installed tool is older than the configured minimum.
    #[error("installed smartctl version {found} is lower than the required minimum {minimum}")]
    VersionBelowMinimum { found: String, minimum: String },

    /// Output could not be parsed (bad JSON, unrecognized scan line).
    #[error("malformed smartctl output: {0}")]
    MalformedOutput(String),

    /// Structured scan output lacks the top-level `devices` array.
    #[error("unable to find 'devices' entry in JSON output")]
    MissingDevicesKey,

    /// The scan found nothing. Not fatal: the pass reports no devices.
    #[error("smartctl scan reported no devices")]
    EmptyDeviceList,

    /// An attribute row has an unusable identifier.
    #[error("unable to parse attribute row with id '{0}'")]
    AttributeRowUnparsable(String),

    /// One numeric field of an attribute row is not a number.
    #[error("attribute {attribute}: invalid {field} '{value}'")]
    NumericFieldInvalid {
        attribute: String,
        field: &'static str,
        value: String,
    },

    /// A per-device command failed.
    #[error("smartctl command failed: {0}")]
    CommandFailed(String),

    /// A built-in output pattern failed to compile.
    #[error("invalid output pattern: {0}")]
    InvalidPattern(String),
}

impl SmartError {
    /// Whether this error aborts the whole collection pass when raised by
    /// capability detection or enumeration.
    pub fn is_pass_fatal(&self) -> bool {
        !matches!(
            self,
            SmartError::EmptyDeviceList
                | SmartError::AttributeRowUnparsable(_)
                | SmartError::NumericFieldInvalid { .. }
                | SmartError::CommandFailed(_)
        )
    }
}

impl From<regex::Error> for SmartError {
    fn from(err: regex::Error) -> Self {
        SmartError::InvalidPattern(err.to_string())
    }
}

/// Result type alias using [`SmartError`].
pub type Result<T> = std::result::Result<T, SmartError>;

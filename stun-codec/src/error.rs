//! STUN Errors.
//! This module contains all errors that can happen when serializing or
//! deserializing STUN messages.

use std::error;
use std::fmt;

/// Defines the type of error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StunErrorType {
    /// Invalid or missing argument
    BadParam,
    /// The destination buffer is too small for the requested write
    OutOfMemory,
    /// The input is not a structurally valid STUN message
    MalformedMessage,
    /// The header does not carry the STUN magic cookie
    MagicCookieMismatch,
    /// End of the attribute sequence. Not a real failure.
    NoMoreAttributeFound,
    /// A declared or expected attribute size was violated
    InvalidAttributeLength,
    /// Appending the attribute would break the integrity/fingerprint ordering
    InvalidAttributeOrder,
}

impl fmt::Display for StunErrorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StunErrorType::BadParam => write!(f, "bad parameter"),
            StunErrorType::OutOfMemory => write!(f, "out of memory"),
            StunErrorType::MalformedMessage => write!(f, "malformed message"),
            StunErrorType::MagicCookieMismatch => write!(f, "magic cookie mismatch"),
            StunErrorType::NoMoreAttributeFound => write!(f, "no more attribute found"),
            StunErrorType::InvalidAttributeLength => write!(f, "invalid attribute length"),
            StunErrorType::InvalidAttributeOrder => write!(f, "invalid attribute order"),
        }
    }
}

/// Provides information about the error
#[derive(Debug)]
pub enum StunErrorInfo {
    /// A [`String`] describing the error,
    Text(String),
    /// Source of error
    Error(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for StunErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            StunErrorInfo::Text(msg) => write!(f, "{}", msg),
            StunErrorInfo::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Stun error
#[derive(Debug)]
pub struct StunError {
    /// Error type
    pub error_type: StunErrorType,
    /// Information about the error
    pub info: StunErrorInfo,
}

impl fmt::Display for StunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}. {}", self.error_type, self.info)
    }
}

impl error::Error for StunError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.info {
            StunErrorInfo::Text(_) => None,
            StunErrorInfo::Error(e) => Some(e.as_ref()),
        }
    }
}

impl PartialEq<StunError> for StunErrorType {
    fn eq(&self, other: &StunError) -> bool {
        *self == other.error_type
    }
}

impl PartialEq<StunErrorType> for StunError {
    fn eq(&self, other: &StunErrorType) -> bool {
        self.error_type == *other
    }
}

impl PartialEq for StunError {
    fn eq(&self, other: &Self) -> bool {
        // Two errors are equal if they have the same type
        self.error_type == other.error_type
    }
}

impl Eq for StunError {}

impl From<std::array::TryFromSliceError> for StunError {
    fn from(e: std::array::TryFromSliceError) -> Self {
        StunError::from_error(StunErrorType::BadParam, Box::new(e))
    }
}

impl From<std::num::TryFromIntError> for StunError {
    fn from(e: std::num::TryFromIntError) -> Self {
        StunError::from_error(StunErrorType::BadParam, Box::new(e))
    }
}

impl StunError {
    pub(crate) fn new<S>(error_type: StunErrorType, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            error_type,
            info: StunErrorInfo::Text(msg.into()),
        }
    }

    pub(crate) fn from_error(
        error_type: StunErrorType,
        e: Box<dyn error::Error + Send + Sync>,
    ) -> Self {
        Self {
            error_type,
            info: StunErrorInfo::Error(e),
        }
    }

    /// Returns true if this error only marks the end of the attribute sequence
    pub fn is_end_of_attributes(&self) -> bool {
        self.error_type == StunErrorType::NoMoreAttributeFound
    }
}

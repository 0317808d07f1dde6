use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accessor::AccessorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndorsementErrorKind {
    InvalidRequest,
    Conflict,
    Accessor,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementError {
    pub kind: EndorsementErrorKind,
    pub message: String,
}

impl EndorsementError {
    pub fn new(kind: EndorsementErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == EndorsementErrorKind::Conflict
    }
}

impl fmt::Display for EndorsementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EndorsementError {}

impl From<AccessorError> for EndorsementError {
    fn from(err: AccessorError) -> Self {
        EndorsementError::new(EndorsementErrorKind::Accessor, err.to_string())
    }
}

pub fn invalid_request(message: impl Into<String>) -> EndorsementError {
    EndorsementError::new(EndorsementErrorKind::InvalidRequest, message)
}

pub fn conflict(message: impl Into<String>) -> EndorsementError {
    EndorsementError::new(EndorsementErrorKind::Conflict, message)
}

pub fn internal_error(message: impl Into<String>) -> EndorsementError {
    EndorsementError::new(EndorsementErrorKind::Internal, message)
}

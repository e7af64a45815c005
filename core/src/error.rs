use thiserror::Error;

use crate::types::{GroupId, LineCode};

#[derive(Error, Debug)]
pub enum RidershipError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Line '{line_code}' already belongs to group '{owner_name}' (id {owner_id})")]
    Conflict {
        line_code:  LineCode,
        owner_id:   GroupId,
        owner_name: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Closed classification of [`RidershipError`] for callers that report
/// failures across a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    Collaborator,
}

impl RidershipError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)      => ErrorKind::Validation,
            Self::Conflict { .. }    => ErrorKind::Conflict,
            Self::NotFound { .. }    => ErrorKind::NotFound,
            Self::Unauthorized(_)    => ErrorKind::Unauthorized,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::Csv(_)
            | Self::Other(_)         => ErrorKind::Collaborator,
        }
    }
}

pub type RidershipResult<T> = Result<T, RidershipError>;

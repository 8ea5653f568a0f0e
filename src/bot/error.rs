use thiserror::Error;

use crate::services::reports::ReportError;

/// Failures that abort the current workflow. Validation problems and access
/// denials are ordinary transitions and never reach this type.
#[derive(Debug, Error)]
pub(crate) enum BotError {
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Report(#[from] ReportError),
}

pub(crate) type BotResult<T> = Result<T, BotError>;

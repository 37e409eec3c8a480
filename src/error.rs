use thiserror::Error;

/// Crate-wide error type.
///
/// Variants fall into four classes: validation failures (rejected before
/// any store access), missing records, referential conflicts, and
/// store/stream failures. Nothing here is fatal to the process; every
/// failure is scoped to the request that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// A request field failed validation.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The referenced record does not exist (or is soft-deleted).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// A project cannot be deleted while tasks still reference it.
    #[error("project {id} has {count} associated task(s); delete or reassign them first")]
    ProjectInUse { id: i32, count: i64 },

    /// A query or connection failure from the underlying store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An I/O failure on the export output stream. Once rows have been
    /// written this is terminal for the stream: the partial file must not
    /// be presented as a successful download.
    #[error("export stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// The spreadsheet writer was driven out of order (row after
    /// finalize, double finalize).
    #[error("exporter state error: {0}")]
    ExporterState(&'static str),
}

impl Error {
    /// HTTP status class for the boundary layer that translates errors
    /// into JSON responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::NotFound { .. } => 404,
            Error::ProjectInUse { .. } => 409,
            Error::Database(sqlx::Error::RowNotFound) => 404,
            Error::Database(_) | Error::Stream(_) | Error::ExporterState(_) => 500,
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

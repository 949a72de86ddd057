//! HTTP error mapping.
//!
//! # Invariants
//! - Every failure leaves the adapter as a JSON `{ "error": <message> }` body.
//! - `InvalidInput` -> 400, `NotFound` -> 404, `Conflict` -> 409,
//!   `StoreUnavailable` -> 503.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use mu_core::{DirectoryError, ErrorKind, RepoError};
use std::path::PathBuf;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::task::JoinError;

/// Request-scoped failure returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    Directory(DirectoryError),
    /// Request body is not valid JSON for the expected payload.
    MalformedPayload(String),
    /// The blocking directory task did not complete.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Directory(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(err) => write!(f, "{err}"),
            Self::MalformedPayload(reason) => write!(f, "malformed payload: {reason}"),
            Self::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::MalformedPayload(value.body_text())
    }
}

impl From<JoinError> for ApiError {
    fn from(value: JoinError) -> Self {
        error!("event=directory_task module=http status=error error={value}");
        Self::Internal("directory task failed".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Startup failure for the HTTP server.
#[derive(Debug)]
pub enum ServerError {
    Store(RepoError),
    Io(std::io::Error),
    /// The seed file could not be read or parsed.
    SeedFile { path: PathBuf, reason: String },
    Seed(DirectoryError),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "failed to open site store: {err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::SeedFile { path, reason } => {
                write!(f, "failed to load seed file {}: {reason}", path.display())
            }
            Self::Seed(err) => write!(f, "failed to seed sites: {err}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Seed(err) => Some(err),
            Self::SeedFile { .. } => None,
        }
    }
}

impl From<RepoError> for ServerError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DirectoryError> for ServerError {
    fn from(value: DirectoryError) -> Self {
        Self::Seed(value)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API error type: every handler failure becomes a JSON response with a
//! machine-readable `code`; nothing crosses the HTTP boundary unhandled.

use crate::checkpoint::CheckpointError;
use crate::dispatch::DispatchError;
use crate::recovery::RecoveryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ft_storage::StorageError;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), details: None }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "PERMISSION", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, error = %self.message, "request failed");
        }
        let mut body = json!({
            "error": self.message,
            "code": self.code,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound(entity, id) => {
                Self::not_found(format!("{} not found: {}", entity, id))
            }
            StorageError::AppendConflict(stream) => {
                Self::conflict(format!("concurrent append on {}", stream))
            }
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Storage(e) => e.into(),
            DispatchError::MissionNotFound(id) => {
                Self::not_found(format!("mission not found: {}", id))
            }
            DispatchError::SpecialistNotFound(id) => {
                Self::not_found(format!("specialist not found: {}", id))
            }
            DispatchError::InvalidPhase(..) => Self::conflict(err.to_string()),
        }
    }
}

impl From<CheckpointError> for ApiError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::Storage(e) => e.into(),
            CheckpointError::MissionNotFound(id) => {
                Self::not_found(format!("mission not found: {}", id))
            }
        }
    }
}

impl From<RecoveryError> for ApiError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::Storage(e) => e.into(),
            RecoveryError::Checkpoint(e) => e.into(),
            RecoveryError::CheckpointNotFound(id) => {
                Self::not_found(format!("checkpoint not found: {}", id))
            }
        }
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use beam_core::errors::{BeamError, ErrorKind};
use serde_json::json;

/// Handler error: a [`BeamError`] rendered as a Feathers-style JSON body.
#[derive(Debug)]
pub struct BeamAxumError(pub BeamError);

impl BeamAxumError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BeamError::validation(msg))
    }
}

impl From<BeamError> for BeamAxumError {
    fn from(e: BeamError) -> Self {
        Self(e)
    }
}

impl IntoResponse for BeamAxumError {
    fn into_response(self) -> Response {
        let err = self.0;
        let kind = err.kind();

        if kind == ErrorKind::GeneralError {
            tracing::error!(error = %err, source = ?std::error::Error::source(&err), "request failed");
        }

        let message = err.client_message();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "name": kind.name(),
            "message": message,
            "code": kind.status_code(),
            "className": kind.class_name(),
            "error": message,
        });
        (status, Json(body)).into_response()
    }
}

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use beam_core::{Code, UploadRequest};

use crate::multipart::read_upload_form;
use crate::{BeamAxumError, BeamAxumState};

pub fn api_router(state: BeamAxumState) -> Router<()> {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/meta/{code}", get(meta))
        .route("/api/download/{code}", get(download))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn upload(
    State(state): State<BeamAxumState>,
    req: Request,
) -> Result<Response, BeamAxumError> {
    let (parts, body) = req.into_parts();
    let form = read_upload_form(&parts.headers, body, &state.multipart).await?;

    let file = form
        .file
        .as_ref()
        .ok_or_else(|| BeamAxumError::bad_request("No file received"))?;

    let stream = file
        .open_stream()
        .await
        .map_err(|e| BeamAxumError(beam_core::BeamError::Storage(e.into())))?;

    let mut request = UploadRequest::new(file.filename.clone(), stream)
        .with_form_options(form.field("burn_after"), form.field("expire_in"));
    if let Some(ct) = &file.content_type {
        request = request.content_type(ct.clone());
    }

    // `form` owns the spooled file and must outlive the upload.
    let receipt = state.engine.upload(request).await?;
    drop(form);

    Ok(Json(receipt).into_response())
}

async fn meta(
    State(state): State<BeamAxumState>,
    Path(code): Path<String>,
) -> Result<Response, BeamAxumError> {
    let meta = state.engine.meta(&Code::parse(&code)).await?;
    Ok(Json(meta).into_response())
}

async fn download(
    State(state): State<BeamAxumState>,
    Path(code): Path<String>,
) -> Result<Response, BeamAxumError> {
    let download = state.engine.download(&Code::parse(&code)).await?;

    let disposition = HeaderValue::from_str(&download.content_disposition())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(&download.record.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, download.record.size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(download.body))
        .map_err(|e| {
            tracing::error!(error = %e, "failed to build download response");
            BeamAxumError(beam_core::BeamError::Storage(beam_blob::BlobError::backend(e)))
        })?;

    Ok(response)
}

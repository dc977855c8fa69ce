//! Stored uploads and results

use std::path::Path;

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::server::error::ApiError;
use crate::server::state::SharedState;

/// GET /results/:filename
pub async fn get_result(
    State(state): State<SharedState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(&state.config.results_dir, &filename).await
}

/// GET /uploads/:filename
pub async fn get_upload(
    State(state): State<SharedState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    serve_file(&state.config.upload_dir, &filename).await
}

async fn serve_file(dir: &Path, filename: &str) -> Result<Response, ApiError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(ApiError::bad_request("invalid file name"));
    }

    let path = dir.join(filename);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::not_found(format!("file not found: {}", filename))
        } else {
            error!("Failed to read {}: {}", path.display(), e);
            ApiError::internal("failed to read file")
        }
    })?;

    Ok(([(header::CONTENT_TYPE, content_type(filename))], bytes).into_response())
}

fn content_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("json") => "application/json; charset=utf-8",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("result_1.json"), "application/json; charset=utf-8");
        assert_eq!(content_type("a.JPG"), "image/jpeg");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }
}

//! Upload endpoint - store the image, run the dispatcher, persist the result

use std::path::Path;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::Envelope;
use crate::detector::catalog::DEFAULT_CROP;
use crate::detector::utils::timestamp;
use crate::detector::{Details, Mode};
use crate::server::error::ApiError;
use crate::server::state::SharedState;

#[derive(Debug, Serialize)]
pub struct DetectData {
    pub result: Option<String>,
    pub mode: Mode,
    pub details: Option<Details>,
    pub crop_type: String,
    pub image_name: String,
    /// None if the result could not be saved
    pub result_file: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

struct Upload {
    filename: String,
    data: axum::body::Bytes,
}

/// POST /api/detect - multipart `file` plus optional `crop_type`
pub async fn detect_disease(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<DetectData>>, ApiError> {
    let config = &state.config;
    let max_bytes = config.max_upload_bytes;

    let mut multipart = multipart.map_err(|_| ApiError::bad_request("no image uploaded"))?;
    let mut upload: Option<Upload> = None;
    let mut crop_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(e, max_bytes))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::from_multipart(e, max_bytes))?;
                upload = Some(Upload { filename, data });
            }
            Some("crop_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::from_multipart(e, max_bytes))?;
                crop_type = Some(value);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("no image uploaded"))?;
    if upload.filename.trim().is_empty() {
        return Err(ApiError::bad_request("no file selected"));
    }
    if !config.is_allowed_file(&upload.filename) {
        return Err(ApiError::bad_request(format!(
            "unsupported file type, allowed: {}",
            config.allowed_extensions.join(", ")
        )));
    }
    if upload.data.len() > max_bytes {
        return Err(ApiError::payload_too_large(max_bytes));
    }

    let crop_type = crop_type
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CROP.to_string());

    let image_name = secure_filename(&upload.filename);
    let stored_name = format!("{}_{}", Uuid::new_v4().simple(), image_name);
    let image_path = config.upload_dir.join(&stored_name);

    store_upload(&config.upload_dir, &image_path, &upload.data)
        .await
        .map_err(|e| {
            error!("Failed to store upload {}: {}", image_path.display(), e);
            ApiError::internal("failed to store the uploaded image")
        })?;
    info!("Stored upload {} ({} bytes), crop {}", stored_name, upload.data.len(), crop_type);

    let dispatcher = state.dispatcher.clone();
    let task_path = image_path.clone();
    let task_crop = crop_type.clone();
    let result = tokio::spawn(async move { dispatcher.detect(&task_path, &task_crop, false).await })
        .await
        .map_err(|e| {
            error!("Detection task failed: {}", e);
            ApiError::internal(format!("detection failed: {}", e))
        })?;

    let result_name = format!("result_{}.json", Uuid::new_v4().simple());
    let destination = config.results_dir.join(&result_name);
    let dispatcher = state.dispatcher.clone();
    // persist writes with std::fs
    let (result, saved) = tokio::task::spawn_blocking(move || {
        let saved = dispatcher.persist(&result, &destination);
        (result, saved)
    })
    .await
    .map_err(|e| {
        error!("Persist task failed: {}", e);
        ApiError::internal(format!("failed to save result: {}", e))
    })?;
    let result_file = saved.then_some(result_name);

    Ok(Json(Envelope::success(DetectData {
        result: result.result,
        mode: result.mode,
        details: result.details,
        crop_type,
        image_name,
        result_file,
        timestamp: timestamp(),
        remote_error: result.remote_error,
    })))
}

async fn store_upload(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, data).await
}

/// Reduce an uploaded name to `[A-Za-z0-9._-]`, keeping the extension
pub fn secure_filename(filename: &str) -> String {
    // browsers on Windows may send a full path
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let path = Path::new(base);

    let clean = |s: &str| -> String {
        let mapped: String = s
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        mapped.trim_matches('_').to_string()
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(clean)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());

    match path.extension().and_then(|e| e.to_str()).map(clean) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext.to_lowercase()),
        _ => stem,
    }
}

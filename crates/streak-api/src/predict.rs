use axum::extract::State;
use serde::Deserialize;
use tracing::{error, info};

use streak_types::api::PredictionResponse;

use crate::error::ApiError;
use crate::extract::{Json, Multipart, Query};
use crate::state::AppState;
use crate::verifier::{DEFAULT_MIME_TYPE, ImageUpload, VerifyError};

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub description: Option<String>,
}

/// POST /predict: multipart `file` plus a `description` (form field or
/// query parameter). Returns the model's reply untouched.
pub async fn predict(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
    Multipart(mut multipart): Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    let mut description = query.description;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let mime_type = field
                    .content_type()
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                image = Some(ImageUpload { mime_type, bytes });
            }
            Some("description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                description = Some(text);
            }
            _ => {}
        }
    }

    let description = description
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Challenge description is required".into()))?;
    let image = image
        .filter(|img| !img.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("An image file is required".into()))?;

    info!("Verifying {} byte {} image", image.bytes.len(), image.mime_type);

    match state.verifier.verify(&image, &description).await {
        Ok(predictions) => Ok(Json(PredictionResponse { predictions })),
        Err(VerifyError::Disabled) => Err(ApiError::Unavailable(VerifyError::Disabled.to_string())),
        Err(e) => {
            error!("Image verification failed: {}", e);
            Err(ApiError::Upstream(e.to_string()))
        }
    }
}

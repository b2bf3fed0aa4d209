use axum::{extract::Multipart, Extension, Json};
use serde_json::{json, Value as JsonValue};

use crate::config::Config;
use crate::error::AppError;
use crate::inbox::Upload;

/// Multipart field carrying the PGN file
const FILE_FIELD: &str = "f";

/// POST /upload_pgn
/// Stream the `f` field into the intake directory as a new batch file.
pub async fn upload_pgn(
    Extension(config): Extension<Config>,
    mut multipart: Multipart,
) -> Result<Json<JsonValue>, AppError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mut upload = Upload::create(&config.inbox).await?;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    upload.abort().await;
                    return Err(e.into());
                }
            };
            if let Err(e) = upload.write(&chunk).await {
                upload.abort().await;
                return Err(e.into());
            }
        }

        let bytes = upload.bytes_written();
        let file = upload.finish().await?;
        tracing::info!(file = %file, bytes, "PGN upload queued");
        return Ok(Json(json!({ "ok": true, "file": file })));
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart file field '{FILE_FIELD}'"
    )))
}

//! Serves stored images back out of the upload root.

use crate::error::AppError;
use crate::external::LocalFileStorage;
use actix_web::{HttpResponse, ResponseError, Result, web};
use std::path::Path;

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

pub async fn serve_upload(
    storage: web::Data<LocalFileStorage>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let relative = path.into_inner();
    let Some(full_path) = storage.resolve(&relative) else {
        return Ok(AppError::NotFound("File not found".to_string()).error_response());
    };

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .content_type(content_type_for(&full_path))
            .insert_header(("Cache-Control", "public, max-age=86400"))
            .body(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(AppError::NotFound("File not found".to_string()).error_response())
        }
        Err(e) => Ok(AppError::IoError(e).error_response()),
    }
}

pub fn uploads_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/uploads/{path:.*}", web::get().to(serve_upload));
}

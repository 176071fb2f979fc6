//! HTTP handler functions for the intake API.

use std::path::Path;

use actix_multipart::{Multipart, MultipartError};
use actix_web::{HttpResponse, web};
use futures::StreamExt as _;
use detective_geocoder::verify_location;
use detective_intake::tools::GENERIC_FAILURE_MESSAGE;
use detective_report_models::CrimeReport;
use detective_server_models::{
    ApiError, ApiHealth, GeocodeParams, GeocodeResponse, TranslateRequest, TranslateResponse,
    UploadResponse,
};
use detective_translate::ENGLISH;

use crate::{AppState, MAX_UPLOAD_BYTES, ServerError};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn internal_error(context: &str, e: &ServerError) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError::new(GENERIC_FAILURE_MESSAGE))
}

fn report_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new("No report exists for this conversation."))
}

async fn load_report(state: &AppState, conversation_id: &str) -> Result<Option<CrimeReport>, ServerError> {
    let Some(record_id) = state.sessions.record_for_conversation(conversation_id).await? else {
        return Ok(None);
    };
    Ok(state.reports.get_report(&record_id).await?)
}

async fn load_summary(state: &AppState, conversation_id: &str) -> Result<Option<String>, ServerError> {
    let Some(record_id) = state.sessions.record_for_conversation(conversation_id).await? else {
        return Ok(None);
    };
    Ok(state.reports.summary(&record_id).await?)
}

/// `GET /api/reports/{conversation_id}`
///
/// Returns the report behind a conversation.
pub async fn report(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match load_report(&state, &path).await {
        Ok(Some(report)) => HttpResponse::Ok().json(report),
        Ok(None) => report_not_found(),
        Err(e) => internal_error("Failed to load report", &e),
    }
}

/// `GET /api/reports/{conversation_id}/summary`
///
/// Returns the printable Markdown summary of a conversation's report.
pub async fn report_summary(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match load_summary(&state, &path).await {
        Ok(Some(summary)) => HttpResponse::Ok()
            .content_type("text/markdown; charset=utf-8")
            .body(summary),
        Ok(None) => report_not_found(),
        Err(e) => internal_error("Failed to render report summary", &e),
    }
}

/// `GET /api/geocode?address=`
///
/// Verifies a location the way report updates do, including the
/// agency's fallback area.
pub async fn geocode(state: web::Data<AppState>, params: web::Query<GeocodeParams>) -> HttpResponse {
    let Some(address) = params.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
        return HttpResponse::BadRequest().json(ApiError::new("Address is required."));
    };

    let area = state.reports.agency().fallback_area();
    match verify_location(state.geocoder.as_ref(), &area, address).await {
        Ok(verification) => HttpResponse::Ok().json(GeocodeResponse::from(verification)),
        Err(e) => internal_error("Geocoding failed", &ServerError::from(e)),
    }
}

/// `POST /api/translate`
pub async fn translate(state: web::Data<AppState>, body: web::Json<TranslateRequest>) -> HttpResponse {
    let TranslateRequest { text, target_lang } = body.into_inner();
    if text.trim().is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("Text is required."));
    }
    let target = target_lang
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| ENGLISH.to_string());

    match state.translator.translate(&text, &target).await {
        Ok(translation) => HttpResponse::Ok().json(TranslateResponse {
            success: true,
            translation,
        }),
        Err(e) => {
            log::warn!("Translation to '{target}' failed: {e}");
            HttpResponse::BadGateway().json(ApiError::new("Translation failed. Please try again."))
        }
    }
}

/// Keeps the characters of a file name that are safe in a URL path.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

async fn store_file(dir: &Path, name: &str, body: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(name), body).await
}

/// Multipart field that carries evidence files.
const UPLOAD_FIELD: &str = "files";

struct UploadedFile {
    filename: String,
    body: Vec<u8>,
}

fn malformed_upload(e: &MultipartError) -> HttpResponse {
    log::warn!("Malformed evidence upload: {e}");
    HttpResponse::BadRequest().json(ApiError::new("The upload could not be read."))
}

/// Reads every non-empty `files` field. Other fields are skipped.
async fn read_files(mut payload: Multipart) -> Result<Vec<UploadedFile>, HttpResponse> {
    let mut files = Vec::new();
    let mut total = 0;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| malformed_upload(&e))?;
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();

        let mut body = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| malformed_upload(&e))?;
            total += chunk.len();
            if total > MAX_UPLOAD_BYTES {
                return Err(HttpResponse::PayloadTooLarge().json(ApiError::new("Upload is too large.")));
            }
            body.extend_from_slice(&chunk);
        }

        if !body.is_empty() {
            files.push(UploadedFile { filename, body });
        }
    }

    Ok(files)
}

/// `POST /api/evidence`
///
/// Stores every file of the multipart `files` field under a unique name
/// in the uploads directory and returns their public URLs in order.
pub async fn upload_evidence(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let files = match read_files(payload).await {
        Ok(files) => files,
        Err(response) => return response,
    };
    if files.is_empty() {
        return HttpResponse::BadRequest().json(ApiError::new("No file was uploaded."));
    }

    let mut file_urls = Vec::with_capacity(files.len());
    for file in files {
        let prefix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", &prefix[..12], sanitize_filename(&file.filename));

        if let Err(e) = store_file(&state.config.uploads_dir, &name, &file.body).await {
            return internal_error("Failed to store evidence", &ServerError::from(e));
        }

        log::info!("Stored evidence {name} ({} bytes)", file.body.len());
        file_urls.push(format!("{}/uploads/{name}", state.config.public_base_url));
    }

    HttpResponse::Ok().json(UploadResponse {
        success: true,
        file_urls,
    })
}

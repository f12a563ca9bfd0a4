//! HTTP handlers for capture ingestion, listing, clearing and retrieval

pub mod deletion_worker;

use actix_web::error::ErrorInternalServerError;
use actix_web::{web, Error, HttpResponse};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::codec::decode_image;
use crate::error::StoreError;
use crate::store::Entry;

/// Register every route on an actix service config
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload-base64", web::post().to(upload_base64))
        .route("/photos", web::get().to(list_photos))
        .route("/photos/{key}", web::get().to(get_photo))
        .route("/clear", web::post().to(clear_photos))
        .route("/clear", web::get().to(clear_photos))
        .route("/stats", web::get().to(stats));
}

/// JSON extractor config: body size limit, malformed bodies answered in the API's error shape
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| StoreError::InvalidInput(err.to_string()).into())
}

fn extract_images(body: &Value) -> Result<Vec<&str>, StoreError> {
    let images = body
        .get("images")
        .and_then(Value::as_array)
        .filter(|images| !images.is_empty())
        .ok_or_else(|| StoreError::InvalidInput("No images provided".to_string()))?;

    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            image
                .as_str()
                .ok_or_else(|| StoreError::InvalidInput(format!("image {} is not a string", i)))
        })
        .collect()
}

/// Decode every image before storing any, so a bad upload leaves the store untouched
fn decode_all(images: &[&str]) -> Result<Vec<Vec<u8>>, StoreError> {
    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            decode_image(image).map_err(|e| match e {
                StoreError::InvalidInput(msg) => StoreError::InvalidInput(format!("image {}: {}", i, msg)),
                other => other,
            })
        })
        .collect()
}

pub async fn upload_base64(body: web::Json<Value>, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "upload");

    let images = extract_images(&body).map_err(|e| {
        warn!("Rejected upload: {}", e);
        e
    })?;
    let payloads = decode_all(&images).map_err(|e| {
        warn!("Rejected upload: {}", e);
        e
    })?;
    debug!("Decoded {} images, {} bytes total", payloads.len(), payloads.iter().map(Vec::len).sum::<usize>());

    let store = app_state.store.clone();
    let entries = web::block(move || {
        payloads
            .iter()
            .map(|payload| store.put(payload))
            .collect::<Result<Vec<Entry>, StoreError>>()
    })
    .await
    .map_err(ErrorInternalServerError)??;

    info!("Stored {} uploaded images", entries.len());
    let files: Vec<String> = entries.iter().map(Entry::url).collect();
    Ok(HttpResponse::Ok().json(json!({ "success": true, "files": files })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only return the newest N photos
    pub latest: Option<usize>,
}

pub async fn list_photos(query: web::Query<ListQuery>, app_state: web::Data<AppState>) -> HttpResponse {
    log_mdc::insert("route", "list");

    let entries = match query.latest {
        Some(n) => app_state.store.latest(n),
        None => app_state.store.list(),
    };
    let urls: Vec<String> = entries.iter().map(Entry::url).collect();
    debug!("Listing {} photos", urls.len());
    HttpResponse::Ok().json(urls)
}

pub async fn clear_photos(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "clear");

    let store = app_state.store.clone();
    let removed = web::block(move || store.clear())
        .await
        .map_err(ErrorInternalServerError)??;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "removed": removed })))
}

pub async fn get_photo(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    log_mdc::insert("route", "photo");

    let key = path.into_inner();
    let store = app_state.store.clone();
    let (entry, data) = web::block(move || store.read(&key))
        .await
        .map_err(ErrorInternalServerError)??;

    let etag = hex::encode(md5::compute(&data).0);
    debug!("Serving {} ({} bytes)", entry.key, entry.size_bytes);
    Ok(HttpResponse::Ok()
        .content_type("image/png")
        .insert_header(("ETag", format!("\"{}\"", etag)))
        .body(data))
}

pub async fn stats(app_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.store.stats())
}

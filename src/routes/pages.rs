use std::path::{Component, Path as FsPath, PathBuf};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde_json::{json, Value};

use crate::services::flash::{FlashKind, FlashMessage};
use crate::AppState;

const PAGE_TEMPLATE: &str = include_str!("../../assets/index.html");

/// Registration form page. Consumes the flash message left by the last
/// submission and clears its cookie.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let flash = state.flash.read(&headers);
    let banner = flash.as_ref().map(flash_banner).unwrap_or_default();
    let page = PAGE_TEMPLATE
        .replace("{{event_name}}", &state.config.event_name)
        .replace("{{flash}}", &banner);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8");
    if flash.is_some() {
        builder = builder.header(header::SET_COOKIE, state.flash.clear_cookie());
    }
    builder.body(Body::from(page)).unwrap_or_default()
}

fn flash_banner(flash: &FlashMessage) -> String {
    let class = match flash.kind {
        FlashKind::Success => "flash flash-success",
        FlashKind::Error => "flash flash-error",
    };
    format!(
        r#"<div class="{class}" role="status">{}</div>"#,
        html_escape(&flash.message)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Serves optional assets (logos etc.) from IMG_DIR; 404 when the
/// directory is absent or the path escapes it.
pub async fn image_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, StatusCode> {
    let file_path = resolve_asset(&state.config.img_dir, &path).ok_or(StatusCode::NOT_FOUND)?;

    let data = tokio::fs::read(&file_path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let content_type = mime_guess::from_path(&file_path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(data))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn resolve_asset(dir: &FsPath, requested: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let relative = FsPath::new(requested);
    // Only plain file-name components; no .. or absolute segments
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(dir.join(relative))
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "csv_log": if state.store.disabled() { "disabled" } else { "enabled" },
    }))
}

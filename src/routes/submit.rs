use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};

use crate::models::registration::{Registration, RequestMeta};
use crate::services::flash::FlashKind;
use crate::services::validation::{validate, ValidationRules};
use crate::AppState;

/// Localized copy shown after the redirect.
const MSG_ACCEPTED: &str = "Takk! Påmeldingen er registrert.";
const MSG_STORE_FAILED: &str =
    "Noe gikk galt ved lagring av påmeldingen. Vennligst prøv igjen.";

/// One registration submission: validate, persist, fire off the
/// notification, redirect back to the form with a status message.
pub async fn submit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let rules = ValidationRules::from_config(&state.config);
    if let Err(e) = validate(&rules, &form) {
        return redirect_with_flash(&state, FlashKind::Error, &e.to_string());
    }

    let meta = request_meta(&headers, addr);
    let record = Registration::from_form(&state.schema, &form, &meta);

    if let Err(e) = state.store.append(&record).await {
        // A lost registration is worse than a visible error, so an I/O
        // failure on the enabled log is surfaced to the submitter.
        tracing::error!("Failed to persist registration: {e:#}");
        return redirect_with_flash(&state, FlashKind::Error, MSG_STORE_FAILED);
    }

    // Advisory only; the submitter's outcome never waits on the provider
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        notifier.notify(&record).await;
    });

    redirect_with_flash(&state, FlashKind::Success, MSG_ACCEPTED)
}

/// Best-effort network metadata: proxy header first, peer address second.
fn request_meta(headers: &HeaderMap, addr: SocketAddr) -> RequestMeta {
    let ip = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();
    RequestMeta { ip, user_agent }
}

fn redirect_with_flash(state: &AppState, kind: FlashKind, message: &str) -> Response {
    let mut response = (StatusCode::SEE_OTHER, [(header::LOCATION, "/")]).into_response();
    if let Some(cookie) = state.flash.set_cookie(kind, message) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

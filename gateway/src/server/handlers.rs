//! HTTP request handlers for the rewrite gateway
//!
//! Every rewrite request is authenticated before its body is looked at.

use super::AppState;
use crate::auth::envelope_from_request;
use actix_web::{web, HttpRequest, HttpResponse};
use common::{ApiResponse, GatewayError, Result, RewriteData, RewriteRequest, Verdict};
use log::{info, warn};
use serde_json::json;

const PREVIEW_CHARS: usize = 50;

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Handles `POST /api/rewrite`
///
/// Rejections map to 401 with the reason code; a body without usable
/// `content` is a 400.
pub async fn rewrite(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let envelope = envelope_from_request(&req);
    let device_id = match state.verifier.verify(&envelope).await {
        Verdict::Accepted(device_id) => device_id,
        Verdict::Rejected(reason) => return Err(GatewayError::Unauthorized(reason)),
    };

    let (text, translate_to_french) = match serde_json::from_slice::<RewriteRequest>(&body) {
        Ok(RewriteRequest { content: Some(content), translate_to_french }) if !content.is_empty() => {
            (content, translate_to_french)
        }
        Ok(_) => return Ok(no_content()),
        Err(e) => {
            warn!("Unreadable rewrite body from device {}: {}", device_id, e);
            return Ok(no_content());
        }
    };

    info!("Received rewrite request from device {} for: {}...", device_id, preview(&text));

    let rewritten = state.rewriter.rewrite(&text, translate_to_french).await;

    info!("Rewritten text: {}...", preview(&rewritten));

    Ok(HttpResponse::Ok().json(ApiResponse::ok(RewriteData { response: rewritten })))
}

fn no_content() -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::failure("No content provided"))
}

/// Plain `OPTIONS` requests without CORS preflight headers.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(ApiResponse::<()>::failure("Method not allowed"))
}

/// Handles `GET /api/status`
pub async fn get_status(state: web::Data<AppState>) -> HttpResponse {
    let timeout = state.verifier.store_timeout();
    let store_ok = matches!(
        tokio::time::timeout(timeout, state.health.ping()).await,
        Ok(Ok(()))
    );

    if !store_ok {
        warn!("Status check: store unreachable");
    }

    HttpResponse::Ok().json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "store": store_ok,
    }))
}

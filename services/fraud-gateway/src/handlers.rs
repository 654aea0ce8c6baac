//! HTTP routes for the MCP session transport
//!
//! This is the only place the admission rule is enforced: a request is
//! accepted when it carries the id of an open session, or when it carries no
//! id and is itself an initialize request.

use crate::errors::{GatewayError, GatewayResult};
use crate::metrics::{metrics_handler, MCP_REQUESTS_TOTAL};
use crate::protocol::JsonRpcRequest;
use crate::session::{SessionHandle, SessionManager};
use actix_web::{web, HttpRequest, HttpResponse};
use prometheus::Registry;
use serde_json::{json, Value};
use tracing::{error, warn};

/// Header correlating requests with a session
pub const SESSION_HEADER: &str = "mcp-session-id";

/// What an inbound request asks the transport to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Initialize,
    ResumedCall,
    SessionQuery,
    SessionClose,
}

impl RequestKind {
    fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Initialize => "initialize",
            RequestKind::ResumedCall => "call",
            RequestKind::SessionQuery => "query",
            RequestKind::SessionClose => "close",
        }
    }
}

fn session_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn record(kind: RequestKind, error: Option<&GatewayError>) {
    let outcome = match error {
        None => "ok",
        Some(GatewayError::InvalidSession) => "invalid_session",
        Some(GatewayError::Channel(_)) => "failed",
        Some(_) => "malformed",
    };
    MCP_REQUESTS_TOTAL
        .with_label_values(&[kind.as_str(), outcome])
        .inc();
}

fn parse_request(body: &[u8]) -> GatewayResult<JsonRpcRequest> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if value.is_array() {
        return Err(GatewayError::InvalidRequest(
            "batch requests are not supported".to_string(),
        ));
    }

    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
    request.validate().map_err(GatewayError::InvalidRequest)?;
    Ok(request)
}

/// Resolve the session an inbound POST belongs to
fn admit(
    manager: &SessionManager,
    session_id: Option<&str>,
    request: &JsonRpcRequest,
) -> GatewayResult<(RequestKind, SessionHandle)> {
    match session_id {
        Some(id) => Ok((RequestKind::ResumedCall, manager.resume(id)?)),
        None if request.is_initialize() => Ok((RequestKind::Initialize, manager.create())),
        None => Err(GatewayError::InvalidSession),
    }
}

// ===== POST /mcp =====
pub async fn post_mcp(
    req: HttpRequest,
    body: web::Bytes,
    manager: web::Data<SessionManager>,
) -> GatewayResult<HttpResponse> {
    let session_id = session_id(&req);
    let request = parse_request(&body).map_err(|e| {
        let kind = if session_id.is_some() {
            RequestKind::ResumedCall
        } else {
            RequestKind::Initialize
        };
        record(kind, Some(&e));
        e
    })?;

    let (kind, handle) = admit(&manager, session_id.as_deref(), &request).map_err(|e| {
        warn!(session_id = ?session_id, method = %request.method, "Rejected request without a valid session");
        record(RequestKind::ResumedCall, Some(&e));
        e
    })?;

    let result = handle.request(request).await;
    record(kind, result.as_ref().err());

    match result {
        Ok(Some(response)) => Ok(HttpResponse::Ok()
            .insert_header((SESSION_HEADER, handle.id()))
            .json(response)),
        Ok(None) => Ok(HttpResponse::Accepted()
            .insert_header((SESSION_HEADER, handle.id()))
            .finish()),
        Err(e) => {
            error!(session_id = %handle.id(), error = %e, "Session failed to answer");
            Err(e)
        }
    }
}

// ===== GET /mcp =====
pub async fn get_mcp(
    req: HttpRequest,
    manager: web::Data<SessionManager>,
) -> GatewayResult<HttpResponse> {
    let result = session_id(&req)
        .ok_or(GatewayError::InvalidSession)
        .and_then(|id| manager.resume(&id));
    record(RequestKind::SessionQuery, result.as_ref().err());

    let handle = result?;
    Ok(HttpResponse::Ok()
        .insert_header((SESSION_HEADER, handle.id()))
        .json(handle.info()))
}

// ===== DELETE /mcp =====
pub async fn delete_mcp(
    req: HttpRequest,
    manager: web::Data<SessionManager>,
) -> GatewayResult<HttpResponse> {
    let result = session_id(&req)
        .ok_or(GatewayError::InvalidSession)
        .and_then(|id| manager.resume(&id));
    record(RequestKind::SessionClose, result.as_ref().err());

    let handle = result?;
    manager.close(handle.id()).await;

    Ok(HttpResponse::Ok().json(json!({
        "session_id": handle.id(),
        "state": handle.state(),
    })))
}

// ===== Health Check =====
pub async fn health_check(manager: web::Data<SessionManager>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": manager.active_sessions(),
    }))
}

// ===== Metrics =====
pub async fn metrics(registry: web::Data<Registry>) -> HttpResponse {
    match metrics_handler(&registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics))
        .service(
            web::resource("/mcp")
                .route(web::post().to(post_mcp))
                .route(web::get().to(get_mcp))
                .route(web::delete().to(delete_mcp)),
        );
}

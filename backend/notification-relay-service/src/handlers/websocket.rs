//! WebSocket endpoints: the session upgrade and connection status.

use actix_web::{web, Error, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::json;

use crate::state::AppState;
use crate::websocket::WsSession;

/// Upgrade the request to a WebSocket session.
///
/// Endpoint: GET /ws
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = WsSession::new(state.registry.clone());
    ws::start(session, &req, stream)
}

/// Connection status for one user in this process.
///
/// Endpoint: GET /api/v1/ws/status/{user_id}
pub async fn ws_status(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let user_id = path.into_inner();
    let session_count = state.registry.session_count(&user_id).await;

    Ok(HttpResponse::Ok().json(json!({
        "userId": user_id,
        "connected": session_count > 0,
        "sessionCount": session_count
    })))
}

/// Aggregate connection stats for this process.
///
/// Endpoint: GET /api/v1/ws/stats
pub async fn ws_stats(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let total_sessions = state.registry.total_sessions().await;
    let connected_users = state.registry.connected_users().await;

    Ok(HttpResponse::Ok().json(json!({
        "totalSessions": total_sessions,
        "connectedUsers": connected_users
    })))
}

/// Register WebSocket routes.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_index)).service(
        web::scope("/api/v1/ws")
            .route("/status/{user_id}", web::get().to(ws_status))
            .route("/stats", web::get().to(ws_stats)),
    );
}

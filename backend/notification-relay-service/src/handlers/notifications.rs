//! Operational endpoint for injecting notification events.
//!
//! Publishes through the same broker channel the relay consumes, so a
//! request here exercises the full publish, relay and socket path.

use actix_web::{web, HttpResponse, Result as ActixResult};
use event_schema::NotificationEvent;
use notification_pubsub::PubSubError;
use serde_json::json;

use crate::state::AppState;

/// Publish one notification event to the broker channel.
///
/// Endpoint: POST /api/v1/notifications/publish
pub async fn publish_notification(
    state: web::Data<AppState>,
    body: web::Json<NotificationEvent>,
) -> ActixResult<HttpResponse> {
    match state.publisher.publish(&body).await {
        Ok(subscribers) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "subscribers": subscribers
        }))),
        Err(PubSubError::InvalidEvent(reason)) => Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": reason
        }))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": e.to_string()
        }))),
    }
}

/// Register notification routes.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("/publish", web::post().to(publish_notification)),
    );
}

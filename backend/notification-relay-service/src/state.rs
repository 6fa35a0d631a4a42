use std::sync::Arc;

use notification_pubsub::NotificationPublisher;

use crate::config::Config;
use crate::websocket::SessionRegistry;

/// Shared application state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub publisher: NotificationPublisher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        registry: SessionRegistry,
        publisher: NotificationPublisher,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            publisher,
            config,
        }
    }
}

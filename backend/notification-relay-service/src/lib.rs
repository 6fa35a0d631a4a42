pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod relay;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use websocket::{SessionId, SessionRegistry};

//! Error types for notification publish/subscribe operations

use thiserror::Error;

/// Notification pub/sub errors
#[derive(Error, Debug)]
pub enum PubSubError {
    /// Redis connection or operation error
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(#[from] redis::RedisError),

    /// Event failed publish-time validation
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Message serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PubSubError::InvalidEvent("targetUserId must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "invalid event: targetUserId must not be empty"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<String>("not json");
        assert!(json_err.is_err());

        let err: PubSubError = json_err.unwrap_err().into();
        assert!(matches!(err, PubSubError::Serialization(_)));
    }
}

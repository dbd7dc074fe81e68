use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Failures of the leaderboard read path.
///
/// Only `Upstream` and `Decode` ever leave [`crate::service::LeaderboardService`];
/// `Persistence` is produced by snapshot writes and is logged, never returned
/// to a caller.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Upstream unavailable: {0}")]
    Upstream(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl IntoResponse for LeaderboardError {
    fn into_response(self) -> Response {
        // A failed read never carries a partial holder list.
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let message = self.to_string();

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

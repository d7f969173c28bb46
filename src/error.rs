use thiserror::Error;

/// Shown when a failed response carries no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed. Please try again.";

/// Failure of the client-side transport, before or during streaming.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed with status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    /// The message surfaced to the user.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            TransportError::Status { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            TransportError::Network(detail) => format!("Network error: {detail}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// The receiving end of a generation stream has gone away.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("stream closed by client")]
pub struct StreamClosed;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Daily generation limit of {limit} reached. Try again tomorrow!")]
    LimitReached { limit: u32 },
}

cfg_if::cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::{
            http::StatusCode,
            response::{IntoResponse, Response},
            Json,
        };
        use log::error;

        use crate::services::gemini::GeminiError;
        use crate::services::github::GithubError;
        use crate::types::ErrorBody;

        /// Errors returned by API handlers before a stream is opened.
        #[derive(Debug, Error)]
        pub enum AppError {
            #[error("{0}")]
            BadRequest(String),
            #[error(transparent)]
            Usage(#[from] UsageError),
            #[error(transparent)]
            Github(#[from] GithubError),
            #[error(transparent)]
            Gemini(#[from] GeminiError),
            #[error(transparent)]
            Internal(#[from] anyhow::Error),
        }

        impl AppError {
            pub fn status_code(&self) -> StatusCode {
                match self {
                    AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    AppError::Usage(_) => StatusCode::TOO_MANY_REQUESTS,
                    AppError::Github(GithubError::NotFound(_)) => StatusCode::NOT_FOUND,
                    AppError::Github(GithubError::RateLimited | GithubError::TokenRequired) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    AppError::Github(_) | AppError::Gemini(_) => StatusCode::BAD_GATEWAY,
                    AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                }
            }
        }

        impl IntoResponse for AppError {
            fn into_response(self) -> Response {
                let status = self.status_code();
                let message = match &self {
                    AppError::Internal(e) => {
                        error!("Internal error: {e:?}");
                        "Something went wrong. Please try again.".to_string()
                    }
                    other => other.to_string(),
                };
                (status, Json(ErrorBody { error: message })).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_prefers_server_message() {
        let err = TransportError::Status {
            status: 429,
            message: Some("Daily generation limit of 3 reached.".into()),
        };
        assert_eq!(err.user_message(), "Daily generation limit of 3 reached.");
    }

    #[test]
    fn status_error_falls_back_to_generic_message() {
        let err = TransportError::Status {
            status: 500,
            message: Some("  ".into()),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        let err = TransportError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[cfg(feature = "ssr")]
    #[test]
    fn app_errors_map_to_status_codes() {
        assert_eq!(
            AppError::BadRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(UsageError::LimitReached { limit: 2 }).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(GithubError::NotFound("ghost".into())).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[cfg(feature = "ssr")]
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[cfg(feature = "ssr")]
    #[tokio::test]
    async fn error_responses_carry_the_error_body() {
        let (status, body) = response_parts(AppError::BadRequest("'a b' is not valid".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "'a b' is not valid");

        let (status, body) = response_parts(UsageError::LimitReached { limit: 3 }.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body.error,
            "Daily generation limit of 3 reached. Try again tomorrow!"
        );

        let (status, body) = response_parts(GithubError::TokenRequired.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, "Contribution data needs a GitHub token");
    }

    #[cfg(feature = "ssr")]
    #[tokio::test]
    async fn internal_errors_hide_their_details() {
        let err = AppError::from(anyhow::anyhow!("connection pool exhausted at 10.0.0.3"));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Something went wrong. Please try again.");
    }
}

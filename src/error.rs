use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A connection pool could not be built.
    #[error("Pool creation error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// Bad credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No valid session on a route that needs one.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The email is already registered.
    #[error("User already exists")]
    UserAlreadyExists,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A hashing or signing error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::UserAlreadyExists => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::CreatePool(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                "Internal server error".to_string()
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool creation error: {}", e);
                "Internal server error".to_string()
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg.clone()
            }

            AppError::Unauthenticated => {
                tracing::debug!("Request without a valid session");
                "Not authenticated".to_string()
            }

            AppError::UserAlreadyExists => {
                tracing::info!("Signup rejected: user already exists");
                "User already exists".to_string()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                "Internal server error".to_string()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            self.status(),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_expose_their_message() {
        let (status, body) = body_of(AppError::Validation("Missing email or password".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing email or password");

        let (status, body) = body_of(AppError::UserAlreadyExists).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists");

        let (status, _) = body_of(AppError::Authentication("Invalid credentials".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let (status, body) = body_of(AppError::Internal("pool exhausted at 10.0.0.3".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}

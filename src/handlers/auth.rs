use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tower_cookies::Cookies;

use crate::{
    crypto::session_token::session_expiry,
    error::{AppError, Result},
    handlers::form::FormFields,
    middleware_layer::auth::{removal_cookie, session_cookie},
    models::{
        session::{CurrentUser, SessionData},
        user::UserResponse,
    },
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

/// The response payload for signup and login.
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

/// The response payload for the current-user endpoint.
#[derive(Serialize)]
pub struct MeResponse {
    pub user: CurrentUser,
}

/// Mints a session token for `user` and sets it as the session cookie.
fn issue_session(state: &AppState, cookies: &Cookies, user: &UserResponse) -> Result<()> {
    let session = SessionData {
        user_id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        expires_at: session_expiry(state.config.session_duration_days),
    };

    let token = state.sessions.create_session_token(&session)?;
    cookies.add(session_cookie(token, &state.config));
    tracing::debug!("🔑 Session cookie issued for user: {}", user.id);

    Ok(())
}

/// Handles user signup.
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    form: FormFields,
) -> Result<Response> {
    let (Some(email), Some(password), Some(name)) =
        (form.get("email"), form.get("password"), form.get("name"))
    else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };

    tracing::info!("📝 Signup attempt: {}", email);
    validate_email(email)?;
    validate_password(password)?;
    validate_name(name)?;

    let user = auth_service::create_user(state.users.as_ref(), email, password, name).await?;
    issue_session(&state, &cookies, &user)?;

    tracing::info!("✅ User signed up: {}", user.id);

    let response = AuthResponse {
        user,
        message: "Signup successful".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    form: FormFields,
) -> Result<Response> {
    let (Some(email), Some(password)) = (form.get("email"), form.get("password")) else {
        return Err(AppError::Validation("Missing email or password".to_string()));
    };

    tracing::info!("🔐 Login attempt: {}", email);

    let user = auth_service::authenticate_user(state.users.as_ref(), email, password).await?;
    let user = auth_service::sanitize_user(&user);
    issue_session(&state, &cookies, &user)?;

    tracing::info!("✅ User logged in: {}", user.id);

    let response = AuthResponse {
        user,
        message: "Login successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout. Clears the cookie and sends the browser home.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Response {
    cookies.add(removal_cookie(&state.config));
    tracing::info!("👋 Session cookie cleared");

    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

/// Returns the user attached by the session middleware.
pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<MeResponse> {
    Json(MeResponse { user })
}

#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        error::{AppError, Result},
        middleware_layer::auth::SESSION_COOKIE,
        models::{
            session::SessionData,
            user::{NewUser, User},
        },
        repositories::user::{MemoryUserStore, UserStore},
        routes,
        state::AppState,
    };
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, Response, StatusCode, header},
    };
    use chrono::Utc;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "handler-tests-secret-of-at-least-32-bytes";

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SESSION_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap()
    }

    /// A store that fails every call, like a database that went away.
    struct UnreachableStore;

    #[async_trait]
    impl UserStore for UnreachableStore {
        async fn insert_user(&self, _user: NewUser) -> Result<User> {
            Err(AppError::Internal("connection refused".into()))
        }

        async fn find_by_email(&self, _email: &str) -> Result<Option<User>> {
            Err(AppError::Internal("connection refused".into()))
        }

        async fn find_by_id(&self, _id: &Uuid) -> Result<Option<User>> {
            Err(AppError::Internal("connection refused".into()))
        }
    }

    fn app_with(store: Arc<dyn UserStore>) -> (Router, AppState) {
        let state = AppState::with_store(&config(), store);
        (routes::router(state.clone()), state)
    }

    fn app() -> Router {
        app_with(Arc::new(MemoryUserStore::new())).0
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_session(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn set_cookie(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn session_token(response: &Response<Body>) -> String {
        let cookie = set_cookie(response);
        let pair = cookie.split(';').next().unwrap();
        pair.strip_prefix("session=").unwrap().to_string()
    }

    async fn json(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn signup(app: &Router, email: &str) -> Response<Body> {
        app.clone()
            .oneshot(form_post(
                "/api/auth/signup",
                &format!("email={email}&password=secret123&name=Ada"),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signup_creates_user_and_sets_cookie() {
        let app = app();
        let response = signup(&app, "ada@example.com").await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));

        let body = json(response).await;
        assert_eq!(body["message"], "Signup successful");
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["name"], "Ada");
        assert!(body["user"]["_id"].is_string());
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn signup_validates_fields() {
        let app = app();

        let cases = [
            ("email=ada%40example.com&password=secret123", "Missing required fields"),
            ("email=ada%40example.com&password=12345&name=Ada", "Password must be at least 6 characters"),
            ("email=not-an-email&password=secret123&name=Ada", "Invalid email address"),
        ];

        for (form, message) in cases {
            let response = app.clone().oneshot(form_post("/api/auth/signup", form)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{form}");
            assert_eq!(json(response).await["error"], message);
        }
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let app = app();
        assert_eq!(signup(&app, "ada@example.com").await.status(), StatusCode::CREATED);

        let response = signup(&app, "ada@example.com").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json(response).await["error"], "User already exists");
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let app = app();
        signup(&app, "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(form_post("/api/auth/login", "email=ada%40example.com&password=secret123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).starts_with("session="));
        let body = json(response).await;
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["email"], "ada@example.com");

        for form in [
            "email=ada%40example.com&password=wrong-password",
            "email=bob%40example.com&password=secret123",
        ] {
            let response = app.clone().oneshot(form_post("/api/auth/login", form)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(json(response).await["error"], "Invalid credentials");
        }

        let response = app
            .clone()
            .oneshot(form_post("/api/auth/login", "email=ada%40example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Missing email or password");
    }

    #[tokio::test]
    async fn session_cookie_authenticates_me() {
        let app = app();
        let token = session_token(&signup(&app, "ada@example.com").await);

        let response = app.clone().oneshot(get_with_session("/api/auth/me", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn me_without_valid_session_is_unauthorized() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["error"], "Not authenticated");

        let response = app.oneshot(get_with_session("/api/auth/me", "forged")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie(&response).contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn session_for_missing_user_is_rejected() {
        let (app, state) = app_with(Arc::new(MemoryUserStore::new()));
        let token = state
            .sessions
            .create_session_token(&SessionData {
                user_id: Uuid::new_v4().to_string(),
                email: "ghost@example.com".to_string(),
                name: "Ghost".to_string(),
                expires_at: crate::crypto::session_token::session_expiry(1),
            })
            .unwrap();

        let response = app.oneshot(get_with_session("/api/auth/me", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_reflects_store_not_token_copy() {
        let store = Arc::new(MemoryUserStore::new());
        let user = store
            .insert_user(NewUser {
                email: "ada@example.com".to_string(),
                password_hash: "unused".to_string(),
                name: "Ada Lovelace".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let (app, state) = app_with(store);

        let token = state
            .sessions
            .create_session_token(&SessionData {
                user_id: user.id.to_string(),
                email: "old@example.com".to_string(),
                name: "Old Name".to_string(),
                expires_at: crate::crypto::session_token::session_expiry(1),
            })
            .unwrap();

        let response = app.oneshot(get_with_session("/api/auth/me", &token)).await.unwrap();
        let body = json(response).await;
        assert_eq!(body["user"]["name"], "Ada Lovelace");
        assert_eq!(body["user"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_redirects() {
        let app = app();

        let response = app
            .oneshot(Request::builder().uri("/api/auth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn store_outage_is_a_server_error_not_a_logout() {
        let (app, state) = app_with(Arc::new(UnreachableStore));
        let token = state
            .sessions
            .create_session_token(&SessionData {
                user_id: Uuid::new_v4().to_string(),
                email: "ada@example.com".to_string(),
                name: "Ada".to_string(),
                expires_at: crate::crypto::session_token::session_expiry(1),
            })
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_with_session("/api/auth/me", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json(response).await, serde_json::json!({"error": "Internal server error"}));

        let response = app
            .clone()
            .oneshot(form_post("/api/auth/login", "email=ada%40example.com&password=secret123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Internal server error");

        let response = signup(&app, "ada@example.com").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Internal server error");

        let response = app
            .oneshot(get_with_session("/api/auth/logout", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }
}

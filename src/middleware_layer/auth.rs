use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::{Cookie, Cookies};
use tower_cookies::cookie::{SameSite, time::Duration};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::session::CurrentUser,
    services::auth as auth_service,
    state::AppState,
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

fn base_cookie(value: String, max_age_secs: i64, config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_secure(config.cookie_secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie
}

/// Builds the session cookie carrying `token`.
pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    base_cookie(token, config.session_max_age_secs(), config)
}

/// Builds a cookie that makes the browser drop the session.
pub fn removal_cookie(config: &Config) -> Cookie<'static> {
    base_cookie(String::new(), 0, config)
}

/// Extracts the session token from the request cookies.
fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves a session token to the user it belongs to.
///
/// Invalid, expired and orphaned tokens all resolve to `Ok(None)`. The user is
/// re-read from the store, so `email` and `name` reflect the current record
/// rather than the copies inside the token.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<Option<CurrentUser>> {
    let Some(session) = state.sessions.verify_session_token(token) else {
        return Ok(None);
    };

    let user = auth_service::find_user_by_id(state.users.as_ref(), &session.user_id).await?;
    if user.is_none() {
        tracing::debug!("Session references a missing user: {}", session.user_id);
    }

    Ok(user.map(CurrentUser::from))
}

/// A middleware that attaches the current user, if any, to the request.
///
/// Never rejects. A cookie that no longer resolves to a user is cleared.
pub async fn load_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(&cookies) {
        match resolve_session(&state, &token).await {
            Ok(Some(user)) => {
                tracing::debug!("✅ Session resolved for user: {}", user.id);
                request.extensions_mut().insert(user);
            }
            Ok(None) => {
                tracing::debug!("Discarding invalid session cookie");
                cookies.add(removal_cookie(&state.config));
            }
            Err(e) => {
                tracing::error!("❌ Session lookup failed: {}", e);
            }
        }
    }

    next.run(request).await
}

/// A middleware that requires a valid session to be present.
///
/// Expects [`load_session`] to run first; when it did not attach a user the
/// session is resolved again so store failures surface as errors.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    if request.extensions().get::<CurrentUser>().is_none() {
        let token = extract_session_token(&cookies).ok_or_else(|| {
            tracing::debug!("❌ No session cookie found");
            AppError::Unauthenticated
        })?;

        let user = resolve_session(&state, &token)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}

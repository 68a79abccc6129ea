//! End-to-end flow against a running server.
//!
//! Start the server with `COOKIE_SECURE=false` (the client talks plain HTTP)
//! and run with `cargo test -- --ignored`.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap(),
            base_url: std::env::var("AUTHGATE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
        }
    }

    fn get_timestamp() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn test_signup_login_me_logout() {
    let context = TestContext::new();
    let email = format!("user_{}@example.com", TestContext::get_timestamp());

    // Step 1: Signup
    let signup_response = context
        .client
        .post(format!("{}/api/auth/signup", context.base_url))
        .form(&[("email", email.as_str()), ("password", "SecurePass123"), ("name", "Test User")])
        .send()
        .await
        .unwrap();

    assert_eq!(signup_response.status().as_u16(), 201, "Signup failed");
    let signup_body: Value = signup_response.json().await.unwrap();
    assert_eq!(signup_body["message"], "Signup successful");
    assert!(signup_body["user"].get("password").is_none());

    // Step 2: Duplicate signup
    let duplicate_response = context
        .client
        .post(format!("{}/api/auth/signup", context.base_url))
        .form(&[("email", email.as_str()), ("password", "SecurePass123"), ("name", "Again")])
        .send()
        .await
        .unwrap();

    assert_eq!(duplicate_response.status().as_u16(), 409);

    // Step 3: Login
    let login_response = context
        .client
        .post(format!("{}/api/auth/login", context.base_url))
        .form(&[("email", email.as_str()), ("password", "SecurePass123")])
        .send()
        .await
        .unwrap();

    assert_eq!(login_response.status().as_u16(), 200, "Login failed");
    assert!(
        login_response.cookies().any(|c| c.name() == "session" && c.http_only()),
        "Session cookie not found in login response"
    );

    // Step 4: Current user
    let me_response = context
        .client
        .get(format!("{}/api/auth/me", context.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(me_response.status().as_u16(), 200);
    let me_body: Value = me_response.json().await.unwrap();
    assert_eq!(me_body["user"]["email"], email.as_str());

    // Step 5: Logout
    let logout_response = context
        .client
        .get(format!("{}/api/auth/logout", context.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(logout_response.status().as_u16(), 302);

    let after_logout = context
        .client
        .get(format!("{}/api/auth/me", context.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(after_logout.status().as_u16(), 401);
}

use crate::error::{AppError, Result};
use crate::models::user::{NewUser, User, UserResponse};
use crate::repositories::user::UserStore;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 2;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;

/// Same message for unknown email and wrong password.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Verified against when the email is unknown, so both failure paths cost one
/// Argon2 run. Parameters match [`hash_password`]; no password matches it.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$K0vV1ygnlVWpzE3kV9bg8A$oyO0mCwFExus/agITIkH5AiexlDKhLTIKyaRhgUS+74";

/// Hashes a password using Argon2id.
///
/// The salt and parameters are embedded in the returned PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a stored hash.
///
/// Fails closed: an unparsable hash or any verifier error is `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!("Stored password hash could not be parsed: {}", e);
            return false;
        }
    };

    let mut password_bytes = password.as_bytes().to_vec();
    let result = Argon2::default()
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    result
}

/// Drops the password hash from a user record.
pub fn sanitize_user(user: &User) -> UserResponse {
    UserResponse::from(user)
}

/// Creates a new user.
///
/// # Errors
///
/// [`AppError::UserAlreadyExists`] when the email is taken, whether caught by
/// the lookup here or by the store's own uniqueness check.
pub async fn create_user(
    store: &dyn UserStore,
    email: &str,
    password: &str,
    name: &str,
) -> Result<UserResponse> {
    tracing::debug!("🔐 Creating user: {}", email);

    if store.find_by_email(email).await?.is_some() {
        return Err(AppError::UserAlreadyExists);
    }

    let password_hash = hash_password(password)?;

    let user = store
        .insert_user(NewUser {
            email: email.to_string(),
            password_hash,
            name: name.to_string(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!("✅ User created with ID: {}", user.id);
    Ok(sanitize_user(&user))
}

/// Finds a user by email, including the password hash.
///
/// `Ok(None)` means no such user; store failures are returned as errors.
pub async fn find_user_by_email(store: &dyn UserStore, email: &str) -> Result<Option<User>> {
    store.find_by_email(email).await
}

/// Finds a user by ID and returns the sanitized view.
///
/// An ID that is not a valid identifier is reported as not found.
pub async fn find_user_by_id(store: &dyn UserStore, id: &str) -> Result<Option<UserResponse>> {
    let Ok(id) = Uuid::parse_str(id) else {
        tracing::debug!("Malformed user id: {}", id);
        return Ok(None);
    };

    Ok(store.find_by_id(&id).await?.as_ref().map(sanitize_user))
}

/// Authenticates a user by email and password.
pub async fn authenticate_user(store: &dyn UserStore, email: &str, password: &str) -> Result<User> {
    tracing::debug!("🔐 Authenticating user: {}", email);

    let Some(user) = find_user_by_email(store, email).await? else {
        verify_password(password, DUMMY_PASSWORD_HASH);
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(password, &user.password) {
        return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
    }

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(user)
}

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};
use crate::models::session::SessionData;

type HmacSha256 = Hmac<Sha256>;

/// Milliseconds in one day.
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Standard alphabet, tolerant of stripped `=` padding.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The signed envelope. `payload` is kept as the exact string that was signed.
#[derive(Serialize, Deserialize)]
struct TokenEnvelope {
    payload: String,
    signature: String,
}

/// Signs and verifies stateless session tokens.
///
/// Wire format: `base64(json({payload: json(SessionData), signature: hex(hmac_sha256(payload))}))`.
#[derive(Clone)]
pub struct SessionCodec {
    key: Arc<Zeroizing<Vec<u8>>>,
}

impl SessionCodec {
    /// Creates a codec signing with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: Arc::new(Zeroizing::new(secret.to_vec())),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Encryption(format!("HMAC key setup failed: {}", e)))
    }

    /// Creates a signed token for `data`.
    pub fn create_session_token(&self, data: &SessionData) -> Result<String> {
        let payload = sonic_rs::to_string(data)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let envelope = sonic_rs::to_string(&TokenEnvelope { payload, signature })
            .map_err(|e| AppError::Internal(format!("Token serialization failed: {}", e)))?;

        Ok(general_purpose::STANDARD.encode(envelope))
    }

    /// Verifies `token` against the current time.
    ///
    /// Returns `None` for every kind of failure: bad encoding, bad signature,
    /// unparsable payload, expiry.
    pub fn verify_session_token(&self, token: &str) -> Option<SessionData> {
        self.verify_session_token_at(token, Utc::now().timestamp_millis())
    }

    /// Verifies `token` as if the current time were `now_ms`.
    pub fn verify_session_token_at(&self, token: &str, now_ms: i64) -> Option<SessionData> {
        let raw = match LENIENT_STANDARD.decode(token.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Session token is not valid base64: {}", e);
                return None;
            }
        };

        let envelope: TokenEnvelope = match sonic_rs::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("Session envelope is not valid JSON: {}", e);
                return None;
            }
        };

        let Ok(signature) = hex::decode(&envelope.signature) else {
            tracing::debug!("Session signature is not valid hex");
            return None;
        };

        let mut mac = self.mac().ok()?;
        mac.update(envelope.payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        if !bool::from(expected.as_slice().ct_eq(&signature)) {
            tracing::debug!("Session signature mismatch");
            return None;
        }

        let session: SessionData = match sonic_rs::from_str(&envelope.payload) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("Signed session payload did not parse: {}", e);
                return None;
            }
        };

        if now_ms > session.expires_at {
            tracing::debug!("Session expired for user: {}", session.user_id);
            return None;
        }

        Some(session)
    }
}

/// Expiry timestamp `days_from_now` days ahead, in epoch milliseconds.
pub fn session_expiry(days_from_now: i64) -> i64 {
    Utc::now().timestamp_millis() + days_from_now * DAY_MS
}

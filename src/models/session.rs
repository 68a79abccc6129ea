use serde::{Deserialize, Serialize};

use crate::models::user::UserResponse;

/// The claims carried inside a session token.
///
/// `email` and `name` are copies taken at login time; request handling uses
/// [`CurrentUser`], which is re-read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// The ID of the user this session belongs to.
    pub user_id: String,
    pub email: String,
    pub name: String,
    /// Expiry as milliseconds since the Unix epoch.
    pub expires_at: i64,
}

/// The authenticated user attached to a request by the session middleware.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<UserResponse> for CurrentUser {
    fn from(user: UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

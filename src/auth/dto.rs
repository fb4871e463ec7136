use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::Role;

/// Request body for login. The remember-me checkbox arrives as a string;
/// only the literal "true" turns it on.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Option<String>,
    #[serde(default)]
    pub remember_me: Option<String>,
}

/// Query string Google sends back to the callback endpoint.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The session view the application authorizes against, copied straight
/// from the token.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub role: Role,
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires_at: OffsetDateTime,
}

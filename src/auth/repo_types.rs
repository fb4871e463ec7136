use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// How the account was created. Never changes afterwards; no code path
/// updates this column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auth_method")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    #[sqlx(rename = "CREDENTIALS")]
    Credentials,
    #[sqlx(rename = "GOOGLE")]
    Google,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[sqlx(rename = "ADMIN")]
    Admin,
    #[sqlx(rename = "USER")]
    User,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Argon2 hash; NULL for federated accounts
    pub auth_method: AuthMethod,
    pub role: Role,
    pub is_email_verified: bool,
    pub is_blocked: bool,
    pub avatar: String,
    pub plan_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Subscription plan, loaded with the user for reward emission only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
}

/// One block entry per administrative block action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlockRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub blocked_at: OffsetDateTime,
}

/// User together with its eagerly loaded plan and block records.
#[derive(Debug, Clone)]
pub struct UserDetails {
    pub user: User,
    pub plan: Option<Plan>,
    pub blocks: Vec<BlockRecord>,
}

impl UserDetails {
    /// Most recent block entry, surfaced in the blocked-account message.
    pub fn latest_block(&self) -> Option<&BlockRecord> {
        self.blocks.iter().max_by_key(|b| b.blocked_at)
    }
}

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::auth::repo_types::{BlockRecord, Plan, Role, User, UserDetails};

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, auth_method, role,
                   is_email_verified, is_blocked, avatar, plan_id, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Find a user by email together with its plan and block records.
    pub async fn find_details_by_email(
        db: &PgPool,
        email: &str,
    ) -> Result<Option<UserDetails>, sqlx::Error> {
        let Some(user) = Self::find_by_email(db, email).await? else {
            return Ok(None);
        };

        let plan = match user.plan_id {
            Some(plan_id) => {
                sqlx::query_as::<_, Plan>(r#"SELECT id, name FROM plans WHERE id = $1"#)
                    .bind(plan_id)
                    .fetch_optional(db)
                    .await?
            }
            None => None,
        };

        let blocks = sqlx::query_as::<_, BlockRecord>(
            r#"
            SELECT id, user_id, reason, blocked_at
            FROM user_blocks
            WHERE user_id = $1
            ORDER BY blocked_at DESC
            "#,
        )
        .bind(user.id)
        .fetch_all(db)
        .await?;

        Ok(Some(UserDetails { user, plan, blocks }))
    }

    /// Create an account for a federated identity. The provider vouches for
    /// the address, so the account starts out verified.
    pub async fn create_federated(
        db: &PgPool,
        email: &str,
        name: &str,
        avatar: &str,
        role: Role,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, auth_method, role, is_email_verified, avatar)
            VALUES ($1, $2, 'GOOGLE', $3, TRUE, $4)
            RETURNING id, email, name, password_hash, auth_method, role,
                      is_email_verified, is_blocked, avatar, plan_id, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(role)
        .bind(avatar)
        .fetch_one(db)
        .await
    }

    /// Refresh name and avatar from the latest federated profile. Auth method
    /// and role are left untouched.
    pub async fn update_profile(
        db: &PgPool,
        email: &str,
        name: &str,
        avatar: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, avatar = $3
            WHERE email = $1
            RETURNING id, email, name, password_hash, auth_method, role,
                      is_email_verified, is_blocked, avatar, plan_id, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(avatar)
        .fetch_one(db)
        .await
    }
}

/// CSRF state token for the federated round-trip. Single use, short lived.
pub struct OauthState;

impl OauthState {
    const TTL_MINUTES: i64 = 10;

    /// Persist a fresh random state token and return it.
    pub async fn create(db: &PgPool) -> Result<String, sqlx::Error> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(Self::TTL_MINUTES);

        sqlx::query(r#"INSERT INTO oauth_states (token, expires_at) VALUES ($1, $2)"#)
            .bind(&token)
            .bind(expires_at)
            .execute(db)
            .await?;

        Ok(token)
    }

    /// Delete the token and report whether it existed and had not expired.
    pub async fn consume(db: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let expires_at: Option<(OffsetDateTime,)> =
            sqlx::query_as(r#"DELETE FROM oauth_states WHERE token = $1 RETURNING expires_at"#)
                .bind(token)
                .fetch_optional(db)
                .await?;

        Ok(matches!(expires_at, Some((exp,)) if exp > OffsetDateTime::now_utc()))
    }
}

/// Postgres unique-violation, used to detect the concurrent-signup race.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

use axum::http::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while authenticating. Policy rejections are
/// ordinary variants; callers branch on them.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No user found")]
    NotFound,
    #[error("This account is registered using an external provider")]
    MethodMismatch,
    /// Message is pre-rendered with the latest block reason and timestamp
    /// when a block record exists.
    #[error("{0}")]
    AccountBlocked(String),
    #[error("Your email is not verified. Please verify your email before signing in.")]
    EmailUnverified,
    #[error("Password is required")]
    MissingCredential,
    #[error("Password is incorrect")]
    InvalidPassword,
    /// A concurrent federated signup won the unique-email race.
    #[error("an account for this email was created concurrently")]
    SignupConflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NotFound
            | AuthError::MethodMismatch
            | AuthError::EmailUnverified
            | AuthError::MissingCredential
            | AuthError::InvalidPassword => StatusCode::UNAUTHORIZED,
            AuthError::AccountBlocked(_) => StatusCode::FORBIDDEN,
            AuthError::SignupConflict => StatusCode::CONFLICT,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the end user gets to see. Unknown-account and wrong-password are
    /// indistinguishable here; infrastructure failures stay generic and the
    /// details go to the server log only.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::NotFound | AuthError::InvalidPassword => "Invalid email or password".into(),
            AuthError::SignupConflict | AuthError::Database(_) | AuthError::Internal(_) => {
                "Something went wrong. Please try again.".into()
            }
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for (StatusCode, String) {
    fn from(e: AuthError) -> Self {
        (e.status(), e.public_message())
    }
}

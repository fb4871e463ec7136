use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CallbackQuery, LoginRequest, PublicUser, SessionResponse, SessionUser},
        error::AuthError,
        provider,
        repo::OauthState,
        service::{authorize_credentials, is_valid_email, link_federated_identity, LinkOutcome},
        token::{AuthUser, SessionKeys},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/session", get(session))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match authorize_credentials(&state, &payload).await {
        Ok(u) => u,
        Err(e) => {
            match &e {
                AuthError::Database(err) => error!(error = %err, "login lookup failed"),
                AuthError::Internal(err) => error!(error = %err, "login failed"),
                _ => warn!(email = %payload.email, reason = %e, "login rejected"),
            }
            return Err(e.into());
        }
    };

    let keys = SessionKeys::from_ref(&state);
    let token = match keys.sign(&user) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "session sign failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    Ok(Json(AuthResponse {
        token,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        },
    }))
}

/// Start a Google login: persist a state token and send the browser to the
/// provider's consent screen.
#[instrument(skip(state))]
pub async fn google_login(
    State(state): State<AppState>,
) -> Result<Redirect, (StatusCode, String)> {
    let token = OauthState::create(&state.db).await.map_err(internal)?;
    let url = provider::authorize_url(&state.config.google, &token);
    Ok(Redirect::temporary(&url))
}

/// Provider callback: validate state, resolve the code into an identity and
/// reconcile it with storage. A password-owned email redirects back to the
/// sign-in page; real failures deny the login.
#[instrument(skip(state, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match OauthState::consume(&state.db, &query.state).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("unknown or expired oauth state");
            return (StatusCode::UNAUTHORIZED, "Invalid state".to_string()).into_response();
        }
        Err(e) => {
            error!(error = %e, "oauth state lookup failed");
            return internal(e).into_response();
        }
    }

    let identity = match state.provider.resolve_code(&query.code).await {
        Ok(i) => i,
        Err(e) => {
            error!(error = %e, "authorization code exchange failed");
            return (StatusCode::UNAUTHORIZED, "Sign-in failed".to_string()).into_response();
        }
    };

    match link_federated_identity(&state, &identity).await {
        Ok(LinkOutcome::SignedIn(user)) => {
            let keys = SessionKeys::from_ref(&state);
            match keys.sign(&user) {
                Ok(token) => Json(AuthResponse {
                    token,
                    user: PublicUser {
                        id: user.id,
                        name: user.name,
                        email: user.email,
                        role: user.role,
                    },
                })
                .into_response(),
                Err(e) => {
                    error!(error = %e, "session sign failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
                }
            }
        }
        Ok(LinkOutcome::AccountExistsWithCredentials) => {
            let target = format!(
                "{}?error=account-exists-with-credentials",
                state.config.signin_page
            );
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            error!(error = %e, email = %identity.email, "federated reconciliation failed");
            (e.status(), e.public_message()).into_response()
        }
    }
}

/// Session view for the application: claims copied off the token, no
/// storage read.
#[instrument(skip(claims))]
pub async fn session(
    AuthUser(claims): AuthUser,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SessionResponse {
        user: SessionUser {
            id: claims.sub,
            role: claims.role,
            remember_me: claims.remember_me,
        },
        expires_at,
    }))
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

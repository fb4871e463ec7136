use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::dto::LoginRequest;
use crate::auth::error::AuthError;
use crate::auth::password::verify_password;
use crate::auth::provider::FederatedIdentity;
use crate::auth::repo::is_unique_violation;
use crate::auth::repo_types::{AuthMethod, Role, User, UserDetails};
use crate::rewards::{ActivityKind, RewardEvent};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Identity handed to the token layer after a successful login.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub remember_me: bool,
}

/// The login form sends the checkbox value as a string.
pub fn remember_me_flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}

fn blocked_message(details: &UserDetails) -> String {
    match details.latest_block() {
        Some(block) => format!(
            "Your account is blocked. Reason: {}. Blocked on: {}.",
            block.reason, block.blocked_at
        ),
        None => "Your account is blocked.".into(),
    }
}

/// Ordered policy checks over an already loaded account. Each check
/// short-circuits: method, then blocked, then verified, then password
/// presence, then the hash comparison.
pub fn check_credentials(details: &UserDetails, password: Option<&str>) -> Result<(), AuthError> {
    if details.user.auth_method != AuthMethod::Credentials {
        return Err(AuthError::MethodMismatch);
    }
    if details.user.is_blocked {
        return Err(AuthError::AccountBlocked(blocked_message(details)));
    }
    if !details.user.is_email_verified {
        return Err(AuthError::EmailUnverified);
    }
    let password = match password {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AuthError::MissingCredential),
    };
    let Some(hash) = details.user.password_hash.as_deref() else {
        return Err(AuthError::MissingCredential);
    };
    if !verify_password(password, hash)? {
        return Err(AuthError::InvalidPassword);
    }
    Ok(())
}

/// Email/password login. On success emits the daily-login reward and
/// returns the identity the session token is minted from.
pub async fn authorize_credentials(
    state: &AppState,
    payload: &LoginRequest,
) -> Result<AuthenticatedUser, AuthError> {
    let details = User::find_details_by_email(&state.db, &payload.email)
        .await?
        .ok_or(AuthError::NotFound)?;

    check_credentials(&details, payload.password.as_deref())?;

    state.rewards.emit(RewardEvent {
        user_id: details.user.id,
        plan_id: details.user.plan_id,
        activity: ActivityKind::DailyLogin,
    });

    info!(user_id = %details.user.id, email = %details.user.email, "credentials login");
    Ok(AuthenticatedUser {
        id: details.user.id,
        name: details.user.name,
        email: details.user.email,
        role: details.user.role,
        remember_me: remember_me_flag(payload.remember_me.as_deref()),
    })
}

/// What the linker decided to do with a federated identity.
#[derive(Debug)]
pub enum LinkAction {
    /// The email belongs to a password account; federated login must not
    /// take it over.
    RejectCredentials,
    /// First time we see this email: provision an account.
    Create,
    /// Known federated account: refresh its profile.
    Refresh(User),
}

pub fn plan_link_action(existing: Option<User>) -> LinkAction {
    match existing {
        Some(user) if user.auth_method == AuthMethod::Credentials => LinkAction::RejectCredentials,
        Some(user) => LinkAction::Refresh(user),
        None => LinkAction::Create,
    }
}

pub fn federated_role(email: &str, admin_email: &str) -> Role {
    if email == admin_email {
        Role::Admin
    } else {
        Role::User
    }
}

pub enum LinkOutcome {
    SignedIn(AuthenticatedUser),
    /// Not a failure: the caller redirects to the sign-in page's error state.
    AccountExistsWithCredentials,
}

/// Reconcile a provider-verified identity with local storage.
pub async fn link_federated_identity(
    state: &AppState,
    identity: &FederatedIdentity,
) -> Result<LinkOutcome, AuthError> {
    let existing = User::find_by_email(&state.db, &identity.email).await?;
    let avatar = identity.avatar.as_deref().unwrap_or("");

    match plan_link_action(existing) {
        LinkAction::RejectCredentials => {
            warn!(email = %identity.email, "federated login hit a password account");
            Ok(LinkOutcome::AccountExistsWithCredentials)
        }
        LinkAction::Create => {
            let role = federated_role(&identity.email, &state.config.admin_email);
            let created =
                match User::create_federated(&state.db, &identity.email, &identity.name, avatar, role)
                    .await
                {
                    Ok(user) => user,
                    Err(e) if is_unique_violation(&e) => {
                        warn!(email = %identity.email, "lost the signup race on unique email");
                        return Err(AuthError::SignupConflict);
                    }
                    Err(e) => return Err(AuthError::Database(e)),
                };

            state.rewards.emit(RewardEvent {
                user_id: created.id,
                plan_id: created.plan_id,
                activity: ActivityKind::Signup,
            });

            info!(user_id = %created.id, email = %created.email, role = ?created.role, "federated signup");
            Ok(LinkOutcome::SignedIn(AuthenticatedUser {
                id: created.id,
                name: created.name,
                email: created.email,
                role: created.role,
                remember_me: false,
            }))
        }
        LinkAction::Refresh(user) => {
            let updated =
                User::update_profile(&state.db, &identity.email, &identity.name, avatar).await?;

            state.rewards.emit(RewardEvent {
                user_id: user.id,
                plan_id: user.plan_id,
                activity: ActivityKind::DailyLogin,
            });

            info!(user_id = %user.id, email = %user.email, "federated login");
            Ok(LinkOutcome::SignedIn(AuthenticatedUser {
                id: user.id,
                name: updated.name,
                email: user.email,
                role: user.role,
                remember_me: false,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::repo_types::BlockRecord;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn credentials_user(password: &str) -> UserDetails {
        UserDetails {
            user: User {
                id: Uuid::new_v4(),
                email: "user@example.com".into(),
                name: "Test User".into(),
                password_hash: Some(hash_password(password)),
                auth_method: AuthMethod::Credentials,
                role: Role::User,
                is_email_verified: true,
                is_blocked: false,
                avatar: String::new(),
                plan_id: None,
                created_at: OffsetDateTime::now_utc(),
            },
            plan: None,
            blocks: Vec::new(),
        }
    }

    fn block(user_id: Uuid, reason: &str, blocked_at: OffsetDateTime) -> BlockRecord {
        BlockRecord {
            id: Uuid::new_v4(),
            user_id,
            reason: reason.into(),
            blocked_at,
        }
    }

    #[test]
    fn happy_path_passes_all_checks() {
        let details = credentials_user("hunter22!");
        assert!(check_credentials(&details, Some("hunter22!")).is_ok());
    }

    #[test]
    fn federated_account_is_rejected_before_anything_else() {
        let mut details = credentials_user("hunter22!");
        details.user.auth_method = AuthMethod::Google;
        details.user.is_blocked = true; // would also fail, but method wins
        assert!(matches!(
            check_credentials(&details, Some("hunter22!")),
            Err(AuthError::MethodMismatch)
        ));
    }

    #[test]
    fn blocked_account_fails_even_with_the_right_password() {
        let mut details = credentials_user("hunter22!");
        details.user.is_blocked = true;
        assert!(matches!(
            check_credentials(&details, Some("hunter22!")),
            Err(AuthError::AccountBlocked(_))
        ));
    }

    #[test]
    fn blocked_message_carries_the_latest_reason_and_timestamp() {
        let mut details = credentials_user("hunter22!");
        details.user.is_blocked = true;
        let old = OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap();
        let new = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        details.blocks = vec![
            block(details.user.id, "old reason", old),
            block(details.user.id, "payment fraud", new),
        ];
        let Err(AuthError::AccountBlocked(msg)) = check_credentials(&details, Some("hunter22!"))
        else {
            panic!("expected AccountBlocked");
        };
        assert!(msg.contains("payment fraud"));
        assert!(msg.contains(&new.to_string()));
        assert!(!msg.contains("old reason"));
    }

    #[test]
    fn blocked_without_records_still_reads_sensibly() {
        let mut details = credentials_user("hunter22!");
        details.user.is_blocked = true;
        let Err(AuthError::AccountBlocked(msg)) = check_credentials(&details, Some("hunter22!"))
        else {
            panic!("expected AccountBlocked");
        };
        assert_eq!(msg, "Your account is blocked.");
    }

    #[test]
    fn unverified_email_never_reaches_the_password_check() {
        let mut details = credentials_user("hunter22!");
        details.user.is_email_verified = false;
        // wrong password on purpose: verification must fail first
        assert!(matches!(
            check_credentials(&details, Some("wrong")),
            Err(AuthError::EmailUnverified)
        ));
    }

    #[test]
    fn missing_password_is_its_own_failure() {
        let details = credentials_user("hunter22!");
        assert!(matches!(
            check_credentials(&details, None),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            check_credentials(&details, Some("")),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn account_without_a_hash_cannot_log_in() {
        let mut details = credentials_user("hunter22!");
        details.user.password_hash = None;
        assert!(matches!(
            check_credentials(&details, Some("hunter22!")),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let details = credentials_user("hunter22!");
        assert!(matches!(
            check_credentials(&details, Some("not-it")),
            Err(AuthError::InvalidPassword)
        ));
    }

    #[test]
    fn remember_me_only_on_the_literal_true() {
        assert!(remember_me_flag(Some("true")));
        assert!(!remember_me_flag(Some("false")));
        assert!(!remember_me_flag(Some("TRUE")));
        assert!(!remember_me_flag(Some("on")));
        assert!(!remember_me_flag(None));
    }

    #[test]
    fn linker_rejects_password_accounts() {
        let details = credentials_user("hunter22!");
        assert!(matches!(
            plan_link_action(Some(details.user)),
            LinkAction::RejectCredentials
        ));
    }

    #[test]
    fn linker_refreshes_known_federated_accounts() {
        let mut details = credentials_user("irrelevant");
        details.user.auth_method = AuthMethod::Google;
        let id = details.user.id;
        match plan_link_action(Some(details.user)) {
            LinkAction::Refresh(user) => assert_eq!(user.id, id),
            other => panic!("expected Refresh, got {other:?}"),
        }
    }

    #[test]
    fn linker_creates_unknown_accounts() {
        assert!(matches!(plan_link_action(None), LinkAction::Create));
    }

    #[test]
    fn admin_email_gets_the_admin_role() {
        assert_eq!(
            federated_role("admin@example.com", "admin@example.com"),
            Role::Admin
        );
        assert_eq!(
            federated_role("user@example.com", "admin@example.com"),
            Role::User
        );
    }

    #[test]
    fn email_validation_matches_plausible_addresses() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@c.de"));
    }
}

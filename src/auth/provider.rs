use axum::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// What a federated provider asserts about the person signing in.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// Turns the callback authorization code into a verified identity. The
/// linking policy never talks to the network directly; the protocol
/// exchange lives behind this seam.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_code(&self, code: &str) -> anyhow::Result<FederatedIdentity>;
}

/// Build the URL the browser is sent to when starting a Google login.
pub fn authorize_url(config: &GoogleConfig, state: &str) -> String {
    let mut url = Url::parse(AUTHORIZE_URL).expect("static authorize url");
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", state);
    url.into()
}

pub struct GoogleProvider {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    async fn resolve_code(&self, code: &str) -> anyhow::Result<FederatedIdentity> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let info: UserInfo = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(email = %info.email, "resolved federated identity");
        Ok(FederatedIdentity {
            name: info.name.unwrap_or_else(|| info.email.clone()),
            email: info.email,
            avatar: info.picture,
        })
    }
}

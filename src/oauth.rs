use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::ProviderCredentials;
use crate::error::Error;

/// Sent on every provider API call; GitHub rejects requests without one.
const API_USER_AGENT: &str = concat!("newsdesk-auth/", env!("CARGO_PKG_VERSION"));

/// The OAuth2 providers the login page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProviderKind {
    Google,
    GitHub,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }

    #[must_use]
    pub fn authorize_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::GitHub => "https://github.com/login/oauth/authorize",
        }
    }

    #[must_use]
    pub fn token_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::GitHub => "https://github.com/login/oauth/access_token",
        }
    }

    #[must_use]
    pub fn profile_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            Self::GitHub => "https://api.github.com/user",
        }
    }

    #[must_use]
    pub fn default_scopes(self) -> &'static [&'static str] {
        match self {
            Self::Google => &["openid", "email", "profile"],
            Self::GitHub => &["read:user", "user:email"],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            other => Err(Error::OAuth {
                operation: "provider lookup",
                status: None,
                detail: format!("unknown provider '{other}'"),
            }),
        }
    }
}

/// OAuth2 client for a single provider.
pub struct ProviderClient {
    kind: ProviderKind,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    http: reqwest::Client,
}

/// Authorization URL with the transient values to stash in cookies
/// until the provider calls back.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl ProviderClient {
    /// Create a client for one provider.
    ///
    /// `redirect_uri` is this application's callback route for the
    /// provider, e.g. `https://app.test/api/auth/callback/github`.
    #[must_use]
    pub fn new(credentials: &ProviderCredentials, redirect_uri: Url) -> Self {
        Self {
            kind: credentials.kind,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri,
            scopes: credentials
                .kind
                .default_scopes()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Build the authorization redirect with fresh state and PKCE
    /// parameters.
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = random_urlsafe::<16>();
        let code_verifier = random_urlsafe::<48>();
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
        let scope = self.scopes.join(" ");

        let mut url: Url = self
            .kind
            .authorize_endpoint()
            .parse()
            .expect("provider endpoint constants are valid URLs");
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("scope", &scope);

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::OAuth`]
    /// if the token endpoint answers with an error.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.kind.token_endpoint())
            // GitHub answers form-encoded unless asked for JSON.
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Fetch the provider-shaped profile payload for an access token.
    ///
    /// The payload is returned raw; field mapping happens in the
    /// identity normalizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::OAuth`]
    /// if the profile endpoint answers with an error.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<JsonValue, Error> {
        let response = self
            .http
            .get(self.kind.profile_endpoint())
            .header(reqwest::header::USER_AGENT, API_USER_AGENT)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "profile request").await?;
        response.json::<JsonValue>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or
    /// an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

/// N random bytes, base64url without padding.
fn random_urlsafe<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;

    fn test_client(kind: ProviderKind) -> ProviderClient {
        ProviderClient::new(
            &ProviderCredentials::new(kind, "test-client", "test-secret"),
            "https://app.test/api/auth/callback/github".parse().unwrap(),
        )
    }

    #[test]
    fn authorization_url_carries_state_and_pkce() {
        let client = test_client(ProviderKind::GitHub);
        let req = client.authorization_url();

        assert!(req.url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(req.url.contains("response_type=code"));
        assert!(req.url.contains("client_id=test-client"));
        assert!(req.url.contains("code_challenge="));
        assert!(req.url.contains("code_challenge_method=S256"));
        assert!(req.url.contains("state="));
        assert!(!req.state.is_empty());
        assert!(!req.code_verifier.is_empty());
    }

    #[test]
    fn authorization_values_are_unique_per_call() {
        let client = test_client(ProviderKind::Google);
        let first = client.authorization_url();
        let second = client.authorization_url();

        assert_ne!(first.state, second.state);
        assert_ne!(first.code_verifier, second.code_verifier);
    }

    #[test]
    fn code_verifier_is_urlsafe_and_long_enough() {
        let client = test_client(ProviderKind::Google);
        let req = client.authorization_url();

        // RFC 7636 wants 43..=128 chars.
        assert_eq!(req.code_verifier.len(), 64);
        assert!(
            req.code_verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn provider_round_trips_through_str() {
        for kind in [ProviderKind::Google, ProviderKind::GitHub] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("gitlab".parse::<ProviderKind>().is_err());
    }
}

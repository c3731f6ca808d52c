use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::config::AuthConfig;
use crate::error::Error;
use crate::identity::{CanonicalIdentity, OAuthUserProfile, UserId};

/// One-shot request timeout for every directory call. A hung directory
/// resolves to a typed failure instead of blocking the login.
const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// The user-directory operations the identity core depends on.
///
/// The HTTP implementation is [`DirectoryClient`]; tests substitute an
/// in-memory directory. Both operations are one-shot, awaited and
/// non-retrying.
pub trait Directory: Send + Sync + 'static {
    /// Verify a password login.
    ///
    /// Succeeds with the directory's canonical identity for the user;
    /// a wrong password, unknown email, or unparsable success body all
    /// fail with [`Error::InvalidCredentials`].
    fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<CanonicalIdentity, Error>> + Send;

    /// Resolve an OAuth profile to a canonical identity, creating a
    /// directory record on first sight of the email.
    ///
    /// Idempotent: repeated calls with the same email return the same
    /// id. Fails with [`Error::DirectoryUnavailable`].
    fn upsert_oauth_identity(
        &self,
        profile: &OAuthUserProfile,
    ) -> impl Future<Output = Result<CanonicalIdentity, Error>> + Send;

    /// Register a new credentials user.
    ///
    /// Collaborator operation: signup shares the directory but takes no
    /// part in the login flow.
    ///
    /// Fails with [`Error::SignupRejected`] if the directory refuses
    /// (duplicate email), [`Error::DirectoryUnavailable`] on transport
    /// failure.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<CanonicalIdentity, Error>> + Send;
}

/// HTTP client for the backend user-directory service.
pub struct DirectoryClient {
    base_url: Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SigninRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Directory user record, parsed defensively: the directory's ids are
/// database integers on the wire, but the rest of the core treats ids
/// as opaque strings.
#[derive(Deserialize)]
struct DirectoryUser {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl From<DirectoryUser> for CanonicalIdentity {
    fn from(user: DirectoryUser) -> Self {
        Self {
            id: UserId(user.id),
            email: user.email,
            name: user.name,
            image: user.image,
        }
    }
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "user id must be a string or number, got {other}"
        ))),
    }
}

impl DirectoryClient {
    /// Create a client for the configured directory service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &AuthConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(DIRECTORY_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: config.backend_url().clone(),
            http,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("directory endpoint {path}: {e}")))
    }
}

impl Directory for DirectoryClient {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CanonicalIdentity, Error> {
        let url = self.endpoint("/api/auth/signin")?;
        let response = self
            .http
            .post(url)
            .json(&SigninRequest { email, password })
            .send()
            .await
            .map_err(|e| Error::DirectoryUnavailable(e.to_string()))?;

        // Read the body exactly once as raw text; anything the
        // directory sends that is not a clean user record counts as a
        // failed verification, never a crash.
        let status = response.status();
        let body = response.text().await.map_err(|_| Error::InvalidCredentials)?;

        if !status.is_success() {
            tracing::debug!(%status, "credential verification rejected");
            return Err(Error::InvalidCredentials);
        }

        let user: DirectoryUser =
            serde_json::from_str(&body).map_err(|_| Error::InvalidCredentials)?;
        Ok(user.into())
    }

    async fn upsert_oauth_identity(
        &self,
        profile: &OAuthUserProfile,
    ) -> Result<CanonicalIdentity, Error> {
        let url = self.endpoint("/api/auth/oauth-signin")?;
        let response = self
            .http
            .post(url)
            .json(profile)
            .send()
            .await
            .map_err(|e| Error::DirectoryUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::DirectoryUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::DirectoryUnavailable(format!(
                "oauth upsert answered {status}"
            )));
        }

        let user: DirectoryUser = serde_json::from_str(&body)
            .map_err(|e| Error::DirectoryUnavailable(format!("unparsable upsert body: {e}")))?;
        Ok(user.into())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<CanonicalIdentity, Error> {
        let url = self.endpoint("/api/auth/signup")?;
        let response = self
            .http
            .post(url)
            .json(&SigninRequest { email, password })
            .send()
            .await
            .map_err(|e| Error::DirectoryUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::DirectoryUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::SignupRejected(format!(
                "directory answered {status}: {body}"
            )));
        }

        let user: DirectoryUser = serde_json::from_str(&body)
            .map_err(|e| Error::DirectoryUnavailable(format!("unparsable signup body: {e}")))?;
        Ok(user.into())
    }
}

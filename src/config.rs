use url::Url;

use crate::error::Error;
use crate::oauth::ProviderKind;
use crate::token::{SessionKey, parse_session_key_hex};

/// Default session lifetime: 30 days, in seconds.
pub const DEFAULT_SESSION_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// What `issue` does when the directory cannot be reached during
/// OAuth reconciliation.
///
/// The default mirrors the long-observed behavior: the login completes
/// at the transport level but the session carries no identity, so the
/// UI sees "not signed in". `FailLogin` makes the outage a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum OutagePolicy {
    #[default]
    DegradeAnonymous,
    FailLogin,
}

/// OAuth2 client credentials for one provider.
#[derive(Clone)]
#[non_exhaustive]
pub struct ProviderCredentials {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
}

impl ProviderCredentials {
    #[must_use]
    pub fn new(
        kind: ProviderKind,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Process-wide authentication configuration.
///
/// Constructed once at startup and passed by reference into the
/// directory client, the provider adapters, and the token manager —
/// business logic never reads the environment itself.
///
/// Required fields are constructor parameters — no runtime
/// "missing field" errors. Use [`from_env()`](AuthConfig::from_env)
/// for convention-based setup, or [`new()`](AuthConfig::new) with
/// `with_*` methods for full control.
#[derive(Clone)]
pub struct AuthConfig {
    backend_url: Url,
    app_base_url: Url,
    session_key: SessionKey,
    session_max_age: u64,
    outage_policy: OutagePolicy,
    debug: bool,
    providers: Vec<ProviderCredentials>,
}

impl AuthConfig {
    /// Create a configuration from the three required values.
    #[must_use]
    pub fn new(backend_url: Url, app_base_url: Url, session_key: SessionKey) -> Self {
        Self {
            backend_url,
            app_base_url,
            session_key,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            outage_policy: OutagePolicy::default(),
            debug: false,
            providers: Vec::new(),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `BACKEND_URL`: base URL of the user directory service
    /// - `APP_BASE_URL`: trusted base URL for post-login redirects
    /// - `SESSION_SECRET`: hex-encoded 32-byte session sealing key
    ///
    /// # Optional env vars
    /// - `SESSION_MAX_AGE`: session lifetime in seconds (default 30 days)
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    /// - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET`
    /// - `AUTH_OUTAGE_POLICY`: `degrade` (default) or `fail`
    /// - `AUTH_DEBUG`: set to `"1"` or `"true"` for verbose auth logging
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, Error> {
        let backend_url = require_url("BACKEND_URL")?;
        let app_base_url = require_url("APP_BASE_URL")?;
        let secret = std::env::var("SESSION_SECRET")
            .map_err(|_| Error::Config("SESSION_SECRET is required".into()))?;
        let session_key = parse_session_key_hex(&secret)?;

        let mut config = Self::new(backend_url, app_base_url, session_key);

        if let Ok(raw) = std::env::var("SESSION_MAX_AGE") {
            let secs: u64 = raw
                .parse()
                .map_err(|e| Error::Config(format!("SESSION_MAX_AGE: {e}")))?;
            config = config.with_session_max_age(secs);
        }

        if let Ok(raw) = std::env::var("AUTH_OUTAGE_POLICY") {
            config = config.with_outage_policy(match raw.as_str() {
                "degrade" => OutagePolicy::DegradeAnonymous,
                "fail" => OutagePolicy::FailLogin,
                other => {
                    return Err(Error::Config(format!(
                        "AUTH_OUTAGE_POLICY: expected 'degrade' or 'fail', got '{other}'"
                    )));
                }
            });
        }

        let debug = matches!(std::env::var("AUTH_DEBUG").as_deref(), Ok("1") | Ok("true"));
        config = config.with_debug(debug);

        for kind in [ProviderKind::Google, ProviderKind::GitHub] {
            if let Some(credentials) = provider_from_env(kind)? {
                config = config.with_provider(credentials);
            }
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_session_max_age(mut self, seconds: u64) -> Self {
        self.session_max_age = seconds;
        self
    }

    #[must_use]
    pub fn with_outage_policy(mut self, policy: OutagePolicy) -> Self {
        self.outage_policy = policy;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Register an OAuth provider.
    #[must_use]
    pub fn with_provider(mut self, credentials: ProviderCredentials) -> Self {
        self.providers.push(credentials);
        self
    }

    /// Base URL of the directory service.
    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Trusted base URL for redirect validation.
    #[must_use]
    pub fn app_base_url(&self) -> &Url {
        &self.app_base_url
    }

    /// Session sealing key.
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Session lifetime in seconds.
    #[must_use]
    pub fn session_max_age(&self) -> u64 {
        self.session_max_age
    }

    #[must_use]
    pub fn outage_policy(&self) -> OutagePolicy {
        self.outage_policy
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Registered OAuth providers.
    #[must_use]
    pub fn providers(&self) -> &[ProviderCredentials] {
        &self.providers
    }
}

fn require_url(var: &str) -> Result<Url, Error> {
    let raw = std::env::var(var).map_err(|_| Error::Config(format!("{var} is required")))?;
    raw.parse()
        .map_err(|e| Error::Config(format!("{var}: {e}")))
}

fn provider_from_env(kind: ProviderKind) -> Result<Option<ProviderCredentials>, Error> {
    let prefix = match kind {
        ProviderKind::Google => "GOOGLE",
        ProviderKind::GitHub => "GITHUB",
    };
    let id = std::env::var(format!("{prefix}_CLIENT_ID")).ok();
    let secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok();
    match (id, secret) {
        (Some(id), Some(secret)) => Ok(Some(ProviderCredentials::new(kind, id, secret))),
        (None, None) => Ok(None),
        // One half set is a deployment mistake worth failing loudly on.
        _ => Err(Error::Config(format!(
            "{prefix}_CLIENT_ID and {prefix}_CLIENT_SECRET must be set together"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_session_key_hex;

    fn test_key() -> SessionKey {
        parse_session_key_hex(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn defaults() {
        let config = AuthConfig::new(
            "http://directory.local".parse().unwrap(),
            "https://app.test".parse().unwrap(),
            test_key(),
        );
        assert_eq!(config.session_max_age(), DEFAULT_SESSION_MAX_AGE);
        assert_eq!(config.outage_policy(), OutagePolicy::DegradeAnonymous);
        assert!(!config.debug());
        assert!(config.providers().is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::new(
            "http://directory.local".parse().unwrap(),
            "https://app.test".parse().unwrap(),
            test_key(),
        )
        .with_session_max_age(3600)
        .with_outage_policy(OutagePolicy::FailLogin)
        .with_provider(ProviderCredentials::new(
            ProviderKind::GitHub,
            "id",
            "secret",
        ));

        assert_eq!(config.session_max_age(), 3600);
        assert_eq!(config.outage_policy(), OutagePolicy::FailLogin);
        assert_eq!(config.providers().len(), 1);
    }
}

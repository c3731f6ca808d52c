use core::time::Duration;

use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::{AuthConfig, OutagePolicy};
use crate::directory::Directory;
use crate::error::Error;
use crate::identity::{AuthEvent, CanonicalIdentity, UserId, normalize};

/// Process-wide symmetric key (32 bytes) for sealing session tokens.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; 32],
}

impl SessionKey {
    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

/// Parses a hex-encoded 32-byte session key into a `SessionKey`.
///
/// # Errors
///
/// Returns `Error::Config` if the hex is invalid or the key length is
/// not 32 bytes.
pub fn parse_session_key_hex(session_key_hex: &str) -> Result<SessionKey, Error> {
    let bytes =
        hex::decode(session_key_hex).map_err(|e| Error::Config(format!("invalid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(Error::Config(format!(
            "invalid key length: expected 32, got {}",
            bytes.len()
        )));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(SessionKey { bytes: arr })
}

/// Verified claims read back out of a session token.
///
/// `user_id` of `None` is an anonymous principal: the token is intact
/// and unexpired, but it grants no identity-scoped behavior.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionClaims {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub expires_at: OffsetDateTime,
}

/// Owns the signed-token lifecycle: creation at login, propagation on
/// renewal, expiry enforcement.
///
/// Identity travels only inside the sealed token — the manager keeps no
/// per-user state between requests.
#[derive(Clone)]
pub struct SessionTokenManager {
    key: SessionKey,
    max_age: Duration,
    outage_policy: OutagePolicy,
    debug: bool,
}

impl SessionTokenManager {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: config.session_key().clone(),
            max_age: Duration::from_secs(config.session_max_age()),
            outage_policy: config.outage_policy(),
            debug: config.debug(),
        }
    }

    /// Turn a login event into a sealed session token. Called exactly
    /// once per successful login; the identity is fully resolved before
    /// anything is sealed.
    ///
    /// A directory outage during OAuth reconciliation is handled per
    /// the configured [`OutagePolicy`]: degrade to an anonymous token
    /// (logged, login still succeeds at the transport level) or fail
    /// the login outright.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] and [`Error::MalformedIdentity`]
    /// always propagate — a bad credentials login must fail visibly.
    /// [`Error::DirectoryUnavailable`] propagates only under
    /// [`OutagePolicy::FailLogin`].
    pub async fn issue<D: Directory>(
        &self,
        event: AuthEvent,
        directory: &D,
    ) -> Result<String, Error> {
        match normalize(event, directory).await {
            Ok(identity) => {
                if self.debug {
                    tracing::debug!(
                        user_id = %identity.id,
                        email = ?identity.email,
                        "identity reconciled"
                    );
                }
                tracing::info!(user_id = %identity.id, "session issued");
                self.seal(Some(&identity))
            }
            Err(Error::DirectoryUnavailable(detail)) => match self.outage_policy {
                OutagePolicy::DegradeAnonymous => {
                    tracing::warn!(
                        error = %detail,
                        "directory unreachable during reconciliation, issuing anonymous session"
                    );
                    self.seal(None)
                }
                _ => Err(Error::DirectoryUnavailable(detail)),
            },
            Err(e) => Err(e),
        }
    }

    /// Re-seal an existing token with a fresh expiry window.
    ///
    /// Pure propagation: the established identity is carried forward
    /// unchanged and never re-resolved — there is no directory argument
    /// to call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token is malformed, tampered
    /// with, or expired; callers treat that as an unauthenticated
    /// session.
    pub fn renew(&self, token: &str) -> Result<String, Error> {
        let claims = self.read(token)?;
        let identity = claims.user_id.map(|id| CanonicalIdentity {
            id: UserId(id),
            email: claims.email,
            name: claims.name,
            image: claims.image,
        });
        self.seal(identity.as_ref())
    }

    /// Decrypt and validate a session token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the format is wrong, decryption
    /// fails, or the `exp`/`nbf`/`iat` claims do not validate.
    pub fn read(&self, token: &str) -> Result<SessionClaims, Error> {
        if !token.starts_with("v4.local.") {
            return Err(Error::Token("invalid token format".into()));
        }

        let sk = self.sealing_key()?;

        // ClaimsValidationRules validates exp, nbf, iat by default
        let validation_rules = ClaimsValidationRules::new();

        let untrusted_token = UntrustedToken::<Local, V4>::try_from(token)
            .map_err(|e| Error::Token(e.to_string()))?;

        let trusted_token = local::decrypt(&sk, &untrusted_token, &validation_rules, None, None)
            .map_err(|e| Error::Token(e.to_string()))?;

        let claims = trusted_token
            .payload_claims()
            .ok_or_else(|| Error::Token("missing payload".into()))?;

        let expires_at = claims
            .get_claim("exp")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Token("missing claim: exp".into()))
            .and_then(|raw| {
                OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| Error::Token(e.to_string()))
            })?;

        Ok(SessionClaims {
            user_id: claim_string(claims, "uid"),
            email: claim_string(claims, "email"),
            name: claim_string(claims, "name"),
            image: claim_string(claims, "image"),
            expires_at,
        })
    }

    /// Seal identity claims into a fresh token. `None` produces an
    /// anonymous token.
    fn seal(&self, identity: Option<&CanonicalIdentity>) -> Result<String, Error> {
        let mut claims =
            Claims::new_expires_in(&self.max_age).map_err(|e| Error::Token(e.to_string()))?;

        if let Some(identity) = identity {
            claims
                .add_additional("uid", identity.id.as_str())
                .map_err(|e| Error::Token(e.to_string()))?;
            for (name, value) in [
                ("email", &identity.email),
                ("name", &identity.name),
                ("image", &identity.image),
            ] {
                if let Some(value) = value {
                    claims
                        .add_additional(name, value.as_str())
                        .map_err(|e| Error::Token(e.to_string()))?;
                }
            }
        }

        let sk = self.sealing_key()?;
        local::encrypt(&sk, &claims, None, None).map_err(|e| Error::Token(e.to_string()))
    }

    fn sealing_key(&self) -> Result<SymmetricKey<V4>, Error> {
        SymmetricKey::<V4>::from(&self.key.bytes[..]).map_err(|e| Error::Token(e.to_string()))
    }
}

fn claim_string(claims: &Claims, name: &str) -> Option<String> {
    claims
        .get_claim(name)
        .and_then(JsonValue::as_str)
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::AuthConfig;
    use crate::directory::test_support::FakeDirectory;
    use crate::identity::CredentialsUser;
    use crate::oauth::ProviderKind;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            "http://directory.local".parse().unwrap(),
            "https://app.test".parse().unwrap(),
            parse_session_key_hex(&"7f".repeat(32)).unwrap(),
        )
    }

    fn manager() -> SessionTokenManager {
        SessionTokenManager::new(&test_config())
    }

    fn credentials_event(id: &str) -> AuthEvent {
        AuthEvent::Credentials(CredentialsUser {
            id: id.into(),
            email: Some("ada@example.com".into()),
            name: Some("Ada".into()),
            image: None,
        })
    }

    fn oauth_event() -> AuthEvent {
        AuthEvent::OAuthProfile {
            provider: ProviderKind::GitHub,
            profile: json!({"email": "ada@example.com", "login": "ada"}),
        }
    }

    #[tokio::test]
    async fn issued_token_carries_identity() {
        let directory = FakeDirectory::new();
        let token = manager()
            .issue(credentials_event("42"), &directory)
            .await
            .unwrap();

        assert!(token.starts_with("v4.local."));
        let claims = manager().read(&token).unwrap();
        assert_eq!(claims.user_id.as_deref(), Some("42"));
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn outage_degrades_to_anonymous_token_by_default() {
        let directory = FakeDirectory::down();
        let token = manager().issue(oauth_event(), &directory).await.unwrap();

        let claims = manager().read(&token).unwrap();
        assert!(claims.user_id.is_none());
    }

    #[tokio::test]
    async fn outage_fails_login_under_fail_policy() {
        let directory = FakeDirectory::down();
        let strict =
            SessionTokenManager::new(&test_config().with_outage_policy(OutagePolicy::FailLogin));

        let err = strict.issue(oauth_event(), &directory).await.unwrap_err();
        assert!(matches!(err, Error::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_identity_always_propagates() {
        // Outage policy covers outages only, not contract violations.
        let directory = FakeDirectory::new();
        let event = AuthEvent::OAuthProfile {
            provider: ProviderKind::Google,
            profile: json!({"sub": "109234"}),
        };

        let err = manager().issue(event, &directory).await.unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));

        let err = manager()
            .issue(credentials_event(""), &directory)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));
    }

    #[tokio::test]
    async fn renew_preserves_identity_and_extends_expiry() {
        let directory = FakeDirectory::new();
        let manager = manager();
        let token = manager
            .issue(credentials_event("42"), &directory)
            .await
            .unwrap();
        let original = manager.read(&token).unwrap();

        let renewed = manager.renew(&token).unwrap();
        let claims = manager.read(&renewed).unwrap();

        assert_eq!(claims.user_id.as_deref(), Some("42"));
        assert_eq!(claims.email, original.email);
        assert!(claims.expires_at >= original.expires_at);
    }

    #[tokio::test]
    async fn renew_keeps_anonymous_tokens_anonymous() {
        let directory = FakeDirectory::down();
        let manager = manager();
        let token = manager.issue(oauth_event(), &directory).await.unwrap();

        let renewed = manager.renew(&token).unwrap();
        assert!(manager.read(&renewed).unwrap().user_id.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let directory = FakeDirectory::new();
        let short = SessionTokenManager::new(&test_config().with_session_max_age(1));
        let token = short
            .issue(credentials_event("42"), &directory)
            .await
            .unwrap();

        std::thread::sleep(std::time::Duration::from_secs(2));
        assert!(matches!(short.read(&token), Err(Error::Token(_))));
        assert!(matches!(short.renew(&token), Err(Error::Token(_))));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let manager = manager();
        assert!(manager.read("not-a-token").is_err());
        assert!(manager.read("v4.local.AAAA").is_err());
        assert!(manager.read("v4.public.AAAA").is_err());
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let directory = FakeDirectory::new();
        let manager = manager();
        let token = manager
            .issue(credentials_event("42"), &directory)
            .await
            .unwrap();

        let mut tampered = token.into_bytes();
        let middle = tampered.len() / 2;
        tampered[middle] = if tampered[middle] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(manager.read(&tampered).is_err());
    }

    #[tokio::test]
    async fn wrong_key_cannot_read_token() {
        let directory = FakeDirectory::new();
        let token = manager()
            .issue(credentials_event("42"), &directory)
            .await
            .unwrap();

        let other = SessionTokenManager::new(&AuthConfig::new(
            "http://directory.local".parse().unwrap(),
            "https://app.test".parse().unwrap(),
            parse_session_key_hex(&"00".repeat(32)).unwrap(),
        ));
        assert!(other.read(&token).is_err());
    }

    #[test]
    fn session_key_hex_is_validated() {
        assert!(parse_session_key_hex("zz").is_err());
        assert!(parse_session_key_hex("abcd").is_err());
        assert!(parse_session_key_hex(&"ab".repeat(32)).is_ok());
    }
}

//! The request-facing session surface consumed by the Web UI.
//!
//! Everything here is derived: a [`SessionView`] is recomputed from the
//! session token on every request and never persisted. The UI calls
//! only this surface — it has no path to the directory client.

use serde::Serialize;
use time::OffsetDateTime;

use crate::identity::UserId;
use crate::token::SessionTokenManager;

/// The authenticated principal, as the UI sees it.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Request-scoped projection of the session token.
///
/// `user` of `None` means "not signed in" — including for tokens that
/// are intact but carry no identity.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct SessionView {
    pub user: Option<SessionUser>,
    #[serde(rename = "expires", with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl SessionView {
    /// The view for an absent, invalid, or identity-less session.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            user: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Project a session token into the externally visible session.
///
/// Fails closed: a missing token, a bad or expired token, and a token
/// without an identity all come back as the unauthenticated view. This
/// never returns an error — the UI always gets a usable session object.
#[must_use]
pub fn get_session(tokens: &SessionTokenManager, token: Option<&str>) -> SessionView {
    let Some(token) = token else {
        return SessionView::unauthenticated();
    };
    let Ok(claims) = tokens.read(token) else {
        return SessionView::unauthenticated();
    };
    match claims.user_id {
        Some(id) => SessionView {
            user: Some(SessionUser {
                id: UserId(id),
                email: claims.email,
                name: claims.name,
                image: claims.image,
            }),
            expires_at: Some(claims.expires_at),
        },
        // A token without an id is an anonymous principal, full stop.
        None => SessionView::unauthenticated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::AuthConfig;
    use crate::directory::test_support::FakeDirectory;
    use crate::identity::{AuthEvent, CredentialsUser};
    use crate::oauth::ProviderKind;
    use crate::token::parse_session_key_hex;

    fn manager() -> SessionTokenManager {
        SessionTokenManager::new(&AuthConfig::new(
            "http://directory.local".parse().unwrap(),
            "https://app.test".parse().unwrap(),
            parse_session_key_hex(&"11".repeat(32)).unwrap(),
        ))
    }

    async fn signed_in_token(manager: &SessionTokenManager) -> String {
        let directory = FakeDirectory::new();
        manager
            .issue(
                AuthEvent::Credentials(CredentialsUser {
                    id: "42".into(),
                    email: Some("ada@example.com".into()),
                    name: None,
                    image: None,
                }),
                &directory,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_authenticated_view() {
        let manager = manager();
        let token = signed_in_token(&manager).await;

        let view = get_session(&manager, Some(&token));
        assert!(view.is_authenticated());
        let user = view.user.unwrap();
        assert_eq!(user.id.as_str(), "42");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(view.expires_at.is_some());
    }

    #[tokio::test]
    async fn token_without_identity_is_unauthenticated() {
        let manager = manager();
        let directory = FakeDirectory::down();
        let token = manager
            .issue(
                AuthEvent::OAuthProfile {
                    provider: ProviderKind::Google,
                    profile: json!({"email": "ada@example.com"}),
                },
                &directory,
            )
            .await
            .unwrap();

        // Intact, unexpired, and still not signed in.
        let view = get_session(&manager, Some(&token));
        assert!(!view.is_authenticated());
        assert!(view.expires_at.is_none());
    }

    #[test]
    fn missing_or_broken_tokens_fail_closed() {
        let manager = manager();
        assert!(!get_session(&manager, None).is_authenticated());
        assert!(!get_session(&manager, Some("")).is_authenticated());
        assert!(!get_session(&manager, Some("v4.local.AAAA")).is_authenticated());
    }

    #[tokio::test]
    async fn sign_out_is_immediate_even_before_expiry() {
        let manager = manager();
        let token = signed_in_token(&manager).await;
        assert!(get_session(&manager, Some(&token)).is_authenticated());

        // Sign-out clears the cookie; the boundary then sees no token,
        // regardless of how long the old token had left.
        let after_sign_out: Option<&str> = None;
        assert!(!get_session(&manager, after_sign_out).is_authenticated());
    }

    #[tokio::test]
    async fn view_serializes_in_session_endpoint_shape() {
        let manager = manager();
        let token = signed_in_token(&manager).await;

        let view = get_session(&manager, Some(&token));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["user"]["id"], "42");
        assert!(json["expires"].is_string());

        let anonymous = serde_json::to_value(SessionView::unauthenticated()).unwrap();
        assert!(anonymous["user"].is_null());
        assert!(anonymous["expires"].is_null());
    }
}

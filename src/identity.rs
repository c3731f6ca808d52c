use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::directory::Directory;
use crate::error::Error;
use crate::oauth::ProviderKind;

/// Directory-assigned user identifier (opaque string).
///
/// Stable across providers: every login that reconciles to the same
/// directory record carries the same `UserId`. Never empty once an
/// identity is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The single identity record a user's logins converge on.
///
/// `id` is authoritative (directory-assigned). The display attributes
/// are provider-sourced and non-authoritative — they are never used as
/// a uniqueness key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CanonicalIdentity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CanonicalIdentity {
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            name: None,
            image: None,
        }
    }
}

/// A user object already verified by the directory's credentials path.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CredentialsUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl From<CanonicalIdentity> for CredentialsUser {
    fn from(identity: CanonicalIdentity) -> Self {
        Self {
            id: identity.id.into(),
            email: identity.email,
            name: identity.name,
            image: identity.image,
        }
    }
}

/// A raw authentication result, tagged at the boundary where the
/// provider reports success.
///
/// Transient: consumed exactly once by [`normalize`] and discarded
/// after the session token is minted.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AuthEvent {
    /// Password login, already verified against the directory.
    Credentials(CredentialsUser),
    /// OAuth callback carrying the provider-shaped profile payload.
    OAuthProfile {
        provider: ProviderKind,
        profile: JsonValue,
    },
}

/// Provider profile reduced to the canonical attribute names the
/// directory's upsert endpoint accepts.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct OAuthUserProfile {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Turn a raw authentication event into a canonical identity.
///
/// Credentials events are a type-narrowing pass-through — the directory
/// assigned the id when it verified the password, so no network round
/// trip happens here. OAuth events are reconciled against the directory
/// by email: providers supply no stable application-level id, and
/// without the upsert two providers would mint two identities for one
/// person.
///
/// # Errors
///
/// - [`Error::MalformedIdentity`] if a credentials event carries an
///   empty id, or an OAuth profile has no email to reconcile on.
/// - [`Error::DirectoryUnavailable`] if the upsert call fails; the
///   caller decides whether the surrounding login degrades or fails.
pub async fn normalize<D: Directory>(
    event: AuthEvent,
    directory: &D,
) -> Result<CanonicalIdentity, Error> {
    match event {
        AuthEvent::Credentials(user) => {
            if user.id.trim().is_empty() {
                return Err(Error::MalformedIdentity(
                    "credentials user has no id".into(),
                ));
            }
            Ok(CanonicalIdentity {
                id: UserId(user.id),
                email: user.email,
                name: user.name,
                image: user.image,
            })
        }
        AuthEvent::OAuthProfile { provider, profile } => {
            let profile = extract_profile(provider, &profile)?;
            let resolved = directory.upsert_oauth_identity(&profile).await?;
            // The directory answers with the canonical id; display
            // fields fall back to what the provider sent this login.
            Ok(CanonicalIdentity {
                id: resolved.id,
                email: resolved.email.or(Some(profile.email)),
                name: resolved.name.or(profile.name),
                image: resolved.image.or(profile.image),
            })
        }
    }
}

/// Map provider-specific profile field names onto the canonical shape.
///
/// # Errors
///
/// Returns [`Error::MalformedIdentity`] if the profile has no email —
/// email is the only reconciliation key the directory accepts.
pub fn extract_profile(
    provider: ProviderKind,
    profile: &JsonValue,
) -> Result<OAuthUserProfile, Error> {
    let email = profile
        .get("email")
        .and_then(JsonValue::as_str)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            Error::MalformedIdentity(format!("{provider} profile has no email"))
        })?
        .to_owned();

    let (name, image) = match provider {
        ProviderKind::Google => (
            string_field(profile, "name"),
            string_field(profile, "picture"),
        ),
        ProviderKind::GitHub => (
            // GitHub accounts routinely leave the display name unset.
            string_field(profile, "name").or_else(|| string_field(profile, "login")),
            string_field(profile, "avatar_url"),
        ),
    };

    Ok(OAuthUserProfile { email, name, image })
}

fn string_field(profile: &JsonValue, key: &str) -> Option<String> {
    profile
        .get(key)
        .and_then(JsonValue::as_str)
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::directory::test_support::FakeDirectory;

    #[tokio::test]
    async fn credentials_pass_through_without_directory_call() {
        let directory = FakeDirectory::new();
        let event = AuthEvent::Credentials(CredentialsUser {
            id: "42".into(),
            email: Some("ada@example.com".into()),
            name: None,
            image: None,
        });

        let identity = normalize(event, &directory).await.unwrap();
        assert_eq!(identity.id.as_str(), "42");
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_eq!(directory.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn credentials_with_empty_id_are_malformed() {
        let directory = FakeDirectory::new();
        let event = AuthEvent::Credentials(CredentialsUser {
            id: "  ".into(),
            email: None,
            name: None,
            image: None,
        });

        let err = normalize(event, &directory).await.unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));
    }

    #[tokio::test]
    async fn oauth_profile_resolves_through_directory() {
        let directory = FakeDirectory::new();
        let event = AuthEvent::OAuthProfile {
            provider: ProviderKind::Google,
            profile: json!({
                "sub": "109234",
                "email": "ada@example.com",
                "name": "Ada Lovelace",
                "picture": "https://lh3.example/ada.png",
            }),
        };

        let identity = normalize(event, &directory).await.unwrap();
        assert!(!identity.id.as_str().is_empty());
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(identity.image.as_deref(), Some("https://lh3.example/ada.png"));
        assert_eq!(directory.upsert_calls(), 1);
    }

    #[tokio::test]
    async fn same_email_from_two_providers_converges() {
        let directory = FakeDirectory::new();

        let google = AuthEvent::OAuthProfile {
            provider: ProviderKind::Google,
            profile: json!({"email": "ada@example.com", "name": "Ada"}),
        };
        let github = AuthEvent::OAuthProfile {
            provider: ProviderKind::GitHub,
            profile: json!({"email": "ada@example.com", "login": "ada", "avatar_url": "https://a.png"}),
        };

        let first = normalize(google, &directory).await.unwrap();
        let second = normalize(github, &directory).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn github_name_falls_back_to_login() {
        let profile = json!({
            "id": 583231,
            "login": "ada",
            "email": "ada@example.com",
            "avatar_url": "https://avatars.example/u/583231",
        });
        let extracted = extract_profile(ProviderKind::GitHub, &profile).unwrap();
        assert_eq!(extracted.name.as_deref(), Some("ada"));
        assert_eq!(
            extracted.image.as_deref(),
            Some("https://avatars.example/u/583231")
        );
    }

    #[test]
    fn profile_without_email_is_malformed() {
        let profile = json!({"sub": "109234", "name": "Ada"});
        let err = extract_profile(ProviderKind::Google, &profile).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));

        let profile = json!({"email": "", "name": "Ada"});
        let err = extract_profile(ProviderKind::Google, &profile).unwrap_err();
        assert!(matches!(err, Error::MalformedIdentity(_)));
    }
}

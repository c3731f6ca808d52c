#![doc = include_str!("../README.md")]

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod oauth;
pub mod redirect;
pub mod session;
pub mod token;

// Re-exports for convenient access
pub use config::{AuthConfig, OutagePolicy, ProviderCredentials};
pub use directory::{Directory, DirectoryClient};
pub use error::Error;
pub use identity::{
    AuthEvent, CanonicalIdentity, CredentialsUser, OAuthUserProfile, UserId, normalize,
};
pub use oauth::{AuthorizationRequest, ProviderClient, ProviderKind, TokenResponse};
pub use redirect::resolve_redirect;
pub use session::{SessionUser, SessionView, get_session};
pub use token::{SessionClaims, SessionKey, SessionTokenManager, parse_session_key_hex};

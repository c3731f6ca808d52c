#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Credential verification failed, or the directory answered the
    /// verify call with an unparsable body. Never carries the password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The authentication event violated the identity contract
    /// (empty id on the credentials path, missing reconciliation email
    /// on the OAuth path). Shown to users as a failed sign-in.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),
    /// The directory service was unreachable, timed out, or answered
    /// with a non-success status during OAuth reconciliation.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),
    /// The directory refused a signup (duplicate email, invalid input).
    #[error("signup rejected: {0}")]
    SignupRejected(String),
    #[error("OAuth2 error during {operation} (status {status:?}): {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token error: {0}")]
    Token(String),
    #[error("configuration error: {0}")]
    Config(String),
}

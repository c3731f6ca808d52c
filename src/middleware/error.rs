use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No session cookie, or the session carries no identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// A session cookie exists but its token is expired or invalid.
    #[error("session expired")]
    SessionExpired,

    /// OAuth2 flow error (state mismatch, token exchange failure, etc.)
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The directory refused a signup.
    #[error("signup rejected: {0}")]
    Signup(String),

    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// Anything that should never surface to a client verbatim.
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated | Self::SessionExpired => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::OAuth(ref msg) => {
                let encoded = urlencoding::encode(msg);
                Redirect::to(&format!("/signin?error={encoded}")).into_response()
            }
            Self::Signup(ref msg) => {
                (StatusCode::BAD_REQUEST, msg.clone()).into_response()
            }
            Self::Unavailable(_) => {
                tracing::warn!(error = %self, "directory unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "Directory unavailable").into_response()
            }
            Self::Internal(_) => {
                tracing::error!(error = %self, "auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error;
        match e {
            Error::SignupRejected(msg) => Self::Signup(msg),
            Error::DirectoryUnavailable(msg) => Self::Unavailable(msg),
            Error::InvalidCredentials | Error::MalformedIdentity(_) => {
                Self::OAuth("sign-in failed".into())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

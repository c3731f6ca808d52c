use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::error::AuthError;
use super::state::SessionState;
use crate::directory::Directory;
use crate::identity::UserId;

/// Authenticated user extracted from the session cookie.
///
/// Use as an Axum extractor in route handlers. Returns `401
/// Unauthorized` if no valid, identity-carrying session exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn saved_searches(user: CurrentUser) -> impl IntoResponse {
///     format!("searches for {}", user.id)
/// }
///
/// // Accessible to both signed-in and anonymous visitors:
/// async fn front_page(user: Option<CurrentUser>) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}", u.name.as_deref().unwrap_or("reader")),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Canonical directory-assigned user id.
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl<D: Directory> FromRequestParts<SessionState<D>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SessionState<D>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(&state.settings.session_cookie_name)
            .map(|c| c.value().to_string())
            .ok_or(AuthError::Unauthenticated)?;

        let claims = state
            .tokens
            .read(&token)
            .map_err(|_| AuthError::SessionExpired)?;

        // A token with no id never grants identity-scoped behavior.
        let id = claims.user_id.ok_or(AuthError::Unauthenticated)?;

        Ok(Self {
            id: UserId(id),
            email: claims.email,
            name: claims.name,
            image: claims.image,
        })
    }
}

// Lets handlers take Option<CurrentUser> for pages that render for
// both signed-in and anonymous visitors.
impl<D: Directory> OptionalFromRequestParts<SessionState<D>> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SessionState<D>,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(
            <Self as FromRequestParts<SessionState<D>>>::from_request_parts(parts, state)
                .await
                .ok(),
        )
    }
}

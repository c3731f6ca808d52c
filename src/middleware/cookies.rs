use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

const PKCE_COOKIE_NAME: &str = "__newsdesk_pkce";
const STATE_COOKIE_NAME: &str = "__newsdesk_state";
const CALLBACK_COOKIE_NAME: &str = "__newsdesk_callback";

/// Lifetime for the transient login cookies: long enough to finish the
/// provider round trip, nothing more.
const LOGIN_COOKIE_TTL: Duration = Duration::minutes(5);

fn transient(name: &'static str, value: String, secure: bool, auth_path: &str) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_string())
        .max_age(LOGIN_COOKIE_TTL)
        .build()
}

/// Create PKCE verifier + state cookies for the authorization request.
pub(super) fn login_cookies(
    code_verifier: &str,
    state: &str,
    secure: bool,
    auth_path: &str,
) -> (Cookie<'static>, Cookie<'static>) {
    (
        transient(PKCE_COOKIE_NAME, code_verifier.to_string(), secure, auth_path),
        transient(STATE_COOKIE_NAME, state.to_string(), secure, auth_path),
    )
}

/// Stash the requested post-login target until the provider calls back.
pub(super) fn callback_target_cookie(
    target: &str,
    secure: bool,
    auth_path: &str,
) -> Cookie<'static> {
    transient(CALLBACK_COOKIE_NAME, target.to_string(), secure, auth_path)
}

/// Create removal cookies for all transient login cookies.
pub(super) fn clear_login_cookies(
    auth_path: &str,
) -> (Cookie<'static>, Cookie<'static>, Cookie<'static>) {
    let clear = |name: &'static str| {
        Cookie::build((name, ""))
            .path(auth_path.to_string())
            .max_age(Duration::ZERO)
            .build()
    };
    (
        clear(PKCE_COOKIE_NAME),
        clear(STATE_COOKIE_NAME),
        clear(CALLBACK_COOKIE_NAME),
    )
}

/// Create the session token cookie.
pub(super) fn session_cookie(
    name: &str,
    token: &str,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Create removal cookie for the session.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Get the PKCE verifier from cookies.
pub(super) fn get_pkce_verifier(jar: &CookieJar) -> Option<String> {
    jar.get(PKCE_COOKIE_NAME).map(|c| c.value().to_string())
}

/// Get the state from cookies.
pub(super) fn get_state(jar: &CookieJar) -> Option<String> {
    jar.get(STATE_COOKIE_NAME).map(|c| c.value().to_string())
}

/// Get the stashed post-login target from cookies.
pub(super) fn get_callback_target(jar: &CookieJar) -> Option<String> {
    jar.get(CALLBACK_COOKIE_NAME).map(|c| c.value().to_string())
}

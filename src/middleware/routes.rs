use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Form, Json, Router};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::config::SessionRouterConfig;
use super::cookies;
use super::error::AuthError;
use super::state::SessionState;
use crate::directory::Directory;
use crate::error::Error;
use crate::identity::{AuthEvent, CanonicalIdentity};
use crate::oauth::{ProviderClient, ProviderKind};
use crate::redirect::resolve_redirect;
use crate::session::{SessionView, get_session};
use crate::token::SessionTokenManager;

/// Create the session router.
///
/// The caller supplies the directory implementation; everything else is
/// built from the configuration. Mounted routes (under `auth_path`,
/// default `/api/auth`):
///
/// - `POST /signin` — credentials login
/// - `GET  /signin/{provider}` — start an OAuth flow
/// - `GET  /callback/{provider}` — OAuth provider callback
/// - `GET  /session` — current session as JSON, renews the token
/// - `GET|POST /signout` — clear the session
/// - `POST /signup` — register a credentials user
pub fn session_routes<D: Directory>(config: SessionRouterConfig, directory: D) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let mut providers = HashMap::new();
    for credentials in config.auth.providers() {
        let redirect_uri = config
            .auth
            .app_base_url()
            .join(&format!(
                "{auth_path}/callback/{}",
                credentials.kind.as_str()
            ))
            .expect("callback path joined onto a validated base URL");
        providers.insert(
            credentials.kind,
            ProviderClient::new(credentials, redirect_uri),
        );
    }

    let state = SessionState {
        tokens: Arc::new(SessionTokenManager::new(&config.auth)),
        directory: Arc::new(directory),
        providers: Arc::new(providers),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/signin"), post(credentials_signin::<D>))
        .route(&format!("{auth_path}/signin/{{provider}}"), get(oauth_start::<D>))
        .route(
            &format!("{auth_path}/callback/{{provider}}"),
            get(oauth_callback::<D>),
        )
        .route(&format!("{auth_path}/session"), get(session_view::<D>))
        .route(
            &format!("{auth_path}/signout"),
            get(signout::<D>).post(signout::<D>),
        )
        .route(&format!("{auth_path}/signup"), post(signup::<D>))
        .with_state(state)
}

// ── Credentials sign-in ────────────────────────────────────────────

#[derive(Deserialize)]
struct CredentialsForm {
    email: String,
    password: String,
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

async fn credentials_signin<D: Directory>(
    State(state): State<SessionState<D>>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Redirect), Response> {
    // The error carries no password and neither does this event.
    let user = state
        .directory
        .verify_credentials(&form.email, &form.password)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "credentials sign-in rejected");
            login_error(&state.settings.error_redirect, "invalid_credentials")
        })?;

    let token = state
        .tokens
        .issue(AuthEvent::Credentials(user.into()), state.directory.as_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "session issue failed");
            login_error(&state.settings.error_redirect, "signin_failed")
        })?;

    let cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &token,
        state.settings.session_max_age_secs,
        state.settings.secure_cookies,
    );

    let target = resolve_redirect(
        form.callback_url
            .as_deref()
            .unwrap_or(&state.settings.default_redirect),
        &state.settings.base_url,
    );

    Ok((jar.add(cookie), Redirect::to(&target)))
}

// ── OAuth start ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StartParams {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

async fn oauth_start<D: Directory>(
    State(state): State<SessionState<D>>,
    Path(provider): Path<String>,
    Query(params): Query<StartParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), Response> {
    let client = lookup_provider(&state, &provider)
        .map_err(|_| (StatusCode::NOT_FOUND, "unknown provider").into_response())?;

    let auth_req = client.authorization_url();

    let (pkce_cookie, state_cookie) = cookies::login_cookies(
        &auth_req.code_verifier,
        &auth_req.state,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    let mut jar = jar.add(pkce_cookie).add(state_cookie);
    if let Some(target) = params.callback_url {
        jar = jar.add(cookies::callback_target_cookie(
            &target,
            state.settings.secure_cookies,
            &state.settings.auth_path,
        ));
    }

    Ok((jar, Redirect::to(&auth_req.url)))
}

// ── OAuth callback ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn oauth_callback<D: Directory>(
    State(state): State<SessionState<D>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), Response> {
    let error_redirect = &state.settings.error_redirect;

    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from provider");
        return Err(login_error(error_redirect, desc));
    }

    let client = lookup_provider(&state, &provider)
        .map_err(|_| login_error(error_redirect, "unknown_provider"))?;
    let kind = client.kind();

    let code = params
        .code
        .ok_or_else(|| login_error(error_redirect, "missing_code"))?;

    let received_state = params
        .state
        .ok_or_else(|| login_error(error_redirect, "state_mismatch"))?;

    let stored_state = cookies::get_state(&jar)
        .ok_or_else(|| login_error(error_redirect, "state_mismatch"))?;

    if received_state != stored_state {
        tracing::warn!("OAuth state mismatch");
        return Err(login_error(error_redirect, "state_mismatch"));
    }

    let code_verifier = cookies::get_pkce_verifier(&jar)
        .ok_or_else(|| login_error(error_redirect, "missing_verifier"))?;

    let token_response = client
        .exchange_code(&code, &code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "token exchange failed");
            login_error(error_redirect, "token_exchange_failed")
        })?;

    let profile = client
        .fetch_profile(&token_response.access_token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "profile request failed");
            login_error(error_redirect, "profile_failed")
        })?;

    // A directory outage surfaces here as an anonymous token under the
    // default policy; only hard failures reach the error branch.
    let session_token = state
        .tokens
        .issue(
            AuthEvent::OAuthProfile {
                provider: kind,
                profile,
            },
            state.directory.as_ref(),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "identity reconciliation failed");
            login_error(error_redirect, "reconciliation_failed")
        })?;

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session_token,
        state.settings.session_max_age_secs,
        state.settings.secure_cookies,
    );

    let target = resolve_redirect(
        cookies::get_callback_target(&jar)
            .as_deref()
            .unwrap_or(&state.settings.default_redirect),
        &state.settings.base_url,
    );

    let (clear_pkce, clear_state, clear_target) =
        cookies::clear_login_cookies(&state.settings.auth_path);

    let jar = jar
        .add(session_cookie)
        .add(clear_pkce)
        .add(clear_state)
        .add(clear_target);

    tracing::info!(provider = %kind, "OAuth2 sign-in complete");

    Ok((jar, Redirect::to(&target)))
}

// ── Session ────────────────────────────────────────────────────────

async fn session_view<D: Directory>(
    State(state): State<SessionState<D>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionView>) {
    let Some(token) = jar
        .get(&state.settings.session_cookie_name)
        .map(|c| c.value().to_string())
    else {
        return (jar, Json(SessionView::unauthenticated()));
    };

    match state.tokens.renew(&token) {
        Ok(renewed) => {
            let view = get_session(&state.tokens, Some(&renewed));
            let cookie = cookies::session_cookie(
                &state.settings.session_cookie_name,
                &renewed,
                state.settings.session_max_age_secs,
                state.settings.secure_cookies,
            );
            (jar.add(cookie), Json(view))
        }
        // Dead token: drop the cookie rather than hand it back out.
        Err(_) => {
            let clear = cookies::clear_session_cookie(&state.settings.session_cookie_name);
            (jar.remove(clear), Json(SessionView::unauthenticated()))
        }
    }
}

// ── Sign-out ───────────────────────────────────────────────────────

async fn signout<D: Directory>(
    State(state): State<SessionState<D>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    // Tokens are stateless, so sign-out is cookie removal; removing an
    // absent cookie is a no-op, which makes this idempotent.
    let clear = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (
        jar.remove(clear),
        Redirect::to(&state.settings.logout_redirect),
    )
}

// ── Signup ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
}

async fn signup<D: Directory>(
    State(state): State<SessionState<D>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<CanonicalIdentity>), AuthError> {
    let identity = state
        .directory
        .sign_up(&request.email, &request.password)
        .await
        .map_err(AuthError::from)?;
    Ok((StatusCode::CREATED, Json(identity)))
}

// ── Helpers ────────────────────────────────────────────────────────

fn lookup_provider<'a, D: Directory>(
    state: &'a SessionState<D>,
    provider: &str,
) -> Result<&'a ProviderClient, Error> {
    let kind: ProviderKind = provider.parse()?;
    state.provider(kind).ok_or(Error::OAuth {
        operation: "provider lookup",
        status: None,
        detail: format!("provider '{kind}' is not configured"),
    })
}

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

use crate::config::AuthConfig;

/// Shared settings used by routes, cookies and the extractor.
#[derive(Clone)]
pub(crate) struct SessionSettings {
    pub(crate) session_cookie_name: String,
    pub(crate) session_max_age_secs: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    /// Trusted base for redirect validation, copied from [`AuthConfig`].
    pub(crate) base_url: String,
    pub(crate) default_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
}

impl SessionSettings {
    fn defaults() -> Self {
        Self {
            session_cookie_name: "__newsdesk_session".into(),
            session_max_age_secs: 0,
            secure_cookies: true,
            auth_path: "/api/auth".into(),
            base_url: String::new(),
            default_redirect: "/".into(),
            logout_redirect: "/".into(),
            error_redirect: "/signin".into(),
        }
    }
}

/// Configuration for the session router.
///
/// The core [`AuthConfig`] is the required constructor parameter; the
/// HTTP-facing settings all have defaults and are overridable with
/// `with_*` methods.
pub struct SessionRouterConfig {
    pub(super) auth: AuthConfig,
    pub(super) settings: SessionSettings,
}

impl SessionRouterConfig {
    #[must_use]
    pub fn new(auth: AuthConfig) -> Self {
        let mut settings = SessionSettings::defaults();
        settings.base_url = auth.app_base_url().as_str().to_owned();
        settings.session_max_age_secs =
            i64::try_from(auth.session_max_age()).unwrap_or(i64::MAX);
        Self { auth, settings }
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Path prefix the auth routes are mounted under (default
    /// `/api/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Where to land after login when no `callbackUrl` was requested.
    #[must_use]
    pub fn with_default_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.default_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    /// Where failed sign-ins are redirected, with an `error` query
    /// parameter appended (default `/signin`).
    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }
}

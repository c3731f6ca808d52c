/// Resolves a requested post-login redirect target against the trusted
/// base URL.
///
/// Rules, in order:
/// - a relative path (leading `/`) is prefixed with the base
/// - a URL inside the trusted base is returned unchanged
/// - anything else silently becomes the base itself
///
/// "Inside the trusted base" is origin-boundary aware: the character
/// after the base must be `/`, `?` or `#`, so
/// `https://app.test.evil.com` never passes for base `https://app.test`.
///
/// Rejection is deliberately indistinguishable from success — an open
/// redirect attempt must not be observable as a failure.
#[must_use]
pub fn resolve_redirect(requested: &str, trusted_base: &str) -> String {
    let base = trusted_base.trim_end_matches('/');

    if requested.starts_with('/') {
        return format!("{base}{requested}");
    }

    if requested == base {
        return requested.to_owned();
    }
    if let Some(rest) = requested.strip_prefix(base) {
        if rest.starts_with(['/', '?', '#']) {
            return requested.to_owned();
        }
    }

    base.to_owned()
}

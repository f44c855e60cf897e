use cookie::time::Duration;
use cookie::{Cookie, SameSite};

/// Thirty days, in seconds.
pub const DEFAULT_COOKIE_MAX_AGE: i64 = 86400 * 30;

/// Configuration options for session cookies.
///
/// The store hands every new session its own copy of these options, so a handler
/// can change `max_age` or `path` for one session without touching the defaults.
///
/// `max_age` doubles as the session lifetime: when positive it is both the
/// cookie's `Max-Age` and the backend TTL. Saving a session whose `max_age` is
/// zero or negative deletes it and clears the cookie.
///
/// # Example
///
/// ```rust
/// use kv_session::CookieOptions;
///
/// let cookie_options = CookieOptions::build()
///         .http_only(true)
///         .same_site(cookie::SameSite::Lax)
///         .secure(true)
///         .max_age(1 * 60)
///         .path("/");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub same_site: SameSite,
    pub secure: bool,
    pub max_age: i64,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            domain: None,
            path: Some("/".to_string()),
            same_site: SameSite::Lax,
            secure: true,
            max_age: DEFAULT_COOKIE_MAX_AGE,
        }
    }
}

impl CookieOptions {
    /// Creates a new `CookieOptions` with default values.
    pub fn build() -> Self {
        Self::default()
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Builds the `Set-Cookie` value carrying `value` under `name`.
    pub(crate) fn to_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let cookie_builder = Cookie::build((name.to_string(), value))
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site);

        let cookie_builder = if self.max_age > 0 {
            cookie_builder.max_age(Duration::seconds(self.max_age))
        } else {
            cookie_builder
        };

        let cookie_builder = if let Some(domain) = &self.domain {
            cookie_builder.domain(domain.clone())
        } else {
            cookie_builder
        };

        let cookie_builder = if let Some(path) = &self.path {
            cookie_builder.path(path.clone())
        } else {
            cookie_builder
        };

        cookie_builder.build()
    }

    /// Builds a cookie instructing the browser to drop `name` immediately.
    pub(crate) fn to_removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.to_cookie(name, String::new());
        cookie.make_removal();
        cookie
    }
}

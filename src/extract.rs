use std::sync::Arc;

use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};
use tower_cookies::Cookies;

use crate::Sessions;
use crate::store::SessionStore;

/// Axum Extractor for [`Sessions`].
///
/// Requires the [`SessionLayer`](crate::SessionLayer) and, outside of it,
/// tower-cookies' `CookieManagerLayer`.
impl<S, T> FromRequestParts<S> for Sessions<T>
where
    S: Send + Sync,
    T: SessionStore,
{
    type Rejection = (StatusCode, &'static str);

    #[tracing::instrument(name = "session", skip(parts, _state))]
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let store = parts.extensions.get::<Arc<T>>().cloned().ok_or_else(|| {
            tracing::error!("session layer not found in the request extensions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "session layer not found in the request extensions",
            )
        })?;

        let cookies = parts.extensions.get::<Cookies>().cloned().ok_or_else(|| {
            tracing::error!("cookies not found in the request extensions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cookies not found in the request extensions",
            )
        })?;

        Ok(Sessions::new(store, cookies))
    }
}

//! Authentication extractors
//!
//! Handlers declare the access they need by taking one of these as an
//! argument; the bearer token is resolved through `AuthService`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;
use crate::handlers::AppState;
use crate::services::AuthContext;
use crate::utils::errors::MaabaraError;

/// Extract the token from an `Authorization: Bearer …` header
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Any signed-in, active account
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

/// Signed-in account if a valid token was sent
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthContext>);

/// Signed-in account with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = MaabaraError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| MaabaraError::Unauthorized("Missing bearer token".to_string()))?;

        let context = state.services.auth_service.authenticate(token).await?;
        Ok(AuthUser(context))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = MaabaraError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            // A token that was sent must be valid
            Some(token) => Ok(MaybeAuthUser(Some(state.services.auth_service.authenticate(token).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = MaabaraError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(context) = AuthUser::from_request_parts(parts, state).await?;

        if let Err(e) = context.require_admin() {
            warn!(user_id = context.user_id, path = %parts.uri.path(), "Unauthorized admin access attempt");
            return Err(e);
        }

        Ok(AdminUser(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/admin/stats");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def.ghi"))), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}

//! Bearer-token authentication extractors

use super::handlers::ApiError;
use super::AppState;
use crate::db::UserProfile;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

/// The signed-in caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthenticated("Must be signed in.".to_string()))?;

        let user = state
            .db
            .get_user_by_token(bearer.token())
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::Unauthenticated("Invalid credentials.".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// A signed-in caller whose profile carries `isAdmin`
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(uid = %user.uid, "Admin endpoint called by non-admin");
            return Err(ApiError::PermissionDenied(
                "Admin access required.".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

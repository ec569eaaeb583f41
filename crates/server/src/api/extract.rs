use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use easyshop_core::UserId;

use super::{error_response, ApiError, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user whose cart a request operates on, taken from the `x-user-id` header.
/// Authentication happens upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartUser(pub UserId);

impl<S> FromRequestParts<S> for CartUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    format!("missing `{USER_ID_HEADER}` header"),
                )
            })?;

        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(UserId(id))),
            _ => Err(error_response(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                format!("`{USER_ID_HEADER}` must be a positive integer"),
            )),
        }
    }
}

/// Present on handlers that mutate the catalog. Requires `Authorization: Bearer <token>`
/// matching the configured admin token; with no token configured every request is refused.
#[derive(Clone, Copy, Debug)]
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.auth.admin_token.is_none() {
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "forbidden",
                "catalog administration is disabled: no admin token configured",
            ));
        }

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "missing bearer token for catalog administration",
                )
            })?;

        if !state.auth.admin_token_matches(presented) {
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "forbidden",
                "admin token is not valid",
            ));
        }
        Ok(Self)
    }
}

//! Caller identity extractors.
//!
//! Clients send `Authorization: Token <key>` (or `Bearer <key>`).

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::Error;
use crate::model::User;

use super::error::ApiError;
use super::state::AppState;

fn authorization(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// The authenticated caller; 401 without valid credentials.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = authorization(parts)
            .ok_or_else(|| Error::authentication("credentials were not provided"))?;
        let user = state.db(|storage| state.auth.authenticate(storage, header))?;
        Ok(Self(user))
    }
}

/// The caller if credentials were sent. Bad credentials are still a 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    /// Whether the caller is a staff member.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.0.as_ref().is_some_and(|user| user.is_staff)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match authorization(parts) {
            None => Ok(Self(None)),
            Some(header) => {
                let user = state.db(|storage| state.auth.authenticate(storage, header))?;
                Ok(Self(Some(user)))
            }
        }
    }
}

/// An authenticated staff member; 403 for everyone else.
#[derive(Debug, Clone)]
pub struct Staff(pub User);

#[async_trait]
impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(Error::permission_denied("staff only").into());
        }
        Ok(Self(user))
    }
}

// Gerbi - A multi-language page CMS built with Rust
// Copyright (C) 2025 Gerbi Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    RequestPartsExt,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use gerbi_core::{Session, User};

use crate::AppState;

pub const SESSION_COOKIE: &str = "session_id";

/// Current authenticated user, extracted from request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session_id = extract_session_id(parts).await?;
        let state = AppState::from_ref(state);

        let session = state
            .session_repo()
            .find_by_id(&session_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid session"))?;

        if session.is_expired() {
            return Err((StatusCode::UNAUTHORIZED, "Session expired"));
        }

        let user = state
            .user_repo()
            .find_by_id(session.user_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load session user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "User not found"))?;

        if !user.is_active {
            return Err((StatusCode::FORBIDDEN, "Account disabled"));
        }

        Ok(CurrentUser { user, session })
    }
}

/// Optional authenticated user. Invalid, expired and disabled sessions are
/// treated as anonymous.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl OptionalUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref().map(|current| &current.user)
    }

    /// Whether the visitor may see draft pages.
    pub fn is_staff(&self) -> bool {
        self.user().is_some_and(User::can_manage_pages)
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err((StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _)) => Ok(OptionalUser(None)),
            Err(e) => Err(e),
        }
    }
}

async fn extract_session_id(parts: &mut Parts) -> Result<String, (StatusCode, &'static str)> {
    if let Ok(cookies) = parts.extract::<CookieJar>().await {
        if let Some(session_cookie) = cookies.get(SESSION_COOKIE) {
            return Ok(session_cookie.value().to_string());
        }
    }

    if let Ok(TypedHeader(Authorization(bearer))) =
        parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        return Ok(bearer.token().to_string());
    }

    Err((StatusCode::UNAUTHORIZED, "No session found"))
}

/// Require an active staff user
#[derive(Debug, Clone)]
pub struct RequireStaff(pub User);

impl<S> FromRequestParts<S> for RequireStaff
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser { user, .. } = CurrentUser::from_request_parts(parts, state).await?;

        if !user.can_manage_pages() {
            return Err((StatusCode::FORBIDDEN, "Staff access required"));
        }

        Ok(RequireStaff(user))
    }
}

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
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::{cookie::Cookie, cookie::SameSite, CookieJar};
use gerbi_core::Session;
use serde::Deserialize;

use crate::{
    auth::{OptionalUser, SESSION_COOKIE},
    error::AppError,
    template_context::build_context,
    AppState,
};

const LOGIN_TEMPLATE: &str = "admin/login.html";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

async fn render_login(state: &AppState, error: Option<&str>) -> Result<String, AppError> {
    let language = state.languages().default_language().to_string();
    let mut context = build_context(state, LOGIN_TEMPLATE, None, &language, None).await?;
    if let Some(error) = error {
        context.insert("error", error);
    }
    Ok(state.templates.render(LOGIN_TEMPLATE, &context)?)
}

/// Display login form
pub async fn login_form(
    State(state): State<AppState>,
    viewer: OptionalUser,
) -> Result<Response, AppError> {
    if viewer.is_staff() {
        return Ok(Redirect::to("/admin/pages/").into_response());
    }
    Ok(Html(render_login(&state, None).await?).into_response())
}

/// Check credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let users = state.user_repo();
    let user = if form.username.contains('@') {
        users.find_by_email(&form.username).await?
    } else {
        users.find_by_username(&form.username).await?
    };

    let user = match user {
        Some(user) if !user.is_active => {
            tracing::info!(username = %form.username, "Login refused for disabled account");
            let html = render_login(&state, Some("Account is disabled")).await?;
            return Ok((StatusCode::UNAUTHORIZED, Html(html)).into_response());
        }
        Some(user) if user.verify_password(&form.password)? => user,
        _ => {
            tracing::info!(username = %form.username, "Failed login attempt");
            let html = render_login(&state, Some("Invalid username or password")).await?;
            return Ok((StatusCode::UNAUTHORIZED, Html(html)).into_response());
        }
    };

    let user_id = user
        .id
        .ok_or_else(|| AppError::internal_server_error("User has no id"))?;
    let session = Session::new(user_id, state.config.session_lifetime());
    state.session_repo().create(&session).await?;

    let max_age = cookie::time::Duration::seconds(state.config.session_lifetime().num_seconds());
    let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build();

    tracing::info!(user_id, username = %user.username, "User logged in");
    Ok((jar.add(cookie), Redirect::to("/admin/pages/")).into_response())
}

/// Close the current session, if any
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = state.session_repo().delete(session_cookie.value()).await {
            tracing::debug!("Logout of unknown session: {:?}", e);
        }
    }

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), Redirect::to("/admin/login")).into_response()
}

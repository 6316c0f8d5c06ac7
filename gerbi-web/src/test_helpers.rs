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

use anyhow::Result;
use gerbi_core::{models::content, Page, PageStatus, Session, User};
use gerbi_db::init_database;

use crate::{auth::SESSION_COOKIE, templates::TemplateEngine, AppState, Config};

/// State over an empty in-memory database with the built-in templates.
pub async fn create_test_app_state() -> Result<AppState> {
    create_test_app_state_with(&[]).await
}

/// Same as [`create_test_app_state`] with extra in-memory templates.
pub async fn create_test_app_state_with(templates: &[(&str, &str)]) -> Result<AppState> {
    create_test_app_state_with_config(templates, test_config()).await
}

pub async fn create_test_app_state_with_config(
    templates: &[(&str, &str)],
    config: Config,
) -> Result<AppState> {
    let db = init_database("sqlite::memory:").await?;
    let templates = TemplateEngine::from_sources(templates)?;
    Ok(AppState::new(db, templates, config))
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        templates_dir: None,
        ..Config::default()
    }
}

/// A page using the default template with an `en-us` title and slug.
pub async fn create_page(
    state: &AppState,
    parent_id: Option<i64>,
    slug: &str,
    title: &str,
    status: PageStatus,
) -> Result<Page> {
    let template = state.config.default_template.clone();
    let page = match parent_id {
        Some(parent_id) => Page::new_with_parent(parent_id, template, status),
        None => Page::new(template, status),
    };
    let pages = state.page_repo();
    let id = pages.create(&page).await?;

    let contents = state.content_repo();
    contents.set_content(id, "en-us", content::TITLE, title).await?;
    contents.set_content(id, "en-us", content::SLUG, slug).await?;

    pages
        .find_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Page {} vanished", id))
}

pub async fn create_staff_user(state: &AppState) -> Result<User> {
    create_user(state, "batiste", true).await
}

pub async fn create_non_staff_user(state: &AppState) -> Result<User> {
    create_user(state, "nonstaff", false).await
}

async fn create_user(state: &AppState, username: &str, staff: bool) -> Result<User> {
    let email = format!("{}@example.com", username);
    let mut user = if staff {
        User::new_staff(username.to_string(), email, "b")?
    } else {
        User::new(username.to_string(), email, "b")?
    };
    user.id = Some(state.user_repo().create(&user).await?);
    Ok(user)
}

/// `Cookie` header value of a fresh session for `user`.
pub async fn session_cookie(state: &AppState, user: &User) -> Result<String> {
    let user_id = user
        .id
        .ok_or_else(|| anyhow::anyhow!("User must be saved first"))?;
    let session = Session::new(user_id, state.config.session_lifetime());
    state.session_repo().create(&session).await?;
    Ok(format!("{}={}", SESSION_COOKIE, session.id))
}

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
    extract::{Query, State},
    http::{header, HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::OptionalUser,
    error::AppError,
    template_context::{not_found, render_template},
    urls::{request_language, resolve_path},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub lang: Option<String>,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Public view of any path that is not an admin route.
pub async fn show_page(
    State(state): State<AppState>,
    viewer: OptionalUser,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let path = uri.path();
    if !path.ends_with('/') {
        let target = match uri.query() {
            Some(q) => format!("{}/?{}", path, q),
            None => format!("{}/", path),
        };
        return Ok(Redirect::permanent(&target).into_response());
    }

    let query_lang = query
        .lang
        .as_deref()
        .filter(|_| state.config.language_from_query);
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let language = request_language(state.languages(), query_lang, accept_language);
    let user = viewer.user();

    let pages = state.page_repo();
    let settings = state.publication_settings();
    let now = Utc::now();

    let page = if path == "/" {
        // The home page is the first top-level page this visitor may see.
        pages
            .list_root_pages()
            .await?
            .into_iter()
            .find(|p| p.is_visible_to(viewer.is_staff(), &settings, now))
    } else {
        resolve_path(&pages, &state.content_repo(), path).await?
    };
    let Some(page) = page else {
        tracing::debug!(path, "No page at path");
        return Err(not_found(&state, &language, user).await);
    };

    // Checked on every request: publication dates move pages in and out of draft.
    // A draft hides its whole subtree.
    let ancestors = pages.ancestors(&page).await?;
    let visible = std::iter::once(&page)
        .chain(ancestors.iter())
        .all(|p| p.is_visible_to(viewer.is_staff(), &settings, now));
    if !visible {
        tracing::debug!(page_id = ?page.id, "Draft page hidden from visitor");
        return Err(not_found(&state, &language, user).await);
    }

    let template = if state.templates.has_template(&page.template) {
        page.template.as_str()
    } else {
        tracing::warn!(
            page_id = ?page.id,
            template = %page.template,
            "Page template missing, using default"
        );
        state.config.default_template.as_str()
    };

    let html = render_template(&state, template, Some(&page), &language, user).await?;
    Ok(Html(html).into_response())
}

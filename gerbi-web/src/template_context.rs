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
use chrono::Utc;
use gerbi_core::{models::content, Page, PageStatus, User};
use gerbi_db::{resolve_content, PageContents};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tera::{Context, Tera};

use crate::error::AppError;
use crate::navigation::{build_menu, Visibility};
use crate::urls::url_path;
use crate::AppState;

/// The page being rendered, as templates see it (`gerbi_current_page`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageView {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub status: PageStatus,
    pub calculated_status: PageStatus,
    pub template: String,
}

/// Build the tera context for rendering `template`, optionally for `page`.
///
/// Without a page, `gerbi_current_page` is null and `gerbi_placeholders`
/// is empty, so every placeholder renders as an empty string.
pub async fn build_context(
    state: &AppState,
    template: &str,
    page: Option<&Page>,
    language: &str,
    user: Option<&User>,
) -> Result<Context> {
    let languages = state.languages();
    let settings = state.publication_settings();
    let now = Utc::now();
    let pages = state.page_repo();
    let contents = state.content_repo();

    let mut context = Context::new();
    context.insert("lang", language);
    context.insert("languages", languages.languages());
    context.insert("default_language", languages.default_language());
    context.insert("user", &user);

    let visibility = Visibility {
        viewer_is_staff: user.is_some_and(User::can_manage_pages),
        settings,
        now,
    };
    let current_id = page.and_then(|p| p.id);
    let menu = build_menu(&pages, &contents, language, visibility, current_id).await?;
    context.insert("gerbi_menu", &menu);

    let (Some(page), Some(page_id)) = (page, current_id) else {
        context.insert("gerbi_current_page", &Option::<PageView>::None);
        context.insert("gerbi_placeholders", &HashMap::<String, String>::new());
        return Ok(context);
    };

    let own = contents.page_contents(page_id).await?;
    let mut chain: Vec<Arc<PageContents>> = Vec::new();
    for ancestor in pages.ancestors(page).await? {
        if let Some(id) = ancestor.id {
            chain.push(contents.page_contents(id).await?);
        }
    }

    let mut slugs: Vec<String> = chain
        .iter()
        .map(|c| resolve_content(c, languages, language, content::SLUG, true))
        .collect();
    let slug = resolve_content(&own, languages, language, content::SLUG, true);
    slugs.push(slug.clone());

    let view = PageView {
        id: page_id,
        parent_id: page.parent_id,
        title: resolve_content(&own, languages, language, content::TITLE, true),
        slug,
        url: url_path(&slugs),
        status: page.status,
        calculated_status: page.calculated_status(&settings, now),
        template: page.template.clone(),
    };
    context.insert("gerbi_current_page", &view);

    let nearest_first: Vec<&PageContents> = chain.iter().rev().map(Arc::as_ref).collect();
    let nodes = state.templates.placeholders(template)?;
    let fallback = state.config.placeholder_fallback;

    let mut values: HashMap<String, String> = HashMap::with_capacity(nodes.len());
    for node in &nodes {
        let value = node.resolve(&own, &nearest_first, languages, language, fallback);
        values.insert(node.name.clone(), value);
    }

    for node in nodes.iter().filter(|n| n.parsed) {
        let Some(raw) = values.get(&node.name).filter(|v| !v.is_empty()) else {
            continue;
        };
        match Tera::one_off(raw, &context, false) {
            Ok(rendered) => {
                values.insert(node.name.clone(), rendered);
            }
            Err(e) => {
                tracing::warn!(page_id, placeholder = %node.name, "Failed to render parsed placeholder: {:?}", e);
            }
        }
    }

    context.insert("gerbi_placeholders", &values);
    Ok(context)
}

pub async fn render_template(
    state: &AppState,
    template: &str,
    page: Option<&Page>,
    language: &str,
    user: Option<&User>,
) -> Result<String> {
    let context = build_context(state, template, page, language, user).await?;
    state.templates.render(template, &context)
}

/// A 404 carrying the rendered `404.html` when it can be rendered.
pub async fn not_found(state: &AppState, language: &str, user: Option<&User>) -> AppError {
    let error = AppError::not_found("Page not found");
    match render_template(state, "404.html", None, language, user).await {
        Ok(html) => error.with_page(html),
        Err(e) => {
            tracing::warn!("Failed to render 404.html: {:?}", e);
            error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholders::PlaceholderNode;
    use crate::templates::TemplateEngine;
    use crate::test_helpers::{create_page, create_test_app_state_with};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_render_without_page_never_fails() -> Result<()> {
        let state = create_test_app_state_with(&[(
            "test5.html",
            r#"<p>{% placeholder "body" %}</p>{% if gerbi_current_page %}page{% endif %}"#,
        )])
        .await?;

        let html = render_template(&state, "test5.html", None, "en-us", None).await?;
        assert_eq!(html, "<p></p>");
        Ok(())
    }

    #[tokio::test]
    async fn test_placeholders_follow_language() -> Result<()> {
        let state = create_test_app_state_with(&[(
            "test3.html",
            r#"{% placeholder "title" %}"#,
        )])
        .await?;
        let page = create_page(&state, None, "slug", "title-en-us", PageStatus::Published).await?;
        let id = page.id.unwrap();

        let contents = state.content_repo();
        contents
            .create(&gerbi_core::Content::new(id, "fr-ch", "title", "title-fr-ch"))
            .await?;
        contents.invalidate(id);

        let en = render_template(&state, "test3.html", Some(&page), "en-us", None).await?;
        assert_eq!(en, "title-en-us");
        let fr = render_template(&state, "test3.html", Some(&page), "fr-ch", None).await?;
        assert_eq!(fr, "title-fr-ch");
        Ok(())
    }

    #[tokio::test]
    async fn test_current_page_urls() -> Result<()> {
        let state = create_test_app_state_with(&[(
            "test6.html",
            "t1_{% show_url gerbi_current_page %} t2_{{ gerbi_current_page | page_url }} \
             t4_{% show_slug gerbi_current_page %} t5_{{ gerbi_current_page | page_slug }}",
        )])
        .await?;
        let parent = create_page(&state, None, "parent", "Parent", PageStatus::Published).await?;
        let child = create_page(&state, parent.id, "child", "Child", PageStatus::Published).await?;

        let html = render_template(&state, "test6.html", Some(&child), "en-us", None).await?;
        assert_eq!(
            html,
            "t1_/parent/child/ t2_/parent/child/ t4_child t5_child"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_inherited_and_parsed_placeholders() -> Result<()> {
        let state = create_test_app_state_with(&[(
            "layout.html",
            r#"[{% placeholder "footer" inherited %}][{% placeholder "intro" parsed %}]"#,
        )])
        .await?;
        let parent = create_page(&state, None, "parent", "Parent", PageStatus::Published).await?;
        let child = create_page(&state, parent.id, "child", "Child", PageStatus::Published).await?;

        let contents = state.content_repo();
        PlaceholderNode::new("footer")
            .save(&contents, parent.id.unwrap(), "en-us", "(c) parent")
            .await?;
        PlaceholderNode::new("intro")
            .save(&contents, child.id.unwrap(), "en-us", "lang={{ lang }}")
            .await?;

        let html = render_template(&state, "layout.html", Some(&child), "en-us", None).await?;
        assert_eq!(html, "[(c) parent][lang=en-us]");
        Ok(())
    }

    #[tokio::test]
    async fn test_current_page_in_context() -> Result<()> {
        let state = create_test_app_state_with(&[]).await?;
        let page = create_page(&state, None, "home", "Home", PageStatus::Hidden).await?;

        let context = build_context(&state, "pages/default.html", Some(&page), "fr-ch", None).await?;
        let json = context.into_json();
        assert_eq!(
            json["gerbi_current_page"],
            serde_json::json!({
                "id": page.id,
                "parent_id": null,
                "title": "Home",
                "slug": "home",
                "url": "/home/",
                "status": "hidden",
                "calculated_status": "hidden",
                "template": "pages/default.html",
            })
        );
        assert_eq!(json["lang"], "fr-ch");
        assert_eq!(json["gerbi_placeholders"]["title"], "Home");
        assert_eq!(json["gerbi_placeholders"]["body"], "");
        assert_eq!(json["user"], serde_json::Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() -> Result<()> {
        let state = create_test_app_state_with(&[]).await?;
        let page = create_page(&state, None, "p", "P", PageStatus::Published).await?;
        assert!(render_template(&state, "nope.html", Some(&page), "en-us", None)
            .await
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_renders_template() -> Result<()> {
        let state = create_test_app_state_with(&[]).await?;
        let error = not_found(&state, "en-us", None).await;
        assert_eq!(error.status, axum::http::StatusCode::NOT_FOUND);
        assert!(error.page.unwrap().contains("Page not found"));

        let bare = AppState::new(
            state.db.clone(),
            TemplateEngine::from_sources(&[("404.html", "{{ missing_variable }}")])?,
            state.config.clone(),
        );
        assert!(not_found(&bare, "en-us", None).await.page.is_none());
        Ok(())
    }
}

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
    extract::{Path, State},
    response::{Html, Redirect},
    Form,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gerbi_core::{
    models::content,
    utils::slug::{slugify, validate_slug},
    Page, PageStatus, User,
};
use gerbi_db::{resolve_content, PageContents};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    auth::RequireStaff, error::AppError, template_context::build_context, urls::url_path,
    AppState,
};

const PAGE_LIST_TEMPLATE: &str = "admin/page_list.html";
const PAGE_LIST_URL: &str = "/admin/pages/";

/// One line of the admin page list, in tree order.
#[derive(Debug, Clone, Serialize)]
pub struct AdminPageRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub status: PageStatus,
    pub calculated_status: PageStatus,
    pub template: String,
    pub depth: usize,
}

pub async fn list_pages(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> Result<Html<String>, AppError> {
    let language = state.languages().default_language().to_string();
    let rows = admin_rows(&state, &language).await?;

    let mut context =
        build_context(&state, PAGE_LIST_TEMPLATE, None, &language, Some(&user)).await?;
    context.insert("admin_pages", &rows);
    context.insert("templates", &state.templates.template_names());

    Ok(Html(state.templates.render(PAGE_LIST_TEMPLATE, &context)?))
}

async fn admin_rows(state: &AppState, language: &str) -> anyhow::Result<Vec<AdminPageRow>> {
    let pages = state.page_repo().list_all().await?;
    let contents = state.content_repo();

    let mut loaded: HashMap<i64, Arc<PageContents>> = HashMap::with_capacity(pages.len());
    for id in pages.iter().filter_map(|p| p.id) {
        loaded.insert(id, contents.page_contents(id).await?);
    }

    let mut by_parent: HashMap<Option<i64>, Vec<&Page>> = HashMap::new();
    for page in &pages {
        by_parent.entry(page.parent_id).or_default().push(page);
    }

    let settings = state.publication_settings();
    let now = Utc::now();
    let mut rows = Vec::with_capacity(pages.len());
    // (parent, depth, parent slugs), depth first
    let mut stack: Vec<(&Page, usize, Vec<String>)> = by_parent
        .get(&None)
        .map(|roots| roots.iter().rev().map(|p| (*p, 0, Vec::new())).collect())
        .unwrap_or_default();

    while let Some((page, depth, mut slugs)) = stack.pop() {
        let Some(id) = page.id else { continue };
        let Some(values) = loaded.get(&id) else { continue };
        let languages = state.languages();
        slugs.push(resolve_content(values, languages, language, content::SLUG, true));

        rows.push(AdminPageRow {
            id,
            parent_id: page.parent_id,
            title: resolve_content(values, languages, language, content::TITLE, true),
            url: url_path(&slugs),
            status: page.status,
            calculated_status: page.calculated_status(&settings, now),
            template: page.template.clone(),
            depth,
        });

        if let Some(children) = by_parent.get(&Some(id)) {
            for child in children.iter().rev() {
                stack.push((*child, depth + 1, slugs.clone()));
            }
        }
    }

    Ok(rows)
}

/// Create a page from the add form, then back to the list.
pub async fn add_page(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let page_id = create_page_from_form(&state, &user, &form).await?;
    tracing::info!(page_id, author = %user.username, "Page created");
    Ok(Redirect::to(PAGE_LIST_URL))
}

/// Validate the add form and store the page with its contents.
pub async fn create_page_from_form(
    state: &AppState,
    user: &User,
    form: &HashMap<String, String>,
) -> Result<i64, AppError> {
    let title = raw_field(form, "title").ok_or_else(|| AppError::bad_request("Title is required"))?;
    let language = form_language(state, form);

    let slug = match field(form, "slug") {
        Some(slug) => slug.to_string(),
        None => slugify(title),
    };
    validate_slug(&slug).map_err(|e| AppError::bad_request("Invalid slug").with_details(e))?;

    let parent_id = parse_parent(state, form).await?.flatten();
    ensure_unique_slug(state, parent_id, &slug, None).await?;

    let status = match field(form, "status") {
        Some(status) => parse_status(status)?,
        None => PageStatus::Draft,
    };

    let template = field(form, "template").unwrap_or(state.config.default_template.as_str());
    ensure_template(state, template)?;

    let position = match field(form, "position") {
        Some(position) => parse_position(position)?,
        None => i32::try_from(state.page_repo().list_children(parent_id).await?.len())
            .map_err(|_| AppError::bad_request("Too many sibling pages"))?,
    };

    let mut page = match parent_id {
        Some(parent_id) => Page::new_with_parent(parent_id, template, status),
        None => Page::new(template, status),
    };
    page.author_id = user.id;
    page.position = position;
    page.publication_date = parse_optional_date(form, "publication_date")?.flatten();
    page.publication_end_date = parse_optional_date(form, "publication_end_date")?.flatten();
    page.is_valid()
        .map_err(|e| AppError::bad_request("Invalid page").with_details(e))?;

    let page_id = state.page_repo().create(&page).await?;

    let contents = state.content_repo();
    contents.set_content(page_id, &language, content::TITLE, title).await?;
    contents.set_content(page_id, &language, content::SLUG, &slug).await?;
    save_placeholder_fields(state, page_id, template, &language, form).await?;

    Ok(page_id)
}

/// Update a page from the change form. Only submitted fields change.
pub async fn change_page(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let pages = state.page_repo();
    let mut page = pages
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Page not found"))?;
    let language = form_language(&state, &form);

    if let Some(status) = field(&form, "status") {
        page.status = parse_status(status)?;
    }
    if let Some(template) = field(&form, "template") {
        ensure_template(&state, template)?;
        page.template = template.to_string();
    }
    if let Some(position) = field(&form, "position") {
        page.position = parse_position(position)?;
    }
    if let Some(date) = parse_optional_date(&form, "publication_date")? {
        page.publication_date = date;
    }
    if let Some(date) = parse_optional_date(&form, "publication_end_date")? {
        page.publication_end_date = date;
    }
    if let Some(parent_id) = parse_parent(&state, &form).await? {
        if let Some(parent_id) = parent_id {
            if parent_id == id || pages.is_descendant_of(parent_id, id).await? {
                return Err(AppError::bad_request("A page cannot be moved below itself"));
            }
        }
        page.parent_id = parent_id;
    }

    let slug = field(&form, "slug").map(str::to_string);
    if let Some(slug) = &slug {
        validate_slug(slug).map_err(|e| AppError::bad_request("Invalid slug").with_details(e))?;
    }
    // A move brings every language's slug under the new parent.
    let mut claimed = Vec::new();
    if form.contains_key("parent") {
        for (slug_language, existing) in state.content_repo().slugs_for_page(id).await? {
            if slug.is_none() || slug_language != language {
                claimed.push(existing);
            }
        }
    }
    claimed.extend(slug.iter().cloned());
    for candidate in &claimed {
        ensure_unique_slug(&state, page.parent_id, candidate, Some(id)).await?;
    }

    page.is_valid()
        .map_err(|e| AppError::bad_request("Invalid page").with_details(e))?;
    pages.update(&page).await?;

    let contents = state.content_repo();
    if let Some(title) = raw_field(&form, "title") {
        contents.set_content(id, &language, content::TITLE, title).await?;
    }
    if let Some(slug) = &slug {
        contents.set_content(id, &language, content::SLUG, slug).await?;
    }
    save_placeholder_fields(&state, id, &page.template, &language, &form).await?;

    tracing::info!(page_id = id, author = %user.username, "Page changed");
    Ok(Redirect::to(PAGE_LIST_URL))
}

/// Delete a page together with its subtree.
pub async fn delete_page(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let pages = state.page_repo();
    if pages.find_by_id(id).await?.is_none() {
        return Err(AppError::not_found("Page not found"));
    }

    let removed = pages.subtree_ids(id).await?;
    pages.delete(id).await?;

    let contents = state.content_repo();
    for page_id in &removed {
        contents.forget(*page_id);
    }

    tracing::info!(page_id = id, removed = removed.len(), author = %user.username, "Page deleted");
    Ok(Redirect::to(PAGE_LIST_URL))
}

/// Trimmed, non-empty form value.
fn field<'a>(form: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    form.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Form value as submitted, unless blank.
fn raw_field<'a>(form: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    form.get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn form_language(state: &AppState, form: &HashMap<String, String>) -> String {
    state
        .languages()
        .resolve(field(form, "language"))
        .to_string()
}

fn parse_status(value: &str) -> Result<PageStatus, AppError> {
    value
        .parse()
        .map_err(|e: String| AppError::bad_request("Invalid status").with_details(e))
}

fn parse_position(value: &str) -> Result<i32, AppError> {
    value
        .parse()
        .map_err(|_| AppError::bad_request("Invalid position").with_details(value.to_string()))
}

fn ensure_template(state: &AppState, template: &str) -> Result<(), AppError> {
    if state.templates.has_template(template) {
        Ok(())
    } else {
        Err(AppError::bad_request("Unknown template").with_details(template.to_string()))
    }
}

/// `None` when the form has no `parent` key, `Some(None)` for top level.
async fn parse_parent(
    state: &AppState,
    form: &HashMap<String, String>,
) -> Result<Option<Option<i64>>, AppError> {
    if !form.contains_key("parent") {
        return Ok(None);
    }
    let Some(raw) = field(form, "parent") else {
        return Ok(Some(None));
    };
    let parent_id: i64 = raw
        .parse()
        .map_err(|_| AppError::bad_request("Invalid parent").with_details(raw.to_string()))?;
    if state.page_repo().find_by_id(parent_id).await?.is_none() {
        return Err(AppError::bad_request("Parent page not found"));
    }
    Ok(Some(Some(parent_id)))
}

/// `None` when the field is absent, `Some(None)` when submitted empty.
fn parse_optional_date(
    form: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Option<DateTime<Utc>>>, AppError> {
    if !form.contains_key(name) {
        return Ok(None);
    }
    match field(form, name) {
        None => Ok(Some(None)),
        Some(raw) => parse_date(raw)
            .map(|date| Some(Some(date)))
            .ok_or_else(|| AppError::bad_request("Invalid date").with_details(raw.to_string())),
    }
}

/// RFC 3339, or a naive date/datetime read as UTC.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Siblings may not share a slug in any language.
async fn ensure_unique_slug(
    state: &AppState,
    parent_id: Option<i64>,
    slug: &str,
    exclude: Option<i64>,
) -> Result<(), AppError> {
    let contents = state.content_repo();
    for sibling in state.page_repo().list_children(parent_id).await? {
        let Some(sibling_id) = sibling.id else { continue };
        if Some(sibling_id) == exclude {
            continue;
        }
        let taken = contents
            .slugs_for_page(sibling_id)
            .await?
            .into_iter()
            .any(|(_, existing)| existing == slug);
        if taken {
            return Err(AppError::bad_request("Slug already used by a sibling page")
                .with_details(slug.to_string()));
        }
    }
    Ok(())
}

async fn save_placeholder_fields(
    state: &AppState,
    page_id: i64,
    template: &str,
    language: &str,
    form: &HashMap<String, String>,
) -> Result<(), AppError> {
    let contents = state.content_repo();
    for node in state.templates.placeholders(template)? {
        if node.name == content::TITLE || node.name == content::SLUG {
            continue;
        }
        if let Some(value) = form.get(&node.name) {
            node.save(&contents, page_id, language, value).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .map(|n| n.and_utc());
        assert_eq!(parse_date("2024-03-01T12:30:00Z"), expected);
        assert_eq!(parse_date("2024-03-01T14:30:00+02:00"), expected);
        assert_eq!(parse_date("2024-03-01T12:30"), expected);
        assert_eq!(parse_date("2024-03-01 12:30:00"), expected);
        assert_eq!(
            parse_date("2024-03-01"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc())
        );
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_field_trims_and_skips_empty() {
        let mut form = HashMap::new();
        form.insert("title".to_string(), "  Hello ".to_string());
        form.insert("slug".to_string(), "   ".to_string());
        assert_eq!(field(&form, "title"), Some("Hello"));
        assert_eq!(field(&form, "slug"), None);
        assert_eq!(field(&form, "missing"), None);
        assert_eq!(raw_field(&form, "title"), Some("  Hello "));
        assert_eq!(raw_field(&form, "slug"), None);
    }

    #[test]
    fn test_parse_optional_date_distinguishes_absent_and_empty() {
        let mut form = HashMap::new();
        assert!(parse_optional_date(&form, "publication_date").unwrap().is_none());
        form.insert("publication_date".to_string(), String::new());
        assert_eq!(parse_optional_date(&form, "publication_date").unwrap(), Some(None));
        form.insert("publication_date".to_string(), "nope".to_string());
        assert!(parse_optional_date(&form, "publication_date").is_err());
    }
}

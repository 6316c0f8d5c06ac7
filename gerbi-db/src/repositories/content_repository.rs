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

use anyhow::{Context, Result};
use gerbi_core::models::content;
use gerbi_core::{Content, LanguageSettings};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::cache::{PageCache, PageContents};
use crate::rows::parse_datetime;

type ContentRow = (i64, i64, String, String, String, String);

fn content_from_row(row: ContentRow) -> Result<Content> {
    let (id, page_id, language, content_type, body, created_at) = row;
    Ok(Content {
        id: Some(id),
        page_id,
        language,
        content_type,
        body,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

/// Localized page values, read through the shared [`PageCache`].
///
/// Rows are append-only. The newest row of a `(page, language, type)`
/// triple is the current value and older rows are kept as history.
#[derive(Clone)]
pub struct ContentRepository {
    pool: SqlitePool,
    cache: PageCache,
    languages: LanguageSettings,
}

impl ContentRepository {
    pub fn new(pool: SqlitePool, cache: PageCache, languages: LanguageSettings) -> Self {
        Self {
            pool,
            cache,
            languages,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn languages(&self) -> &LanguageSettings {
        &self.languages
    }

    /// Insert a revision as is.
    ///
    /// The page cache is left untouched: call [`ContentRepository::invalidate`]
    /// before expecting reads to see the new value.
    pub async fn create(&self, content: &Content) -> Result<i64> {
        content
            .is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid content: {}", e))?;

        let result = sqlx::query(
            r#"
            INSERT INTO contents (page_id, language, content_type, body, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(content.page_id)
        .bind(&content.language)
        .bind(&content.content_type)
        .bind(&content.body)
        .bind(content.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create content")?;

        Ok(result.last_insert_rowid())
    }

    /// Write a value and invalidate the page. Returns `false` when the value
    /// equals the current one and nothing was written.
    pub async fn set_content(
        &self,
        page_id: i64,
        language: &str,
        content_type: &str,
        body: &str,
    ) -> Result<bool> {
        if let Some(current) = self.find_latest(page_id, language, content_type).await? {
            if current.body == body {
                return Ok(false);
            }
        }

        self.create(&Content::new(page_id, language, content_type, body))
            .await?;
        self.invalidate(page_id);

        tracing::debug!(page_id, language, content_type, "Content updated");
        Ok(true)
    }

    /// Current revision straight from the database, bypassing the cache.
    pub async fn find_latest(
        &self,
        page_id: i64,
        language: &str,
        content_type: &str,
    ) -> Result<Option<Content>> {
        let row = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, page_id, language, content_type, body, created_at
            FROM contents
            WHERE page_id = ? AND language = ? AND content_type = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(page_id)
        .bind(language)
        .bind(content_type)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find latest content")?;

        row.map(content_from_row).transpose()
    }

    /// Every revision of a value, oldest first.
    pub async fn history(
        &self,
        page_id: i64,
        language: &str,
        content_type: &str,
    ) -> Result<Vec<Content>> {
        let rows = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, page_id, language, content_type, body, created_at
            FROM contents
            WHERE page_id = ? AND language = ? AND content_type = ?
            ORDER BY id
            "#,
        )
        .bind(page_id)
        .bind(language)
        .bind(content_type)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list content history")?;

        rows.into_iter().map(content_from_row).collect()
    }

    /// All current values of a page, loaded once and then served from cache.
    pub async fn page_contents(&self, page_id: i64) -> Result<Arc<PageContents>> {
        if let Some(cached) = self.cache.get(page_id) {
            return Ok(cached);
        }

        let generation = self.cache.generation(page_id);
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT language, content_type, body
            FROM contents
            WHERE page_id = ?
            ORDER BY id
            "#,
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load page contents")?;

        let contents = Arc::new(PageContents::from_revisions(rows));
        self.cache.store(page_id, generation, Arc::clone(&contents));
        Ok(contents)
    }

    /// Current value of `content_type` in `language`.
    ///
    /// Missing values are an empty string. With `fallback`, an empty or
    /// missing value is looked up in the other languages following
    /// [`LanguageSettings::fallback_order`].
    pub async fn get_content(
        &self,
        page_id: i64,
        language: &str,
        content_type: &str,
        fallback: bool,
    ) -> Result<String> {
        let contents = self.page_contents(page_id).await?;
        Ok(resolve_content(&contents, &self.languages, language, content_type, fallback))
    }

    /// Newest current slug revision whose body is `slug`, in any language.
    pub async fn get_content_slug_by_slug(&self, slug: &str) -> Result<Option<Content>> {
        let row = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT c.id, c.page_id, c.language, c.content_type, c.body, c.created_at
            FROM contents c
            WHERE c.content_type = ? AND c.body = ?
              AND c.id = (
                SELECT MAX(l.id) FROM contents l
                WHERE l.page_id = c.page_id AND l.language = c.language AND l.content_type = c.content_type
              )
            ORDER BY c.id DESC
            LIMIT 1
            "#,
        )
        .bind(content::SLUG)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find content by slug")?;

        row.map(content_from_row).transpose()
    }

    /// Pages that currently use `slug` in at least one language.
    pub async fn page_ids_with_slug(&self, slug: &str) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT c.page_id
            FROM contents c
            WHERE c.content_type = ? AND c.body = ?
              AND c.id = (
                SELECT MAX(l.id) FROM contents l
                WHERE l.page_id = c.page_id AND l.language = c.language AND l.content_type = c.content_type
              )
            ORDER BY c.page_id
            "#,
        )
        .bind(content::SLUG)
        .bind(slug)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find pages by slug")?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Current non-empty slugs of a page, one per language.
    pub async fn slugs_for_page(&self, page_id: i64) -> Result<Vec<(String, String)>> {
        let contents = self.page_contents(page_id).await?;
        let mut slugs: Vec<(String, String)> = contents
            .values_of(content::SLUG)
            .filter(|(_, slug)| !slug.is_empty())
            .map(|(language, slug)| (language.to_string(), slug.to_string()))
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    pub async fn languages_for_page(&self, page_id: i64) -> Result<Vec<String>> {
        Ok(self.page_contents(page_id).await?.languages())
    }

    /// Drop the cached values of a page in every language.
    pub fn invalidate(&self, page_id: i64) {
        self.cache.invalidate(page_id);
    }

    /// Release everything cached for a page that no longer exists.
    pub fn forget(&self, page_id: i64) {
        self.cache.forget(page_id);
    }
}

/// Lookup with optional language fallback over already loaded contents.
pub fn resolve_content(
    contents: &PageContents,
    languages: &LanguageSettings,
    language: &str,
    content_type: &str,
    fallback: bool,
) -> String {
    match contents.get(language, content_type) {
        Some(value) if !value.is_empty() => return value.to_string(),
        _ if !fallback => return String::new(),
        _ => {}
    }

    let stored = contents.languages();
    languages
        .fallback_order(language, &stored)
        .into_iter()
        .filter_map(|candidate| contents.get(candidate, content_type))
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

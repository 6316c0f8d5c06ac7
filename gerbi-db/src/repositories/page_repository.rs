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
use chrono::Utc;
use gerbi_core::{Page, PageStatus};
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::rows::{parse_datetime, parse_optional_datetime};

type PageRow = (
    i64,
    Option<i64>,
    Option<i64>,
    String,
    String,
    i32,
    Option<String>,
    Option<String>,
    String,
    String,
);

const PAGE_COLUMNS: &str = "id, parent_id, author_id, status, template, position, publication_date, publication_end_date, created_at, updated_at";

fn page_from_row(row: PageRow) -> Result<Page> {
    let (
        id,
        parent_id,
        author_id,
        status,
        template,
        position,
        publication_date,
        publication_end_date,
        created_at,
        updated_at,
    ) = row;

    let status: PageStatus = status
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .with_context(|| format!("Invalid status stored for page {}", id))?;

    Ok(Page {
        id: Some(id),
        parent_id,
        author_id,
        status,
        template,
        position,
        publication_date: parse_optional_datetime(publication_date, "publication_date")?,
        publication_end_date: parse_optional_datetime(publication_end_date, "publication_end_date")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub struct PageRepository {
    pool: SqlitePool,
}

impl PageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, page: &Page) -> Result<i64> {
        page.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page: {}", e))?;

        let result = sqlx::query(
            r#"
            INSERT INTO pages (parent_id, author_id, status, template, position, publication_date, publication_end_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(page.parent_id)
        .bind(page.author_id)
        .bind(page.status.as_str())
        .bind(&page.template)
        .bind(page.position)
        .bind(page.publication_date)
        .bind(page.publication_end_date)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create page")?;

        let id = result.last_insert_rowid();
        tracing::debug!(page_id = id, parent_id = ?page.parent_id, "Page created");
        Ok(id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE id = ?",
            PAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page by id")?;

        row.map(page_from_row).transpose()
    }

    /// Every page, tree order is not guaranteed: sorted by parent, position, id.
    pub async fn list_all(&self) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages ORDER BY parent_id IS NOT NULL, parent_id, position, id",
            PAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pages")?;

        rows.into_iter().map(page_from_row).collect()
    }

    /// Children of `parent_id`, or top-level pages for `None`, by position.
    pub async fn list_children(&self, parent_id: Option<i64>) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE parent_id IS ? ORDER BY position, id",
            PAGE_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list child pages")?;

        rows.into_iter().map(page_from_row).collect()
    }

    pub async fn list_root_pages(&self) -> Result<Vec<Page>> {
        self.list_children(None).await
    }

    /// The first top-level page.
    pub async fn get_home_page(&self) -> Result<Option<Page>> {
        Ok(self.list_root_pages().await?.into_iter().next())
    }

    /// Ancestors of a page, top-level page first, the page itself excluded.
    pub async fn ancestors(&self, page: &Page) -> Result<Vec<Page>> {
        let mut chain = Vec::new();
        let mut seen: HashSet<i64> = page.id.into_iter().collect();
        let mut next = page.parent_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                tracing::warn!(page_id = ?page.id, parent_id, "Cycle detected in page tree");
                break;
            }
            let parent = self
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Parent page {} not found", parent_id))?;
            next = parent.parent_id;
            chain.push(parent);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Whether `page_id` sits somewhere below `ancestor_id`.
    pub async fn is_descendant_of(&self, page_id: i64, ancestor_id: i64) -> Result<bool> {
        let page = match self.find_by_id(page_id).await? {
            Some(page) => page,
            None => return Ok(false),
        };
        let ancestors = self.ancestors(&page).await?;
        Ok(ancestors.iter().any(|a| a.id == Some(ancestor_id)))
    }

    pub async fn update(&self, page: &Page) -> Result<()> {
        let id = page
            .id
            .ok_or_else(|| anyhow::anyhow!("Cannot update page without ID"))?;
        page.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page: {}", e))?;

        if let Some(parent_id) = page.parent_id {
            if self.is_descendant_of(parent_id, id).await? {
                return Err(anyhow::anyhow!(
                    "Cannot move page {} below its own descendant {}",
                    id,
                    parent_id
                ));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE pages
            SET parent_id = ?, author_id = ?, status = ?, template = ?, position = ?,
                publication_date = ?, publication_end_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(page.parent_id)
        .bind(page.author_id)
        .bind(page.status.as_str())
        .bind(&page.template)
        .bind(page.position)
        .bind(page.publication_date)
        .bind(page.publication_end_date)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update page")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Page with id {} not found", id));
        }

        Ok(())
    }

    /// Delete a page; children and contents go with it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete page")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Page with id {} not found", id));
        }

        tracing::debug!(page_id = id, "Page deleted");
        Ok(())
    }

    /// Ids of a page and everything below it.
    pub async fn subtree_ids(&self, id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT id FROM pages WHERE id = ?
                UNION
                SELECT p.id FROM pages p JOIN subtree s ON p.parent_id = s.id
            )
            SELECT id FROM subtree
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to collect page subtree")?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::languages::validate_language_code;

/// Content type holding a page's title.
pub const TITLE: &str = "title";
/// Content type holding a page's URL segment.
pub const SLUG: &str = "slug";

/// One revision of a localized value attached to a page.
///
/// Revisions are never updated in place: the newest row for a
/// `(page_id, language, content_type)` triple is the current value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub id: Option<i64>,
    pub page_id: i64,
    pub language: String,
    pub content_type: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Content {
    pub fn new(
        page_id: i64,
        language: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            page_id,
            language: language.into(),
            content_type: content_type.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    pub fn validate_content_type(content_type: &str) -> Result<(), String> {
        if content_type.is_empty() {
            return Err("Content type cannot be empty".to_string());
        }

        if content_type.len() > 100 {
            return Err("Content type cannot exceed 100 characters".to_string());
        }

        if content_type.chars().any(char::is_whitespace) {
            return Err("Content type cannot contain whitespace".to_string());
        }

        Ok(())
    }

    pub fn is_valid(&self) -> Result<(), String> {
        if self.page_id <= 0 {
            return Err("Page ID must be positive".to_string());
        }
        validate_language_code(&self.language)?;
        Self::validate_content_type(&self.content_type)?;
        Ok(())
    }
}

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
use gerbi_core::{models::content, LanguageSettings, Page};
use gerbi_db::{ContentRepository, PageRepository};

/// `/a/b/c/` from a list of slugs; `/` for none.
pub fn url_path<S: AsRef<str>>(slugs: &[S]) -> String {
    let mut path = String::from("/");
    for slug in slugs {
        path.push_str(slug.as_ref());
        path.push('/');
    }
    path
}

/// Non-empty segments of a request path.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Full URL path of a page in `language`, with slug fallback.
pub async fn page_url(
    pages: &PageRepository,
    contents: &ContentRepository,
    page: &Page,
    language: &str,
) -> Result<String> {
    let mut slugs = Vec::new();
    for ancestor in pages.ancestors(page).await? {
        if let Some(id) = ancestor.id {
            slugs.push(contents.get_content(id, language, content::SLUG, true).await?);
        }
    }
    if let Some(id) = page.id {
        slugs.push(contents.get_content(id, language, content::SLUG, true).await?);
    }
    Ok(url_path(&slugs))
}

/// Find the page addressed by `path`.
///
/// Every segment must be a current slug (in any language) of the page at
/// the same depth of the chain, so `/toto/page1/` does not reach a
/// top-level `page1`. The empty path is the first top-level page.
pub async fn resolve_path(
    pages: &PageRepository,
    contents: &ContentRepository,
    path: &str,
) -> Result<Option<Page>> {
    let segments = path_segments(path);
    let Some((last, parents)) = segments.split_last() else {
        return pages.get_home_page().await;
    };

    'candidates: for page_id in contents.page_ids_with_slug(last).await? {
        let Some(page) = pages.find_by_id(page_id).await? else {
            continue;
        };
        let ancestors = pages.ancestors(&page).await?;
        if ancestors.len() != parents.len() {
            continue;
        }
        for (ancestor, segment) in ancestors.iter().zip(parents) {
            let Some(ancestor_id) = ancestor.id else {
                continue 'candidates;
            };
            let slugs = contents.slugs_for_page(ancestor_id).await?;
            if !slugs.iter().any(|(_, slug)| slug == segment) {
                continue 'candidates;
            }
        }
        return Ok(Some(page));
    }

    Ok(None)
}

/// Language for a request: `?lang=` when allowed and configured, then
/// `Accept-Language`, then the default language.
pub fn request_language(
    languages: &LanguageSettings,
    query_lang: Option<&str>,
    accept_language: Option<&str>,
) -> String {
    if let Some(wanted) = query_lang {
        if languages.is_supported(wanted) {
            return languages.resolve(Some(wanted)).to_string();
        }
    }

    accept_language
        .and_then(|header| languages.negotiate(header))
        .unwrap_or(languages.default_language())
        .to_string()
}

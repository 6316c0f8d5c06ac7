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
use chrono::{DateTime, Utc};
use gerbi_core::{models::content, Page, PageStatus, PublicationSettings};
use gerbi_db::{resolve_content, ContentRepository, PageContents, PageRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::urls::url_path;

/// One page of the site tree as exposed to templates (`gerbi_menu`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuNode {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub url: String,
    /// Status after publication dates are applied.
    pub status: PageStatus,
    /// Shown in menus: published, with every ancestor published too.
    pub listed: bool,
    pub current: bool,
    pub children: Vec<MenuNode>,
}

/// Inputs that decide which pages a visitor gets to see.
#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    pub viewer_is_staff: bool,
    pub settings: PublicationSettings,
    pub now: DateTime<Utc>,
}

/// Build the page tree visible to a viewer, in `language`.
///
/// Drafts (after date rules) only appear for staff, together with their
/// subtree. Titles and slugs use language fallback.
pub async fn build_menu(
    pages: &PageRepository,
    contents: &ContentRepository,
    language: &str,
    visibility: Visibility,
    current_page: Option<i64>,
) -> Result<Vec<MenuNode>> {
    let all = pages.list_all().await?;

    let mut loaded: HashMap<i64, Arc<PageContents>> = HashMap::with_capacity(all.len());
    for page in &all {
        if let Some(id) = page.id {
            loaded.insert(id, contents.page_contents(id).await?);
        }
    }

    let mut by_parent: HashMap<Option<i64>, Vec<&Page>> = HashMap::new();
    for page in &all {
        by_parent.entry(page.parent_id).or_default().push(page);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|p| (p.position, p.id));
    }

    let tree = TreeBuilder {
        by_parent: &by_parent,
        loaded: &loaded,
        contents,
        language,
        visibility,
        current_page,
    };
    Ok(tree.children_of(None, &[], true))
}

struct TreeBuilder<'a> {
    by_parent: &'a HashMap<Option<i64>, Vec<&'a Page>>,
    loaded: &'a HashMap<i64, Arc<PageContents>>,
    contents: &'a ContentRepository,
    language: &'a str,
    visibility: Visibility,
    current_page: Option<i64>,
}

impl TreeBuilder<'_> {
    fn children_of(&self, parent: Option<i64>, parent_slugs: &[String], parent_listed: bool) -> Vec<MenuNode> {
        let Some(children) = self.by_parent.get(&parent) else {
            return Vec::new();
        };

        let Visibility {
            viewer_is_staff,
            settings,
            now,
        } = self.visibility;

        children
            .iter()
            .filter(|page| page.is_visible_to(viewer_is_staff, &settings, now))
            .filter_map(|page| {
                let id = page.id?;
                let values = self.loaded.get(&id)?;
                let languages = self.contents.languages();
                let title = resolve_content(values, languages, self.language, content::TITLE, true);
                let slug = resolve_content(values, languages, self.language, content::SLUG, true);

                let mut slugs = parent_slugs.to_vec();
                slugs.push(slug.clone());
                let listed = parent_listed && page.is_listed(&settings, now);

                Some(MenuNode {
                    id,
                    title,
                    url: url_path(&slugs),
                    slug,
                    status: page.calculated_status(&settings, now),
                    listed,
                    current: self.current_page == Some(id),
                    children: self.children_of(Some(id), &slugs, listed),
                })
            })
            .collect()
    }
}

/// Depth-first search by page id.
pub fn find_by_id(nodes: &[MenuNode], id: i64) -> Option<&MenuNode> {
    nodes.iter().find_map(|node| {
        if node.id == id {
            Some(node)
        } else {
            find_by_id(&node.children, id)
        }
    })
}

/// Depth-first search by slug, shallow pages first among equals.
pub fn find_by_slug<'a>(nodes: &'a [MenuNode], slug: &str) -> Option<&'a MenuNode> {
    nodes
        .iter()
        .find(|node| node.slug == slug)
        .or_else(|| nodes.iter().find_map(|node| find_by_slug(&node.children, slug)))
}

/// Nested `<ul>` of the listed pages among `nodes`. Empty when none is listed.
pub fn render_menu(nodes: &[MenuNode]) -> String {
    let listed: Vec<&MenuNode> = nodes.iter().filter(|n| n.listed).collect();
    if listed.is_empty() {
        return String::new();
    }

    let mut html = String::from("<ul class=\"gerbi-menu\">");
    for node in listed {
        if node.current {
            html.push_str("<li class=\"selected\">");
        } else {
            html.push_str("<li>");
        }
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&node.url),
            html_escape::encode_text(&node.title)
        ));
        html.push_str(&render_menu(&node.children));
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use gerbi_core::LanguageSettings;
    use gerbi_db::{init_database, PageCache};
    use pretty_assertions::assert_eq;

    fn node(id: i64, slug: &str, listed: bool, children: Vec<MenuNode>) -> MenuNode {
        MenuNode {
            id,
            title: format!("{} & co", slug),
            slug: slug.to_string(),
            url: format!("/{}/", slug),
            status: if listed { PageStatus::Published } else { PageStatus::Hidden },
            listed,
            current: false,
            children,
        }
    }

    fn visibility(viewer_is_staff: bool) -> Visibility {
        Visibility {
            viewer_is_staff,
            settings: PublicationSettings::default(),
            now: Utc::now(),
        }
    }

    #[test]
    fn test_render_menu_skips_unlisted_and_escapes() {
        let tree = vec![
            node(1, "home", true, vec![node(3, "child", true, vec![])]),
            node(2, "secret", false, vec![]),
        ];
        assert_eq!(
            render_menu(&tree),
            "<ul class=\"gerbi-menu\"><li><a href=\"/home/\">home &amp; co</a>\
             <ul class=\"gerbi-menu\"><li><a href=\"/child/\">child &amp; co</a></li></ul></li></ul>"
        );
        assert_eq!(render_menu(&[node(2, "secret", false, vec![])]), "");
        assert_eq!(render_menu(&[]), "");
    }

    #[test]
    fn test_find_helpers() {
        let tree = vec![node(1, "home", true, vec![node(3, "child", false, vec![])])];
        assert_eq!(find_by_id(&tree, 3).map(|n| n.slug.as_str()), Some("child"));
        assert!(find_by_id(&tree, 9).is_none());
        assert_eq!(find_by_slug(&tree, "child").map(|n| n.id), Some(3));
        assert!(find_by_slug(&tree, "wrong-slug").is_none());
    }

    #[tokio::test]
    async fn test_build_menu_hides_drafts_from_visitors() -> Result<()> {
        let pool = init_database("sqlite::memory:").await?;
        let pages = PageRepository::new(pool.clone());
        let contents = ContentRepository::new(pool, PageCache::new(), LanguageSettings::default());

        let home = pages.create(&Page::new("t.html", PageStatus::Published)).await?;
        let draft = pages
            .create(&Page::new_with_parent(home, "t.html", PageStatus::Draft))
            .await?;
        let under_draft = pages
            .create(&Page::new_with_parent(draft, "t.html", PageStatus::Published))
            .await?;
        let hidden = pages
            .create(&Page::new_with_parent(home, "t.html", PageStatus::Hidden))
            .await?;
        for (id, slug) in [(home, "home"), (draft, "draft"), (under_draft, "deep"), (hidden, "hidden")] {
            contents.set_content(id, "en-us", content::SLUG, slug).await?;
            contents.set_content(id, "en-us", content::TITLE, slug).await?;
        }
        contents.set_content(home, "fr-ch", content::TITLE, "accueil").await?;

        let tree = build_menu(&pages, &contents, "fr-ch", visibility(false), Some(hidden)).await?;
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].title, "accueil");
        let children: Vec<&str> = tree[0].children.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(children, vec!["hidden"]);
        assert!(!tree[0].children[0].listed);
        assert!(tree[0].children[0].current);
        assert_eq!(tree[0].children[0].url, "/home/hidden/");

        let staff_tree = build_menu(&pages, &contents, "en-us", visibility(true), None).await?;
        let draft_node = find_by_id(&staff_tree, draft).expect("staff sees drafts");
        assert!(!draft_node.listed);
        assert_eq!(draft_node.status, PageStatus::Draft);
        let deep = find_by_id(&staff_tree, under_draft).expect("subtree of draft");
        assert!(!deep.listed);
        assert_eq!(deep.url, "/home/draft/deep/");
        Ok(())
    }
}

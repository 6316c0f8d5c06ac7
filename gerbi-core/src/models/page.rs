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
use std::fmt;
use std::str::FromStr;

/// Publication state stored on a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Visible to everyone and listed in menus.
    Published,
    /// Visible to everyone but left out of menus.
    Hidden,
    /// Only staff users can see it.
    Draft,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Published => "published",
            PageStatus::Hidden => "hidden",
            PageStatus::Draft => "draft",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "published" => Ok(PageStatus::Published),
            "hidden" => Ok(PageStatus::Hidden),
            "draft" => Ok(PageStatus::Draft),
            other => Err(format!("Invalid page status: {}", other)),
        }
    }
}

/// Site-wide switches that let scheduled dates override a page's status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicationSettings {
    pub show_start_date: bool,
    pub show_end_date: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub author_id: Option<i64>,
    pub status: PageStatus,
    pub template: String,
    pub position: i32,
    pub publication_date: Option<DateTime<Utc>>,
    pub publication_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(template: impl Into<String>, status: PageStatus) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            parent_id: None,
            author_id: None,
            status,
            template: template.into(),
            position: 0,
            publication_date: None,
            publication_end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_with_parent(
        parent_id: i64,
        template: impl Into<String>,
        status: PageStatus,
    ) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new(template, status)
        }
    }

    /// Status once scheduled dates are taken into account.
    ///
    /// A draft stays a draft whatever the dates say. With `show_start_date`
    /// a page whose publication date is still ahead is a draft, and with
    /// `show_end_date` a page whose end date has passed is a draft.
    pub fn calculated_status(
        &self,
        settings: &PublicationSettings,
        now: DateTime<Utc>,
    ) -> PageStatus {
        if self.status == PageStatus::Draft {
            return PageStatus::Draft;
        }

        if settings.show_start_date {
            if let Some(start) = self.publication_date {
                if start > now {
                    return PageStatus::Draft;
                }
            }
        }

        if settings.show_end_date {
            if let Some(end) = self.publication_end_date {
                if end <= now {
                    return PageStatus::Draft;
                }
            }
        }

        self.status
    }

    /// Whether a viewer may open this page. Staff see everything.
    pub fn is_visible_to(
        &self,
        viewer_is_staff: bool,
        settings: &PublicationSettings,
        now: DateTime<Utc>,
    ) -> bool {
        viewer_is_staff || self.calculated_status(settings, now) != PageStatus::Draft
    }

    /// Whether the page belongs in navigation menus.
    pub fn is_listed(&self, settings: &PublicationSettings, now: DateTime<Utc>) -> bool {
        self.calculated_status(settings, now) == PageStatus::Published
    }

    pub fn validate_template(&self) -> Result<(), String> {
        if self.template.trim().is_empty() {
            return Err("Template cannot be empty".to_string());
        }

        if self.template.len() > 255 {
            return Err("Template cannot exceed 255 characters".to_string());
        }

        if self.template.contains("..") || self.template.starts_with('/') {
            return Err("Template must be a relative name inside the templates directory".to_string());
        }

        Ok(())
    }

    pub fn validate_dates(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.publication_date, self.publication_end_date) {
            if end < start {
                return Err("Publication end date cannot precede the publication date".to_string());
            }
        }
        Ok(())
    }

    pub fn validate_parent(&self) -> Result<(), String> {
        if let (Some(id), Some(parent_id)) = (self.id, self.parent_id) {
            if id == parent_id {
                return Err("A page cannot be its own parent".to_string());
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> Result<(), String> {
        self.validate_template()?;
        self.validate_dates()?;
        self.validate_parent()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn settings(show_start_date: bool, show_end_date: bool) -> PublicationSettings {
        PublicationSettings {
            show_start_date,
            show_end_date,
        }
    }

    #[test]
    fn test_new_page_defaults() {
        let before = Utc::now();
        let page = Page::new("pages/default.html", PageStatus::Draft);

        assert_eq!(page.id, None);
        assert_eq!(page.parent_id, None);
        assert_eq!(page.author_id, None);
        assert_eq!(page.status, PageStatus::Draft);
        assert_eq!(page.template, "pages/default.html");
        assert_eq!(page.position, 0);
        assert_eq!(page.publication_date, None);
        assert_eq!(page.publication_end_date, None);
        assert!(page.created_at >= before);
        assert_eq!(page.created_at, page.updated_at);
    }

    #[test]
    fn test_new_with_parent() {
        let page = Page::new_with_parent(7, "pages/default.html", PageStatus::Published);
        assert_eq!(page.parent_id, Some(7));
        assert_eq!(page.status, PageStatus::Published);
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [PageStatus::Published, PageStatus::Hidden, PageStatus::Draft] {
            assert_eq!(status.as_str().parse::<PageStatus>(), Ok(status));
        }
        assert_eq!(" Draft ".parse::<PageStatus>(), Ok(PageStatus::Draft));
        assert!("archived".parse::<PageStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PageStatus::Hidden).unwrap();
        assert_eq!(json, "\"hidden\"");
    }

    #[test]
    fn test_draft_stays_draft_with_start_date_enabled() {
        let page = Page::new("pages/default.html", PageStatus::Draft);
        let status = page.calculated_status(&settings(true, false), Utc::now());
        assert_eq!(status, PageStatus::Draft);
    }

    #[test]
    fn test_draft_with_past_publication_date_stays_draft() {
        let now = Utc::now();
        let mut page = Page::new("pages/default.html", PageStatus::Draft);
        page.publication_date = Some(now - Duration::days(3));
        assert_eq!(
            page.calculated_status(&settings(true, true), now),
            PageStatus::Draft
        );
    }

    #[test]
    fn test_future_publication_date_only_counts_when_enabled() {
        let now = Utc::now();
        let mut page = Page::new("pages/default.html", PageStatus::Published);
        page.publication_date = Some(now + Duration::days(1));

        assert_eq!(
            page.calculated_status(&settings(false, false), now),
            PageStatus::Published
        );
        assert_eq!(
            page.calculated_status(&settings(true, false), now),
            PageStatus::Draft
        );
    }

    #[test]
    fn test_past_publication_date_keeps_status() {
        let now = Utc::now();
        let mut page = Page::new("pages/default.html", PageStatus::Hidden);
        page.publication_date = Some(now - Duration::hours(1));
        assert_eq!(
            page.calculated_status(&settings(true, false), now),
            PageStatus::Hidden
        );
    }

    #[test]
    fn test_expired_page_only_counts_when_enabled() {
        let now = Utc::now();
        let mut page = Page::new("pages/default.html", PageStatus::Published);
        page.publication_end_date = Some(now - Duration::minutes(5));

        assert_eq!(
            page.calculated_status(&settings(false, false), now),
            PageStatus::Published
        );
        assert_eq!(
            page.calculated_status(&settings(false, true), now),
            PageStatus::Draft
        );
    }

    #[test]
    fn test_visibility_gate() {
        let now = Utc::now();
        let no_dates = PublicationSettings::default();

        let draft = Page::new("pages/default.html", PageStatus::Draft);
        assert!(!draft.is_visible_to(false, &no_dates, now));
        assert!(draft.is_visible_to(true, &no_dates, now));

        let hidden = Page::new("pages/default.html", PageStatus::Hidden);
        assert!(hidden.is_visible_to(false, &no_dates, now));
        assert!(!hidden.is_listed(&no_dates, now));

        let published = Page::new("pages/default.html", PageStatus::Published);
        assert!(published.is_visible_to(false, &no_dates, now));
        assert!(published.is_listed(&no_dates, now));
    }

    #[test]
    fn test_validate_template() {
        let mut page = Page::new("pages/default.html", PageStatus::Draft);
        assert!(page.validate_template().is_ok());

        page.template = "   ".to_string();
        assert!(page.validate_template().is_err());

        page.template = "../secrets.html".to_string();
        assert!(page.validate_template().is_err());

        page.template = "/etc/passwd".to_string();
        assert!(page.validate_template().is_err());
    }

    #[test]
    fn test_validate_dates() {
        let now = Utc::now();
        let mut page = Page::new("pages/default.html", PageStatus::Published);
        page.publication_date = Some(now);
        page.publication_end_date = Some(now + Duration::days(1));
        assert!(page.validate_dates().is_ok());

        page.publication_end_date = Some(now - Duration::days(1));
        assert_eq!(
            page.validate_dates().unwrap_err(),
            "Publication end date cannot precede the publication date"
        );
    }

    #[test]
    fn test_validate_parent() {
        let mut page = Page::new_with_parent(3, "pages/default.html", PageStatus::Draft);
        page.id = Some(4);
        assert!(page.is_valid().is_ok());

        page.parent_id = Some(4);
        assert_eq!(page.is_valid().unwrap_err(), "A page cannot be its own parent");
    }
}

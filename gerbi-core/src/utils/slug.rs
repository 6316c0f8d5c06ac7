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

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest slug produced by [`slugify`] and accepted by [`validate_slug`].
pub const MAX_SLUG_LENGTH: usize = 100;

static SEPARATOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]+").expect("Failed to compile slug separator regex"));

static VALID_SLUG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(?:-[a-z0-9_]+)*$").expect("Failed to compile slug validation regex")
});

/// Build a URL segment from a page title.
///
/// Runs of anything that is not a lowercase ASCII letter, digit or underscore
/// collapse into a single hyphen. An empty result becomes `page`.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let mut slug = SEPARATOR_REGEX
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string();

    if slug.len() > MAX_SLUG_LENGTH {
        slug = slug
            .chars()
            .take(MAX_SLUG_LENGTH)
            .collect::<String>()
            .trim_end_matches('-')
            .to_string();
    }

    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

/// Check that a slug can be used as a single path segment.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug cannot be empty".to_string());
    }

    if slug.len() > MAX_SLUG_LENGTH {
        return Err(format!(
            "Slug cannot exceed {} characters",
            MAX_SLUG_LENGTH
        ));
    }

    if !VALID_SLUG_REGEX.is_match(slug) {
        return Err(
            "Slug can only contain lowercase letters, numbers, underscores and single hyphens"
                .to_string(),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic_titles() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("test-162-title"), "test-162-title");
        assert_eq!(slugify("title-en-us"), "title-en-us");
    }

    #[test]
    fn test_slugify_entities_and_punctuation() {
        assert_eq!(slugify("title &amp;"), "title-amp");
        assert_eq!(slugify("What's New?"), "what-s-new");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn test_slugify_empty_input() {
        assert_eq!(slugify(""), "page");
        assert_eq!(slugify("  !!! "), "page");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_hyphen() {
        let title = "word ".repeat(60);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("page1").is_ok());
        assert!(validate_slug("test-162-slug").is_ok());
        assert!(validate_slug("a_b").is_ok());

        assert!(validate_slug("").is_err());
        assert!(validate_slug("has space").is_err());
        assert!(validate_slug("nested/path").is_err());
        assert!(validate_slug("-leading").is_err());
        assert!(validate_slug("double--hyphen").is_err());
        assert!(validate_slug("Upper").is_err());
        assert!(validate_slug(&"a".repeat(MAX_SLUG_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_slugify_output_is_valid() {
        for title in ["About Us", "Price: $99.99", "Über uns", "2024 Review"] {
            let slug = slugify(title);
            assert!(validate_slug(&slug).is_ok(), "{} -> {}", title, slug);
        }
    }
}

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
use serde::{Deserialize, Serialize};

static LANGUAGE_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(?:-[a-z0-9]{2,8})*$").expect("Failed to compile language code regex")
});

/// Check that a language code looks like `en`, `en-us` or `zh-hant-tw`.
pub fn validate_language_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("Language code cannot be empty".to_string());
    }

    if !LANGUAGE_CODE_REGEX.is_match(code) {
        return Err(format!("Invalid language code: {}", code));
    }

    Ok(())
}

/// Languages a site is published in, and the order used to substitute a
/// missing translation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageSettings {
    default: String,
    languages: Vec<String>,
}

impl LanguageSettings {
    /// The default language is always part of the list, at the position it
    /// was declared or first when it was not declared.
    pub fn new(default: impl Into<String>, languages: Vec<String>) -> Self {
        let default = default.into().to_lowercase();
        let mut ordered: Vec<String> = Vec::with_capacity(languages.len() + 1);
        for language in languages {
            let language = language.to_lowercase();
            if !ordered.contains(&language) {
                ordered.push(language);
            }
        }
        if !ordered.contains(&default) {
            ordered.insert(0, default.clone());
        }

        Self {
            default,
            languages: ordered,
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Pick the requested language when it is configured, the default
    /// language otherwise.
    pub fn resolve<'a>(&'a self, requested: Option<&str>) -> &'a str {
        requested
            .and_then(|wanted| {
                self.languages
                    .iter()
                    .find(|l| l.eq_ignore_ascii_case(wanted))
            })
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    /// Choose a language from an `Accept-Language` header value.
    ///
    /// Entries are tried by decreasing quality. A bare primary tag such as
    /// `fr` matches the first configured language in that family (`fr-ch`).
    pub fn negotiate(&self, accept_language: &str) -> Option<&str> {
        let mut candidates: Vec<(f32, usize, String)> = accept_language
            .split(',')
            .enumerate()
            .filter_map(|(index, entry)| {
                let mut parts = entry.trim().split(';');
                let tag = parts.next()?.trim().to_lowercase();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((quality, index, tag.replace('_', "-")))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        for (quality, _, tag) in &candidates {
            if *quality <= 0.0 {
                continue;
            }
            if let Some(exact) = self.languages.iter().find(|l| *l == tag) {
                return Some(exact.as_str());
            }
            let family = tag.split('-').next().unwrap_or(tag);
            if let Some(close) = self
                .languages
                .iter()
                .find(|l| l.split('-').next() == Some(family))
            {
                return Some(close.as_str());
            }
        }

        None
    }

    /// Languages to try, in order, when `requested` has no value.
    ///
    /// The default language comes first, then the remaining configured
    /// languages in declaration order, then `stored` languages that are not
    /// configured, alphabetically. `requested` never appears in the result.
    pub fn fallback_order<'a>(&'a self, requested: &str, stored: &'a [String]) -> Vec<&'a str> {
        let mut order: Vec<&str> = Vec::new();

        let configured = std::iter::once(self.default.as_str())
            .chain(self.languages.iter().map(String::as_str));
        for language in configured {
            if language != requested && !order.contains(&language) {
                order.push(language);
            }
        }

        let mut extra: Vec<&str> = stored
            .iter()
            .map(String::as_str)
            .filter(|l| *l != requested && !order.contains(l))
            .collect();
        extra.sort_unstable();
        extra.dedup();
        order.extend(extra);

        order
    }
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self::new("en-us", vec!["en-us".to_string(), "fr-ch".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> LanguageSettings {
        LanguageSettings::new(
            "en-us",
            vec!["fr-ch".to_string(), "en-us".to_string(), "de".to_string()],
        )
    }

    #[test]
    fn test_validate_language_code() {
        assert!(validate_language_code("en").is_ok());
        assert!(validate_language_code("en-us").is_ok());
        assert!(validate_language_code("zh-hant-tw").is_ok());

        assert!(validate_language_code("").is_err());
        assert!(validate_language_code("EN").is_err());
        assert!(validate_language_code("english").is_err());
        assert!(validate_language_code("en_us").is_err());
    }

    #[test]
    fn test_new_adds_missing_default_first() {
        let settings = LanguageSettings::new("en-us", vec!["fr-ch".to_string()]);
        assert_eq!(settings.languages(), &["en-us".to_string(), "fr-ch".to_string()]);
    }

    #[test]
    fn test_new_deduplicates_and_lowercases() {
        let settings = LanguageSettings::new(
            "EN-US",
            vec!["en-us".to_string(), "FR-CH".to_string(), "fr-ch".to_string()],
        );
        assert_eq!(settings.default_language(), "en-us");
        assert_eq!(settings.languages(), &["en-us".to_string(), "fr-ch".to_string()]);
    }

    #[test]
    fn test_resolve() {
        let settings = settings();
        assert_eq!(settings.resolve(Some("fr-ch")), "fr-ch");
        assert_eq!(settings.resolve(Some("FR-CH")), "fr-ch");
        assert_eq!(settings.resolve(Some("it")), "en-us");
        assert_eq!(settings.resolve(None), "en-us");
    }

    #[test]
    fn test_negotiate_prefers_quality() {
        let settings = settings();
        assert_eq!(settings.negotiate("de;q=0.5, fr-CH;q=0.9"), Some("fr-ch"));
        assert_eq!(settings.negotiate("it, de"), Some("de"));
    }

    #[test]
    fn test_negotiate_matches_language_family() {
        let settings = settings();
        assert_eq!(settings.negotiate("fr"), Some("fr-ch"));
        assert_eq!(settings.negotiate("en-GB,en;q=0.8"), Some("en-us"));
    }

    #[test]
    fn test_negotiate_no_match() {
        let settings = settings();
        assert_eq!(settings.negotiate("ja, *"), None);
        assert_eq!(settings.negotiate(""), None);
        assert_eq!(settings.negotiate("fr-ch;q=0"), None);
    }

    #[test]
    fn test_fallback_order_default_first() {
        let settings = settings();
        let stored = vec![];
        assert_eq!(settings.fallback_order("fr-ch", &stored), vec!["en-us", "de"]);
        assert_eq!(settings.fallback_order("de", &stored), vec!["en-us", "fr-ch"]);
    }

    #[test]
    fn test_fallback_order_for_default_language() {
        let settings = settings();
        let stored = vec![];
        assert_eq!(settings.fallback_order("en-us", &stored), vec!["fr-ch", "de"]);
    }

    #[test]
    fn test_fallback_order_appends_unconfigured_stored_languages() {
        let settings = settings();
        let stored = vec!["pt".to_string(), "es".to_string(), "de".to_string()];
        assert_eq!(
            settings.fallback_order("fr-ch", &stored),
            vec!["en-us", "de", "es", "pt"]
        );
    }
}

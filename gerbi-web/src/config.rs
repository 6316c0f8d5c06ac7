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

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use gerbi_core::{LanguageSettings, PublicationSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server settings, read from `gerbi.toml` and `GERBI_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Directory whose templates override the built-in ones.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: Option<PathBuf>,

    /// Reload templates from disk on every render.
    #[serde(default)]
    pub development_mode: bool,

    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Template assigned to pages created without one.
    #[serde(default = "default_template")]
    pub default_template: String,

    /// A publication date in the future keeps a page unpublished.
    #[serde(default)]
    pub show_start_date: bool,

    /// A passed publication end date unpublishes a page.
    #[serde(default)]
    pub show_end_date: bool,

    /// Placeholders fall back to other languages when empty.
    #[serde(default = "default_true")]
    pub placeholder_fallback: bool,

    /// Honour `?lang=` on public pages.
    #[serde(default = "default_true")]
    pub language_from_query: bool,

    #[serde(default = "default_session_lifetime_hours")]
    pub session_lifetime_hours: i64,

    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            templates_dir: default_templates_dir(),
            development_mode: false,
            default_language: default_language(),
            languages: default_languages(),
            default_template: default_template(),
            show_start_date: false,
            show_end_date: false,
            placeholder_fallback: true,
            language_from_query: true,
            session_lifetime_hours: default_session_lifetime_hours(),
            secure_cookies: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("gerbi.toml"))
                .merge(Env::prefixed("GERBI_")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        gerbi_core::languages::validate_language_code(&self.default_language.to_lowercase())
            .map_err(|e| anyhow::anyhow!("default_language: {}", e))?;
        for language in &self.languages {
            gerbi_core::languages::validate_language_code(&language.to_lowercase())
                .map_err(|e| anyhow::anyhow!("languages: {}", e))?;
        }
        if self.session_lifetime_hours <= 0 {
            anyhow::bail!("session_lifetime_hours must be positive");
        }
        Ok(())
    }

    pub fn language_settings(&self) -> LanguageSettings {
        LanguageSettings::new(self.default_language.clone(), self.languages.clone())
    }

    pub fn publication_settings(&self) -> PublicationSettings {
        PublicationSettings {
            show_start_date: self.show_start_date,
            show_end_date: self.show_end_date,
        }
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_lifetime_hours)
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite:gerbi.db?mode=rwc".to_string()
}

fn default_templates_dir() -> Option<PathBuf> {
    Some(PathBuf::from("templates"))
}

fn default_language() -> String {
    "en-us".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en-us".to_string(), "fr-ch".to_string()]
}

fn default_template() -> String {
    "pages/default.html".to_string()
}

fn default_true() -> bool {
    true
}

fn default_session_lifetime_hours() -> i64 {
    24
}

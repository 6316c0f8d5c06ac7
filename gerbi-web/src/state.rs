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

use axum::extract::FromRef;
use gerbi_core::{LanguageSettings, PublicationSettings};
use gerbi_db::{
    ContentRepository, PageCache, PageRepository, SessionRepository, UserRepository,
};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::templates::TemplateEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub cache: PageCache,
    pub templates: TemplateEngine,
    pub config: Config,
    languages: LanguageSettings,
}

impl AppState {
    pub fn new(db: SqlitePool, templates: TemplateEngine, config: Config) -> Self {
        let languages = config.language_settings();
        Self {
            db,
            cache: PageCache::new(),
            templates,
            config,
            languages,
        }
    }

    pub fn languages(&self) -> &LanguageSettings {
        &self.languages
    }

    pub fn publication_settings(&self) -> PublicationSettings {
        self.config.publication_settings()
    }

    pub fn page_repo(&self) -> PageRepository {
        PageRepository::new(self.db.clone())
    }

    /// Content access shares the process-wide page cache.
    pub fn content_repo(&self) -> ContentRepository {
        ContentRepository::new(self.db.clone(), self.cache.clone(), self.languages.clone())
    }

    pub fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.db.clone())
    }

    pub fn session_repo(&self) -> SessionRepository {
        SessionRepository::new(self.db.clone())
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

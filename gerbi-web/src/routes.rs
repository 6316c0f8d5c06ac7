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

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/.health", get(handlers::health))
        // Authentication
        .route(
            "/admin/login",
            get(handlers::login_form).post(handlers::login),
        )
        .route(
            "/admin/logout",
            get(handlers::logout).post(handlers::logout),
        )
        // Page administration
        .route("/admin/pages/", get(handlers::list_pages))
        .route("/admin/pages/add", post(handlers::add_page))
        .route("/admin/pages/{id}/change", post(handlers::change_page))
        .route("/admin/pages/{id}/delete", post(handlers::delete_page))
        // Everything else is a public page
        .fallback(get(handlers::show_page))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

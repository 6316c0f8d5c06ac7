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

//! Domain types for the Gerbi page CMS.
//!
//! Pages form a tree and carry their localized values (title, slug and every
//! placeholder) as [`Content`](models::Content) records keyed by language and
//! type. Nothing in this crate touches the database or the network.

pub mod languages;
pub mod models;
pub mod utils;

pub use languages::LanguageSettings;
pub use models::*;

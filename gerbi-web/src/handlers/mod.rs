pub mod admin;
pub mod auth;
pub mod pages;

pub use admin::{add_page, change_page, delete_page, list_pages};
pub use auth::{login, login_form, logout};
pub use pages::{health, show_page};

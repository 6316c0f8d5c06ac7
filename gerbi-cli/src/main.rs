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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gerbi_core::{models::content, PageStatus, User};
use gerbi_db::{init_database, resolve_content, ContentRepository, PageCache, PageRepository};
use gerbi_db::{SessionRepository, UserRepository};
use gerbi_web::Config;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::io::Write;

#[derive(Parser)]
#[command(name = "gerbi")]
#[command(about = "Gerbi CLI tool for database, user and page management")]
struct Cli {
    /// Database URL, overriding the configuration
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (create tables)
    Init,

    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Print the page tree
    Pages,

    /// Remove expired sessions
    PurgeSessions,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Username
        username: String,
        /// Email address
        email: String,
        /// Allow the user to see drafts and manage pages
        #[arg(long)]
        staff: bool,
        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Change user password
    Password {
        /// Username or email
        user: String,
        /// New password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// List users
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gerbi_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database_url = cli.database.unwrap_or_else(|| config.database_url.clone());
    tracing::debug!(%database_url, "Using database");

    match cli.command {
        Commands::Init => {
            println!("Initializing database at: {}", database_url);
            init_database(&database_url).await?;
            println!("Database initialized successfully!");
            Ok(())
        }
        Commands::User { command } => {
            let pool = init_database(&database_url).await?;
            handle_user_command(command, pool).await
        }
        Commands::Pages => {
            let pool = init_database(&database_url).await?;
            let tree = page_tree(pool, &config).await?;
            print!("{}", tree);
            Ok(())
        }
        Commands::PurgeSessions => {
            let pool = init_database(&database_url).await?;
            let removed = SessionRepository::new(pool).delete_expired().await?;
            println!("Removed {} expired session(s)", removed);
            Ok(())
        }
    }
}

fn read_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    rpassword::read_password().context("Failed to read password")
}

async fn handle_user_command(command: UserCommands, pool: SqlitePool) -> Result<()> {
    let user_repo = UserRepository::new(pool);

    match command {
        UserCommands::Create {
            username,
            email,
            staff,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => read_password("Password: ")?,
            };
            let user = create_user(&user_repo, username, email, staff, &password).await?;
            println!(
                "Created {}user '{}' with id {}",
                if user.is_staff { "staff " } else { "" },
                user.username,
                user.id.unwrap_or_default()
            );
            Ok(())
        }

        UserCommands::Password { user, password } => {
            let found = if user.contains('@') {
                user_repo.find_by_email(&user).await?
            } else {
                user_repo.find_by_username(&user).await?
            };
            let mut found = found.with_context(|| format!("User '{}' not found", user))?;

            let password = match password {
                Some(p) => p,
                None => read_password("New password: ")?,
            };
            found.set_password(&password)?;
            user_repo.update(&found).await?;

            println!("Password updated for '{}'", found.username);
            Ok(())
        }

        UserCommands::List => {
            for user in user_repo.list().await? {
                println!(
                    "{:>4}  {:<20} {:<30} {}{}",
                    user.id.unwrap_or_default(),
                    user.username,
                    user.email,
                    if user.is_staff { "staff" } else { "user" },
                    if user.is_active { "" } else { " (disabled)" }
                );
            }
            Ok(())
        }
    }
}

async fn create_user(
    user_repo: &UserRepository,
    username: String,
    email: String,
    staff: bool,
    password: &str,
) -> Result<User> {
    if user_repo.find_by_username(&username).await?.is_some() {
        anyhow::bail!("Username '{}' is already taken", username);
    }
    if user_repo.find_by_email(&email).await?.is_some() {
        anyhow::bail!("Email '{}' is already registered", email);
    }

    let mut user = if staff {
        User::new_staff(username, email, password)?
    } else {
        User::new(username, email, password)?
    };
    if let Err(e) = user.is_valid() {
        anyhow::bail!("Invalid user data: {}", e);
    }

    user.id = Some(user_repo.create(&user).await?);
    Ok(user)
}

/// One line per page, indented by depth, in the default language.
async fn page_tree(pool: SqlitePool, config: &Config) -> Result<String> {
    let languages = config.language_settings();
    let pages = PageRepository::new(pool.clone()).list_all().await?;
    let contents = ContentRepository::new(pool, PageCache::new(), languages.clone());

    let mut by_parent: HashMap<Option<i64>, Vec<(i64, PageStatus, String)>> = HashMap::new();
    for page in &pages {
        let Some(id) = page.id else { continue };
        let values = contents.page_contents(id).await?;
        let title = resolve_content(
            &values,
            &languages,
            languages.default_language(),
            content::TITLE,
            true,
        );
        by_parent
            .entry(page.parent_id)
            .or_default()
            .push((id, page.status, title));
    }

    let mut out = String::new();
    let mut stack: Vec<(i64, PageStatus, String, usize)> = by_parent
        .get(&None)
        .map(|roots| {
            roots
                .iter()
                .rev()
                .map(|(id, status, title)| (*id, *status, title.clone(), 0))
                .collect()
        })
        .unwrap_or_default();

    while let Some((id, status, title, depth)) = stack.pop() {
        out.push_str(&format!(
            "{}{} [{}] #{}\n",
            "  ".repeat(depth),
            if title.is_empty() { "(untitled)" } else { title.as_str() },
            status,
            id
        ));
        if let Some(children) = by_parent.get(&Some(id)) {
            for (child_id, child_status, child_title) in children.iter().rev() {
                stack.push((*child_id, *child_status, child_title.clone(), depth + 1));
            }
        }
    }

    Ok(out)
}

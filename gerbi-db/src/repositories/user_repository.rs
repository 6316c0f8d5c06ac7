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
use chrono::Utc;
use gerbi_core::User;
use sqlx::SqlitePool;

use crate::rows::parse_datetime;

type UserRow = (i64, String, String, String, bool, bool, String, String);

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_active, is_staff, created_at, updated_at";

fn user_from_row(row: UserRow) -> Result<User> {
    let (id, username, email, password_hash, is_active, is_staff, created_at, updated_at) = row;
    Ok(User {
        id: Some(id),
        username,
        email,
        password_hash,
        is_active,
        is_staff,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<i64> {
        user.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid user: {}", e))?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, is_active, is_staff, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find user by id")?;

        row.map(user_from_row).transpose()
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find user by username")?;

        row.map(user_from_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find user by email")?;

        row.map(user_from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.into_iter().map(user_from_row).collect()
    }

    pub async fn update(&self, user: &User) -> Result<()> {
        let id = user
            .id
            .ok_or_else(|| anyhow::anyhow!("Cannot update user without ID"))?;
        user.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid user: {}", e))?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, is_active = ?, is_staff = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update user")?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("User with id {} not found", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Result<UserRepository> {
        Ok(UserRepository::new(init_database("sqlite::memory:").await?))
    }

    fn batiste() -> User {
        User::new("batiste".to_string(), "batiste@example.com".to_string(), "b").unwrap()
    }

    #[sqlx::test]
    async fn test_create_and_find_user() -> Result<()> {
        let repo = setup().await?;
        let id = repo.create(&batiste()).await?;

        let by_id = repo.find_by_id(id).await?.expect("user by id");
        assert_eq!(by_id.username, "batiste");
        assert!(by_id.verify_password("b")?);
        assert!(!by_id.is_staff);

        let by_name = repo.find_by_username("batiste").await?.expect("user by name");
        assert_eq!(by_name.id, Some(id));

        let by_email = repo.find_by_email("batiste@example.com").await?.expect("user by email");
        assert_eq!(by_email.id, Some(id));

        assert!(repo.find_by_username("nobody").await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn test_duplicate_username_fails() -> Result<()> {
        let repo = setup().await?;
        repo.create(&batiste()).await?;

        let mut other = batiste();
        other.email = "other@example.com".to_string();
        assert!(repo.create(&other).await.is_err());
        Ok(())
    }

    #[sqlx::test]
    async fn test_update_user() -> Result<()> {
        let repo = setup().await?;
        let id = repo.create(&batiste()).await?;

        let mut user = repo.find_by_id(id).await?.unwrap();
        user.is_staff = true;
        user.set_password("new")?;
        repo.update(&user).await?;

        let updated = repo.find_by_id(id).await?.unwrap();
        assert!(updated.is_staff);
        assert!(updated.verify_password("new")?);
        Ok(())
    }

    #[sqlx::test]
    async fn test_list_users_sorted() -> Result<()> {
        let repo = setup().await?;
        repo.create(&User::new("zed".to_string(), "z@example.com".to_string(), "z")?)
            .await?;
        repo.create(&batiste()).await?;

        let names: Vec<String> = repo.list().await?.into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["batiste".to_string(), "zed".to_string()]);
        Ok(())
    }
}

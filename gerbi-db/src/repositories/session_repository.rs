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
use gerbi_core::Session;
use sqlx::SqlitePool;

use crate::rows::parse_datetime;

type SessionRow = (String, i64, String, String);

fn session_from_row(row: SessionRow) -> Result<Session> {
    let (id, user_id, expires_at, created_at) = row;
    Ok(Session {
        id,
        user_id,
        expires_at: parse_datetime(&expires_at, "expires_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create session")?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, expires_at, created_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find session by id")?;

        row.map(session_from_row).transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?
            .rows_affected();

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Session not found"));
        }

        Ok(())
    }

    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{init_database, UserRepository};
    use chrono::Duration;
    use gerbi_core::User;

    async fn setup() -> Result<(SessionRepository, i64)> {
        let pool = init_database("sqlite::memory:").await?;
        let user = User::new("batiste".to_string(), "batiste@example.com".to_string(), "b")?;
        let user_id = UserRepository::new(pool.clone()).create(&user).await?;
        Ok((SessionRepository::new(pool), user_id))
    }

    #[sqlx::test]
    async fn test_create_and_find_session() -> Result<()> {
        let (repo, user_id) = setup().await?;
        let session = Session::new(user_id, Duration::hours(24));
        repo.create(&session).await?;

        let found = repo.find_by_id(&session.id).await?.expect("session");
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.expires_at.timestamp(), session.expires_at.timestamp());
        assert!(!found.is_expired());
        Ok(())
    }

    #[sqlx::test]
    async fn test_find_unknown_session() -> Result<()> {
        let (repo, _) = setup().await?;
        assert!(repo.find_by_id("missing").await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn test_delete_session() -> Result<()> {
        let (repo, user_id) = setup().await?;
        let session = Session::new(user_id, Duration::hours(1));
        repo.create(&session).await?;

        repo.delete(&session.id).await?;
        assert!(repo.find_by_id(&session.id).await?.is_none());
        assert!(repo.delete(&session.id).await.is_err());
        Ok(())
    }

    #[sqlx::test]
    async fn test_delete_expired_keeps_live_sessions() -> Result<()> {
        let (repo, user_id) = setup().await?;
        let live = Session::new(user_id, Duration::hours(1));
        let expired = Session::new(user_id, Duration::hours(-1));
        repo.create(&live).await?;
        repo.create(&expired).await?;

        assert_eq!(repo.delete_expired().await?, 1);
        assert!(repo.find_by_id(&live.id).await?.is_some());
        assert!(repo.find_by_id(&expired.id).await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn test_session_requires_existing_user() -> Result<()> {
        let (repo, _) = setup().await?;
        let orphan = Session::new(999, Duration::hours(1));
        assert!(repo.create(&orphan).await.is_err());
        Ok(())
    }
}

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

use anyhow::Result;
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._%+-]*[a-zA-Z0-9])?@[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$")
        .expect("Failed to compile email regex")
});

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]*$").expect("Failed to compile username regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    /// Staff members can see draft pages and use the admin endpoints.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an active, non-staff user with a hashed password.
    pub fn new(username: String, email: String, password: &str) -> Result<Self> {
        Self::validate_username(&username)
            .map_err(|e| anyhow::anyhow!("Invalid username: {}", e))?;
        Self::validate_email(&email).map_err(|e| anyhow::anyhow!("Invalid email: {}", e))?;

        let password_hash = Self::hash_password(password)?;
        let now = Utc::now();

        Ok(Self {
            id: None,
            username,
            email,
            password_hash,
            is_active: true,
            is_staff: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn new_staff(username: String, email: String, password: &str) -> Result<Self> {
        let mut user = Self::new(username, email, password)?;
        user.is_staff = true;
        Ok(user)
    }

    /// Whether this account may see drafts and manage pages right now.
    pub fn can_manage_pages(&self) -> bool {
        self.is_active && self.is_staff
    }

    pub fn hash_password(password: &str) -> Result<String> {
        use argon2::password_hash::rand_core::OsRng;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = Self::hash_password(password)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn verify_password(&self, password: &str) -> Result<bool> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let parsed_hash = PasswordHash::new(&self.password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn validate_email(email: &str) -> Result<(), String> {
        if email.is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        if email.len() > 255 {
            return Err("Email cannot exceed 255 characters".to_string());
        }

        if !EMAIL_REGEX.is_match(email) {
            return Err("Invalid email format".to_string());
        }

        Ok(())
    }

    pub fn validate_username(username: &str) -> Result<(), String> {
        if username.len() < 3 {
            return Err("Username must be at least 3 characters".to_string());
        }

        if username.len() > 150 {
            return Err("Username cannot exceed 150 characters".to_string());
        }

        if !USERNAME_REGEX.is_match(username) {
            return Err("Username must start with a letter and contain only letters, numbers, dots, underscores and hyphens".to_string());
        }

        Ok(())
    }

    pub fn is_valid(&self) -> Result<(), String> {
        Self::validate_username(&self.username)?;
        Self::validate_email(&self.email)?;

        if self.password_hash.is_empty() {
            return Err("Password hash cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batiste() -> User {
        User::new(
            "batiste".to_string(),
            "batiste@example.com".to_string(),
            "b",
        )
        .unwrap()
    }

    #[test]
    fn test_new_user_is_active_non_staff() {
        let user = batiste();

        assert!(user.id.is_none());
        assert_eq!(user.username, "batiste");
        assert_eq!(user.email, "batiste@example.com");
        assert_ne!(user.password_hash, "b");
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.can_manage_pages());
    }

    #[test]
    fn test_new_staff_user() {
        let user = User::new_staff(
            "editor".to_string(),
            "editor@example.com".to_string(),
            "secret",
        )
        .unwrap();
        assert!(user.is_staff);
        assert!(user.can_manage_pages());
    }

    #[test]
    fn test_inactive_staff_cannot_manage_pages() {
        let mut user = User::new_staff(
            "editor".to_string(),
            "editor@example.com".to_string(),
            "secret",
        )
        .unwrap();
        user.is_active = false;
        assert!(!user.can_manage_pages());
    }

    #[test]
    fn test_verify_password() {
        let user = batiste();
        assert!(user.verify_password("b").unwrap());
        assert!(!user.verify_password("wrong").unwrap());
        assert!(!user.verify_password("").unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let mut user = batiste();
        user.password_hash = "not-a-hash".to_string();
        assert!(user.verify_password("b").is_err());
    }

    #[test]
    fn test_set_password() {
        let mut user = batiste();
        let old_hash = user.password_hash.clone();

        user.set_password("new-password").unwrap();

        assert_ne!(user.password_hash, old_hash);
        assert!(user.verify_password("new-password").unwrap());
        assert!(!user.verify_password("b").unwrap());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(batiste()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "batiste");
    }

    #[test]
    fn test_validate_email() {
        assert!(User::validate_email("a@example.com").is_ok());
        assert!(User::validate_email("first.last+tag@sub.example.org").is_ok());

        assert!(User::validate_email("").is_err());
        assert!(User::validate_email("no-at-sign").is_err());
        assert!(User::validate_email("user@nodot").is_err());
        assert!(User::validate_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(User::validate_username("batiste").is_ok());
        assert!(User::validate_username("nonstaff").is_ok());
        assert!(User::validate_username("j.doe-2").is_ok());

        assert!(User::validate_username("ab").is_err());
        assert!(User::validate_username("1abc").is_err());
        assert!(User::validate_username("has space").is_err());
        assert!(User::validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_new_rejects_invalid_input() {
        let result = User::new("x".to_string(), "x@example.com".to_string(), "pw");
        assert!(result.unwrap_err().to_string().contains("Invalid username"));

        let result = User::new("valid".to_string(), "nope".to_string(), "pw");
        assert!(result.unwrap_err().to_string().contains("Invalid email"));
    }

    #[test]
    fn test_is_valid_requires_hash() {
        let mut user = batiste();
        assert!(user.is_valid().is_ok());

        user.password_hash.clear();
        assert_eq!(user.is_valid().unwrap_err(), "Password hash cannot be empty");
    }
}

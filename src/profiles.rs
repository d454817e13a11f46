//! User profile storage.
//!
//! Profiles carry the age and interests used to personalize summaries.
//! A user without a row simply gets the default personalization.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use docchat_core::adapters::ProfileProvider;
use docchat_core::models::UserProfile;

/// SQLite-backed [`ProfileProvider`] over the `user_profiles` table.
pub struct SqliteProfiles {
    pool: SqlitePool,
}

impl SqliteProfiles {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the profile for `user_id`.
    ///
    /// Blank interests are dropped and the rest are trimmed.
    pub async fn upsert(&self, user_id: &str, profile: &UserProfile) -> Result<UserProfile> {
        let cleaned = UserProfile {
            age: profile.age,
            interests: profile
                .interests
                .iter()
                .map(|i| i.trim())
                .filter(|i| !i.is_empty())
                .map(str::to_string)
                .collect(),
        };
        let interests_json = serde_json::to_string(&cleaned.interests)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, age, interests_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                age = excluded.age,
                interests_json = excluded.interests_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(cleaned.age.map(i64::from))
        .bind(&interests_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(cleaned)
    }
}

#[async_trait]
impl ProfileProvider for SqliteProfiles {
    async fn get_profile(&self, owner_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT age, interests_json FROM user_profiles WHERE user_id = ?")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let age: Option<i64> = row.get("age");
        let interests_json: String = row.get("interests_json");
        let interests: Vec<String> = serde_json::from_str(&interests_json)
            .with_context(|| format!("corrupt interests for user {}", owner_id))?;

        Ok(Some(UserProfile {
            age: age.and_then(|a| u32::try_from(a).ok()),
            interests,
        }))
    }
}

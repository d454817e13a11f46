//! Collaborator traits consumed by the lifecycle service.
//!
//! The service never parses PDFs or talks to a model itself; it calls
//! these traits synchronously (from its own point of view) and reports
//! their failures unchanged. Retry policy, if any, belongs to the
//! implementation.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{ExtractionError, GenerationError};
use crate::models::UserProfile;

/// Turns uploaded bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> std::result::Result<String, ExtractionError>;
}

/// Produces summaries and answers from document text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Summarize `text` for a reader of the given age and interests.
    ///
    /// `interests` is never empty; the service substitutes a default
    /// context when the profile has none.
    async fn summarize(
        &self,
        text: &str,
        age: Option<u32>,
        interests: &[String],
    ) -> std::result::Result<String, GenerationError>;

    /// Answer `question` using `text` as context.
    async fn answer(&self, text: &str, question: &str)
        -> std::result::Result<String, GenerationError>;
}

/// Resolves a user's personalization attributes.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Returns `None` when the user has no stored profile.
    async fn get_profile(&self, owner_id: &str) -> Result<Option<UserProfile>>;
}

/// Profile provider that knows nobody. Every summary uses the defaults.
pub struct NoProfiles;

#[async_trait]
impl ProfileProvider for NoProfiles {
    async fn get_profile(&self, _owner_id: &str) -> Result<Option<UserProfile>> {
        Ok(None)
    }
}

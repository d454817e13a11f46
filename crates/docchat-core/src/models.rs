//! Core data models for docchat.
//!
//! A [`Document`] is created once from extracted text and then grows in two
//! directions only: a summary that is set at most once, and an append-only
//! chat log of [`ChatTurn`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub text: String,
    pub summary: Option<String>,
    pub chat_history: Vec<ChatTurn>,
    /// Unix seconds. Listing order follows creation order.
    pub created_at: i64,
}

impl Document {
    /// Builds a fresh, unsummarized document with an empty chat log.
    pub fn new(owner_id: &str, filename: &str, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            filename: filename.to_string(),
            text,
            summary: None,
            chat_history: Vec::new(),
            created_at: Utc::now().timestamp(),
        }
    }

    pub fn is_summarized(&self) -> bool {
        self.summary.is_some()
    }

    pub fn summary_view(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            created_at: self.created_at,
            summarized: self.is_summarized(),
            turns: self.chat_history.len(),
        }
    }
}

/// One question/answer exchange appended to a document's chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn now(question: &str, answer: String) -> Self {
        Self {
            question: question.to_string(),
            answer,
            timestamp: Utc::now(),
        }
    }
}

/// Lightweight listing entry; omits the body text and chat log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub created_at: i64,
    pub summarized: bool,
    pub turns: usize,
}

/// Result of listing a user's documents.
///
/// `found` is false when the user owns nothing, so outer layers can decide
/// between a not-found response and an empty success.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListing {
    pub documents: Vec<DocumentSummary>,
    pub found: bool,
}

impl DocumentListing {
    pub fn from_documents(docs: &[Document]) -> Self {
        Self {
            documents: docs.iter().map(Document::summary_view).collect(),
            found: !docs.is_empty(),
        }
    }
}

/// Outcome of a summarize call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryOutcome {
    pub summary: String,
    /// True when the stored summary was returned without generating.
    pub cache_hit: bool,
}

/// Personalization attributes for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
}

//! Storage abstraction for docchat.
//!
//! The [`DocumentStore`] trait is the only shared mutable resource the
//! lifecycle service touches. Every lookup is filtered by owner: a document
//! owned by someone else is indistinguishable from a missing one.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChatTurn, Document};

/// Result of [`DocumentStore::set_summary_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryWrite {
    /// The summary was absent and is now the supplied value.
    Stored,
    /// A summary was already present; it was left untouched.
    AlreadyPresent(String),
}

/// Abstract storage backend for documents and their chat logs.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create`](DocumentStore::create) | Persist a new document |
/// | [`find_by_id`](DocumentStore::find_by_id) | Owner-filtered lookup |
/// | [`find_all_by_owner`](DocumentStore::find_all_by_owner) | All documents of a user, creation order |
/// | [`find_summarized_by_owner`](DocumentStore::find_summarized_by_owner) | Only summarized documents |
/// | [`set_summary_if_absent`](DocumentStore::set_summary_if_absent) | Atomic one-time summary write |
/// | [`append_turn`](DocumentStore::append_turn) | Atomic chat-log append |
///
/// The two writes are the whole of "save": a document's text never changes,
/// its summary is written once, and its chat log only grows. Both must be
/// atomic per call so concurrent requests on one document never lose an
/// append or revert a stored summary.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, doc: &Document) -> Result<()>;

    async fn find_by_id(&self, owner_id: &str, id: &str) -> Result<Option<Document>>;

    async fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Document>>;

    async fn find_summarized_by_owner(&self, owner_id: &str) -> Result<Vec<Document>>;

    /// Sets the summary only if none is stored.
    ///
    /// Returns `None` when no document with `id` is owned by `owner_id`.
    async fn set_summary_if_absent(
        &self,
        owner_id: &str,
        id: &str,
        summary: &str,
    ) -> Result<Option<SummaryWrite>>;

    /// Appends one turn to the chat log.
    ///
    /// Returns `false` when no document with `id` is owned by `owner_id`.
    async fn append_turn(&self, owner_id: &str, id: &str, turn: &ChatTurn) -> Result<bool>;
}

//! In-memory [`DocumentStore`] implementation for tests and embedding.
//!
//! Uses a `HashMap` plus an insertion-order index behind
//! `std::sync::RwLock`. Each write takes the lock once, which makes
//! set-if-absent and append atomic per call.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{ChatTurn, Document};

use super::{DocumentStore, SummaryWrite};

#[derive(Default)]
struct Inner {
    docs: HashMap<String, Document>,
    order: Vec<String>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of documents across all owners.
    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_owned<F>(&self, owner_id: &str, keep: F) -> Result<Vec<Document>>
    where
        F: Fn(&Document) -> bool,
    {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.docs.get(id))
            .filter(|d| d.owner_id == owner_id && keep(d))
            .cloned()
            .collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, doc: &Document) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        if inner.docs.contains_key(&doc.id) {
            anyhow::bail!("document id already exists: {}", doc.id);
        }
        inner.order.push(doc.id.clone());
        inner.docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn find_by_id(&self, owner_id: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner
            .docs
            .get(id)
            .filter(|d| d.owner_id == owner_id)
            .cloned())
    }

    async fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.collect_owned(owner_id, |_| true)
    }

    async fn find_summarized_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.collect_owned(owner_id, Document::is_summarized)
    }

    async fn set_summary_if_absent(
        &self,
        owner_id: &str,
        id: &str,
        summary: &str,
    ) -> Result<Option<SummaryWrite>> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        let doc = match inner.docs.get_mut(id).filter(|d| d.owner_id == owner_id) {
            Some(d) => d,
            None => return Ok(None),
        };
        match &doc.summary {
            Some(existing) => Ok(Some(SummaryWrite::AlreadyPresent(existing.clone()))),
            None => {
                doc.summary = Some(summary.to_string());
                Ok(Some(SummaryWrite::Stored))
            }
        }
    }

    async fn append_turn(&self, owner_id: &str, id: &str, turn: &ChatTurn) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        match inner.docs.get_mut(id).filter(|d| d.owner_id == owner_id) {
            Some(doc) => {
                doc.chat_history.push(turn.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

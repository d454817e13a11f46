//! The document lifecycle service.
//!
//! A document moves through three stages: raw text (after ingest),
//! summarized (after the first successful summarize), and an ever-growing
//! chat log (after each ask). [`DocumentService`] enforces the rules that
//! keep those stages safe to repeat:
//!
//! - every operation is scoped to the caller's owner id;
//! - a summary is generated at most once per document, later calls read it
//!   back (`cache_hit = true`) without touching the [`Generator`];
//! - a failed generation leaves nothing behind, so a retry can succeed;
//! - each successful ask appends exactly one [`ChatTurn`].
//!
//! ```text
//!   ingest ──▶ [text] ──summarize──▶ [text + summary]
//!                 │                         │
//!                 └──────── ask ────────────┴──▶ chat log grows
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use crate::adapters::{Generator, NoProfiles, ProfileProvider, TextExtractor};
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{ChatTurn, Document, DocumentListing, SummaryOutcome};
use crate::store::{DocumentStore, SummaryWrite};

/// Interests used when a profile is missing or lists none.
pub const DEFAULT_INTERESTS: &str = "various topics";

/// Filename recorded when the caller supplies a blank one.
const UNTITLED: &str = "untitled.pdf";

/// Per-document async locks that serialize summary generation.
///
/// Entries are weak so a document's slot disappears once no summarize call
/// holds it.
#[derive(Default)]
struct SummaryGate {
    slots: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl SummaryGate {
    fn slot(&self, doc_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, w| w.strong_count() > 0);
        if let Some(existing) = slots.get(doc_id).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(tokio::sync::Mutex::new(()));
        slots.insert(doc_id.to_string(), Arc::downgrade(&fresh));
        fresh
    }
}

/// Orchestrates ingest, summarize, and ask over an injected store and
/// adapters.
///
/// The service keeps no per-request state. Clone the `Arc` handles into as
/// many services as needed; they share the store and the summary gate only
/// if built from the same instance.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn Generator>,
    profiles: Arc<dyn ProfileProvider>,
    default_interests: String,
    gate: SummaryGate,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            store,
            extractor,
            generator,
            profiles: Arc::new(NoProfiles),
            default_interests: DEFAULT_INTERESTS.to_string(),
            gate: SummaryGate::default(),
        }
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_default_interests(mut self, interests: impl Into<String>) -> Self {
        self.default_interests = interests.into();
        self
    }

    /// Extracts text from `bytes` and stores it as a new document.
    ///
    /// Nothing is persisted when extraction fails or yields only
    /// whitespace.
    pub async fn ingest(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> LifecycleResult<Document> {
        if bytes.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "uploaded file is empty".to_string(),
            ));
        }

        let text = self.extractor.extract(bytes).await.map_err(|e| {
            warn!(owner = owner_id, filename, error = %e, "extraction failed");
            LifecycleError::from(e)
        })?;
        let text = text.trim();
        if text.is_empty() {
            warn!(owner = owner_id, filename, "extraction produced no text");
            return Err(LifecycleError::ExtractionFailed(
                "no text could be extracted from the file".to_string(),
            ));
        }

        let filename = match filename.trim() {
            "" => UNTITLED,
            name => name,
        };
        let doc = Document::new(owner_id, filename, text.to_string());
        self.store.create(&doc).await?;
        info!(
            owner = owner_id,
            doc_id = %doc.id,
            filename,
            chars = doc.text.len(),
            "document ingested"
        );
        Ok(doc)
    }

    pub async fn list_documents(&self, owner_id: &str) -> LifecycleResult<DocumentListing> {
        let docs = self.store.find_all_by_owner(owner_id).await?;
        Ok(DocumentListing::from_documents(&docs))
    }

    pub async fn get_document(&self, owner_id: &str, doc_id: &str) -> LifecycleResult<Document> {
        self.store
            .find_by_id(owner_id, doc_id)
            .await?
            .ok_or(LifecycleError::NotFoundOrForbidden)
    }

    /// Returns the document's summary, generating and storing it on the
    /// first call only.
    ///
    /// Concurrent calls for one document queue on a per-document gate, so
    /// the generator runs once even when several callers race on an
    /// unsummarized document.
    pub async fn summarize(&self, owner_id: &str, doc_id: &str) -> LifecycleResult<SummaryOutcome> {
        let doc = self.get_document(owner_id, doc_id).await?;
        if let Some(summary) = doc.summary {
            debug!(doc_id, "summary cache hit");
            return Ok(SummaryOutcome {
                summary,
                cache_hit: true,
            });
        }

        let slot = self.gate.slot(doc_id);
        let _held = slot.lock().await;

        // Another caller may have filled it while we waited.
        let doc = self.get_document(owner_id, doc_id).await?;
        if let Some(summary) = doc.summary {
            debug!(doc_id, "summary filled while waiting");
            return Ok(SummaryOutcome {
                summary,
                cache_hit: true,
            });
        }

        let profile = self.profiles.get_profile(owner_id).await?.unwrap_or_default();
        let interests = if profile.interests.is_empty() {
            vec![self.default_interests.clone()]
        } else {
            profile.interests
        };

        let summary = self
            .generator
            .summarize(&doc.text, profile.age, &interests)
            .await
            .map_err(|e| {
                warn!(doc_id, error = %e, "summary generation failed");
                LifecycleError::from(e)
            })?;
        let summary = non_blank(summary, "summary")?;

        match self
            .store
            .set_summary_if_absent(owner_id, doc_id, &summary)
            .await?
        {
            Some(SummaryWrite::Stored) => {
                info!(doc_id, chars = summary.len(), "summary stored");
                Ok(SummaryOutcome {
                    summary,
                    cache_hit: false,
                })
            }
            Some(SummaryWrite::AlreadyPresent(existing)) => {
                debug!(doc_id, "summary already present, keeping stored value");
                Ok(SummaryOutcome {
                    summary: existing,
                    cache_hit: true,
                })
            }
            None => Err(LifecycleError::NotFoundOrForbidden),
        }
    }

    pub async fn list_summarized(&self, owner_id: &str) -> LifecycleResult<Vec<Document>> {
        Ok(self.store.find_summarized_by_owner(owner_id).await?)
    }

    pub async fn get_summary(&self, owner_id: &str, doc_id: &str) -> LifecycleResult<String> {
        self.get_document(owner_id, doc_id)
            .await?
            .summary
            .ok_or(LifecycleError::NotYetSummarized)
    }

    /// Answers `question` against the document and appends the turn.
    ///
    /// No turn is recorded when generation fails.
    pub async fn ask(
        &self,
        owner_id: &str,
        doc_id: &str,
        question: &str,
    ) -> LifecycleResult<ChatTurn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let doc = self.get_document(owner_id, doc_id).await?;
        let answer = self
            .generator
            .answer(&doc.text, question)
            .await
            .map_err(|e| {
                warn!(doc_id, error = %e, "answer generation failed");
                LifecycleError::from(e)
            })?;
        let answer = non_blank(answer, "answer")?;

        let turn = ChatTurn::now(question, answer);
        if !self.store.append_turn(owner_id, doc_id, &turn).await? {
            return Err(LifecycleError::NotFoundOrForbidden);
        }
        info!(doc_id, "chat turn appended");
        Ok(turn)
    }

    pub async fn chat_history(
        &self,
        owner_id: &str,
        doc_id: &str,
    ) -> LifecycleResult<Vec<ChatTurn>> {
        Ok(self.get_document(owner_id, doc_id).await?.chat_history)
    }
}

fn non_blank(generated: String, what: &str) -> LifecycleResult<String> {
    let trimmed = generated.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::GenerationFailed(format!(
            "generator returned an empty {}",
            what
        )));
    }
    Ok(trimmed.to_string())
}

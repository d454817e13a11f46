//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents live in `documents`; chat turns live in their own
//! `chat_turns` table keyed by document id and ordered by an
//! autoincrement sequence. Both writes are single statements whose
//! `WHERE` clause carries the ownership and "still absent" conditions, so
//! SQLite's write lock makes them atomic without read-then-write races.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use docchat_core::models::{ChatTurn, Document};
use docchat_core::store::{DocumentStore, SummaryWrite};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn turns_for_owner(&self, owner_id: &str) -> Result<HashMap<String, Vec<ChatTurn>>> {
        let rows = sqlx::query(
            r#"
            SELECT t.document_id, t.question, t.answer, t.asked_at
            FROM chat_turns t
            JOIN documents d ON d.id = t.document_id
            WHERE d.owner_id = ?
            ORDER BY t.seq ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<ChatTurn>> = HashMap::new();
        for row in &rows {
            let doc_id: String = row.get("document_id");
            grouped.entry(doc_id).or_default().push(turn_from_row(row)?);
        }
        Ok(grouped)
    }

    async fn owned_documents(&self, owner_id: &str, summarized_only: bool) -> Result<Vec<Document>> {
        let sql = if summarized_only {
            "SELECT id, owner_id, filename, text, summary, created_at FROM documents \
             WHERE owner_id = ? AND summary IS NOT NULL ORDER BY rowid ASC"
        } else {
            "SELECT id, owner_id, filename, text, summary, created_at FROM documents \
             WHERE owner_id = ? ORDER BY rowid ASC"
        };
        let rows = sqlx::query(sql).bind(owner_id).fetch_all(&self.pool).await?;
        let mut turns = self.turns_for_owner(owner_id).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut doc = document_from_row(row);
                doc.chat_history = turns.remove(&doc.id).unwrap_or_default();
                doc
            })
            .collect())
    }
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        filename: row.get("filename"),
        text: row.get("text"),
        summary: row.get("summary"),
        chat_history: Vec::new(),
        created_at: row.get("created_at"),
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ChatTurn> {
    let asked_at: String = row.get("asked_at");
    let timestamp = DateTime::parse_from_rfc3339(&asked_at)
        .map_err(|e| anyhow!("bad chat turn timestamp '{}': {}", asked_at, e))?
        .with_timezone(&Utc);
    Ok(ChatTurn {
        question: row.get("question"),
        answer: row.get("answer"),
        timestamp,
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, filename, text, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.filename)
        .bind(&doc.text)
        .bind(&doc.summary)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, owner_id: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, owner_id, filename, text, summary, created_at FROM documents \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut doc = match row {
            Some(row) => document_from_row(&row),
            None => return Ok(None),
        };

        let turn_rows = sqlx::query(
            "SELECT question, answer, asked_at FROM chat_turns WHERE document_id = ? ORDER BY seq ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        doc.chat_history = turn_rows
            .iter()
            .map(turn_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(doc))
    }

    async fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.owned_documents(owner_id, false).await
    }

    async fn find_summarized_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.owned_documents(owner_id, true).await
    }

    async fn set_summary_if_absent(
        &self,
        owner_id: &str,
        id: &str,
        summary: &str,
    ) -> Result<Option<SummaryWrite>> {
        let updated = sqlx::query(
            "UPDATE documents SET summary = ? WHERE id = ? AND owner_id = ? AND summary IS NULL",
        )
        .bind(summary)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(Some(SummaryWrite::Stored));
        }

        let existing: Option<Option<String>> =
            sqlx::query_scalar("SELECT summary FROM documents WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            None => Ok(None),
            Some(Some(stored)) => Ok(Some(SummaryWrite::AlreadyPresent(stored))),
            Some(None) => Err(anyhow!("summary write for {} was not applied", id)),
        }
    }

    async fn append_turn(&self, owner_id: &str, id: &str, turn: &ChatTurn) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO chat_turns (document_id, question, answer, asked_at)
            SELECT id, ?, ?, ? FROM documents WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(&turn.question)
        .bind(&turn.answer)
        .bind(turn.timestamp.to_rfc3339())
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }
}

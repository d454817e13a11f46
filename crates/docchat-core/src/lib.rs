//! # docchat core
//!
//! Transport-agnostic logic for docchat: document and chat-turn models,
//! the [`DocumentStore`](store::DocumentStore) abstraction, the adapter
//! traits for extraction, generation and user profiles, and the
//! [`DocumentService`](lifecycle::DocumentService) that ties them together.
//!
//! This crate contains no sqlx, axum, reqwest, or filesystem I/O. Concrete
//! backends live in the `docchat` application crate.

pub mod adapters;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod store;

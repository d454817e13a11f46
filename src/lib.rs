//! # docchat
//!
//! Upload a PDF, get a one-time personalized summary, and ask questions
//! about its text.
//!
//! The lifecycle rules (owner scoping, summarize-once caching, append-only
//! chat history) live in the `docchat-core` crate. This crate supplies the
//! concrete collaborators and the surfaces around them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ HTTP / CLI │──▶│ DocumentService  │──▶│ SqliteStore  │
//! │ + tokens   │   │   (core crate)   │   │ docs + turns │
//! └────────────┘   └───┬──────────┬───┘   └──────────────┘
//!                      ▼          ▼
//!               ┌────────────┐ ┌──────────────┐
//!               │PdfExtractor│ │ChatGenerator │
//!               └────────────┘ └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`profiles`] | User profile storage |
//! | [`extract`] | PDF text extraction |
//! | [`generation`] | Summary and answer generation |
//! | [`auth`] | Bearer-token gateway |
//! | [`app`] | Startup wiring |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI entry points |

pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod extract;
pub mod generation;
pub mod migrate;
pub mod profiles;
pub mod server;
pub mod sqlite_store;

//! Zotero MCP Server
//!
//! A local, read-only HTTP bridge to a Zotero library. Serves item and
//! collection records as JSON and the full text of PDF attachments as plain
//! text. The binary in main.rs wires configuration, the library source and
//! the [`server::Server`] lifecycle together.
//!
//! # Modules
//!
//! - `library`: data sources (Zotero SQLite profile, in-memory snapshot)
//! - `format`: JSON records for items and collections
//! - `pdf`: text extraction, normalization and the full-text service
//! - `routes`: axum handlers
//! - `server`: start/stop/self-test

pub mod config;
pub mod error;
pub mod format;
pub mod library;
pub mod pdf;
pub mod routes;
pub mod server;
pub mod state;

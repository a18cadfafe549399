//! Types shared by the sweeper game client and the document store service.
//!
//! `models` holds the board-facing types and the `games/{id}` document schema,
//! `protocol` the store's request and subscription messages, and `document`
//! the dot-path update rules both store implementations apply.

pub mod document;
pub mod models;
pub mod protocol;

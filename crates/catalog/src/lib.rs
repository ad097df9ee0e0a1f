//! Client for the remote ROM catalog service.
//!
//! Provides an async client with HTTP basic authentication for logging in,
//! listing catalog items, streaming item content and fetching cover images.
//! The client doubles as the [`PayloadSource`](rommend_transfer::PayloadSource)
//! the transfer engine reads from.

pub mod client;
mod types;

pub use client::{CatalogClient, CatalogError, normalize_base_url};

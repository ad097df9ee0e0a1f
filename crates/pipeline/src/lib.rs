//! Materialization pipeline for catalog items.
//!
//! The [`Orchestrator`] turns a catalog item into correctly placed local
//! files: it streams the payload through the transfer engine, unpacks ZIP
//! containers into a per-title folder and records what it placed. Cover
//! images are fetched through the content cache by [`load_cover`].

mod covers;
mod error;
mod orchestrator;
mod types;

pub use covers::{load_cover, warm_covers};
pub use error::PipelineError;
pub use orchestrator::{ItemPaths, Orchestrator};
pub use types::{MaterializeOutcome, PipelineState};

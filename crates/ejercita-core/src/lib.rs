//! Configuration loading and the knowledge-base facade.

pub mod bootstrap;
pub mod config;
pub mod knowledge_base;

pub use config::Config;
pub use knowledge_base::{IngestionReport, IngestionStatus, KnowledgeBase};

//! maimai DX play history ingestion: scrape play records from the history
//! page, dedupe them into a JSON store, and summarize the collection.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod identity;
pub mod markup;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod safety;
pub mod stats;
pub mod store;

pub use error::{Error, Result};

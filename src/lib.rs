pub mod api;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod index;
pub mod metrics;
pub mod models;
pub mod search;
pub mod store;
pub mod tokenizer;

pub use api::{create_router, AppState};
pub use config::{Config, StoreOptions, TokenizerConfig};
pub use engine::SearchEngine;
pub use error::{MaildexError, Result};
pub use ids::IndexedId;
pub use metrics::SearchMetrics;
pub use models::*;
pub use store::{ColumnFamily, OpenMode, Store, WriteBatch};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

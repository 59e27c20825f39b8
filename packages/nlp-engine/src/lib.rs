//! TaskCanvas NLP Engine - Local Embedding and Fingerprint Service
//!
//! This crate turns task titles into comparable vectors using a local
//! llama.cpp sentence-embedding model, and produces content fingerprints so
//! the engine can tell whether a stored embedding still matches its text.
//!
//! # Features
//!
//! - **Local model**: GGUF model loaded from ~/.taskcanvas/models/, no
//!   network dependency at inference time
//! - **Lazy single-flight load**: first embed call loads the model once;
//!   concurrent first calls share the load
//! - **Unit-norm output**: mean-pooled, L2-normalized vectors so cosine
//!   similarity is a plain dot product
//! - **Efficient caching**: LRU cache with automatic eviction
//!
//! # Example
//!
//! ```ignore
//! use taskcanvas_nlp_engine::{fingerprint, EmbeddingConfig, EmbeddingService};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = EmbeddingService::new(EmbeddingConfig::default())?;
//!
//!     let vector = service.embed("Buy milk")?;
//!     let hash = fingerprint("Buy milk");
//!
//!     println!("dimension: {}, hash: {}", vector.len(), hash); // 384, sha-256 hex
//!     Ok(())
//! }
//! ```
pub mod config;
pub mod embedding;
pub mod error;
pub mod fingerprint;

// Re-export main types
pub use config::EmbeddingConfig;
pub use embedding::{EmbeddingService, EMBEDDING_DIMENSION};
pub use error::{EmbeddingError, Result};
pub use fingerprint::fingerprint;

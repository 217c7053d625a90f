//! Luma Storage Layer
//!
//! Provides persistence for the restart state: anchor equity, cooldowns,
//! ratchet records and trade stats.
//!
//! # Architecture
//!
//! - **Repository trait**: `StateRepository` defines the storage interface (port)
//! - **In-memory store**: Fast implementation for testing
//! - **JSON file store**: Production implementation with atomic writes
//!
//! # Usage
//!
//! ```rust
//! use luma_store::{MemoryStore, PersistedState, StateRepository};
//! use rust_decimal_macros::dec;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let state = PersistedState {
//!         anchor_equity: Some(dec!(1000)),
//!         ..Default::default()
//!     };
//!     store.save(&state).await.unwrap();
//!
//!     let restored = store.load().await.unwrap();
//!     println!("Anchor: {:?}", restored.anchor_equity);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod json_file;
mod memory;
mod repository;
mod state;

// Re-exports
pub use error::{StoreError, StoreResult};
pub use json_file::{write_atomic, JsonFileStore, STATE_FILE_NAME};
pub use memory::MemoryStore;
pub use repository::StateRepository;
pub use state::{PersistedState, STATE_VERSION};

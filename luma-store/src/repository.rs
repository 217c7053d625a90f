//! Repository trait definitions (Ports)
//!
//! The daemon loads restart state once at start and saves it after every
//! tick. Implementations can be a JSON file, in-memory, or mock for testing.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::state::PersistedState;

/// Repository for the restart state
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the last saved state.
    ///
    /// Returns `PersistedState::default()` when nothing was saved yet and
    /// `StoreError::Corrupted` when something was saved but cannot be read.
    async fn load(&self) -> Result<PersistedState, StoreError>;

    /// Replace the saved state
    async fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

//! In-memory store implementation
//!
//! Used for testing and development without touching the filesystem.
//! Thread-safe using RwLock for concurrent access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::StoreError;
use crate::repository::StateRepository;
use crate::state::PersistedState;

/// In-memory store for testing
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<Option<PersistedState>>,
    corrupted: RwLock<bool>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a previously saved state
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            ..Self::default()
        }
    }

    /// Last saved state, if any
    pub fn saved(&self) -> Option<PersistedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make the next loads report corruption (until the next save)
    pub fn corrupt(&self) {
        *self.corrupted.write().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

#[async_trait]
impl StateRepository for MemoryStore {
    async fn load(&self) -> Result<PersistedState, StoreError> {
        if *self.corrupted.read().unwrap_or_else(PoisonError::into_inner) {
            return Err(StoreError::corrupted("memory", "simulated corruption"));
        }
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        *self.corrupted.write().unwrap_or_else(PoisonError::into_inner) = false;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

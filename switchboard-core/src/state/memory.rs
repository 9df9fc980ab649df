use std::sync::Mutex;

use super::StateStore;
use crate::Result;

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    state: Mutex<T>,
}

impl<T> MemoryStore<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> StateStore<T> for MemoryStore<T> {
    fn load(&self) -> Result<T> {
        Ok(self.lock().clone())
    }

    fn update<R>(&self, apply: impl FnOnce(&mut T) -> R) -> Result<R> {
        Ok(apply(&mut self.lock()))
    }
}

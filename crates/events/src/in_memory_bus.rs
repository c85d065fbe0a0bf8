//! Process-local bus that also keeps every message it has seen.
//!
//! Handlers publish rejections here in tests and single-process setups; the
//! retained log lets callers inspect what went out without holding a
//! subscription from the start.

use std::sync::{Mutex, MutexGuard, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InMemoryBusError {
    #[error("in-memory bus lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct BusState<M> {
    listeners: Vec<mpsc::Sender<M>>,
    log: Vec<M>,
}

/// Fan-out bus over std channels with a retained publish log.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    state: Mutex<BusState<M>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, BusState<M>>, InMemoryBusError> {
        self.state.lock().map_err(|_| InMemoryBusError::Poisoned)
    }

    /// Live subscriptions; hung-up ones are only noticed on the next publish.
    pub fn subscriber_count(&self) -> usize {
        self.state().map_or(0, |s| s.listeners.len())
    }
}

impl<M: Clone> InMemoryEventBus<M> {
    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<M> {
        self.state().map(|s| s.log.clone()).unwrap_or_default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            state: Mutex::new(BusState {
                listeners: Vec::new(),
                log: Vec::new(),
            }),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut state = self.state()?;
        state.listeners.retain(|tx| tx.send(message.clone()).is_ok());
        state.log.push(message);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut state) = self.state() {
            state.listeners.push(tx);
        }
        Subscription::new(rx)
    }
}

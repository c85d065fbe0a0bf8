//! Per-aggregate buffer of events awaiting publication.

/// Owned, append-only bag of events attached to an aggregate.
///
/// The application layer records events here while it works with an
/// aggregate, reads them back as a read-only slice, and clears (or drains)
/// the bag once they have been published. There is no shared aliasing: the
/// aggregate owns the buffer outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvents<E> {
    events: Vec<E>,
}

impl<E> PendingEvents<E> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event.
    pub fn record(&mut self, event: E) {
        self.events.push(event);
    }

    /// Remove the first occurrence of `event`, returning whether one was found.
    pub fn remove(&mut self, event: &E) -> bool
    where
        E: PartialEq,
    {
        match self.events.iter().position(|e| e == event) {
            Some(idx) => {
                self.events.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Drain every buffered event, oldest first.
    pub fn take(&mut self) -> Vec<E> {
        core::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<E> Default for PendingEvents<E> {
    fn default() -> Self {
        Self::new()
    }
}

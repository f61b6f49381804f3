//! Store configuration (spec.md §6).
//!
//! No CLI and no environment variables are read here — configuration is a
//! plain value type the embedding application constructs, the way the
//! teacher crate is configured entirely through constructor arguments.
use std::time::Duration;

/// Tunables recognized by every `EventStore` implementation.
///
/// There is deliberately no isolation-level knob here: a guarded
/// `append_if` needs `SERIALIZABLE` to make "exactly one writer wins" hold
/// across sessions (spec.md I6), so a backend that honors conditions at all
/// must use it unconditionally, not as a caller-selectable default that
/// could be dialed back down to something weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    max_batch_size: usize,
    stream_buffer: usize,
    query_timeout: Duration,
    append_timeout: Duration,
}

impl StoreConfig {
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    pub fn with_stream_buffer(mut self, stream_buffer: usize) -> Self {
        self.stream_buffer = stream_buffer;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn append_timeout(&self) -> Duration {
        self.append_timeout
    }

    pub fn with_append_timeout(mut self, timeout: Duration) -> Self {
        self.append_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            stream_buffer: 1000,
            query_timeout: Duration::from_secs(30),
            append_timeout: Duration::from_secs(30),
        }
    }
}

//! Per-transfer session state.

use std::time::{Duration, Instant};

use crate::transfer::Direction;
use crate::DEFAULT_CHUNK_SIZE;

/// Lifecycle of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming,
    Finishing,
    Done,
    Failed,
}

/// Transient state for one transfer: created when the request is
/// issued, destroyed when it finishes or fails, never persisted.
///
/// Counters are local to the session; nothing is shared between
/// transfers.
#[derive(Debug)]
pub struct TransferSession {
    direction: Direction,
    state: SessionState,
    /// Logical length of the source stream.
    len: u64,
    /// Progress denominator. On download this is the backend's size
    /// estimate (allocation or capacity) and may differ from `len`.
    expected_total: u64,
    transferred: u64,
    chunk_size: usize,
    started_at: Instant,
}

impl TransferSession {
    pub fn new(direction: Direction, len: u64, expected_total: u64) -> Self {
        Self {
            direction,
            state: SessionState::Init,
            len,
            expected_total,
            transferred: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            started_at: Instant::now(),
        }
    }

    /// Overrides the chunk size bounding one read/write step.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        self.chunk_size = chunk_size;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Logical length of the source stream.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn expected_total(&self) -> u64 {
        self.expected_total
    }

    /// Cumulative bytes consumed so far, counting skipped holes:
    /// progress reflects logical position, not physical bytes moved.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub(crate) fn add(&mut self, bytes: u64) {
        self.transferred += bytes;
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_in_init() {
        let session = TransferSession::new(Direction::Upload, 100, 100);
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.transferred(), 0);
        assert_eq!(session.len(), 100);
        assert_eq!(session.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn add_accumulates() {
        let mut session = TransferSession::new(Direction::Download, 100, 100);
        session.add(40);
        session.add(60);
        assert_eq!(session.transferred(), 100);
    }

    #[test]
    fn chunk_size_override() {
        let session = TransferSession::new(Direction::Upload, 1, 1).with_chunk_size(512);
        assert_eq!(session.chunk_size(), 512);
    }

    #[test]
    #[should_panic(expected = "chunk size must be positive")]
    fn zero_chunk_size_panics() {
        let _ = TransferSession::new(Direction::Upload, 1, 1).with_chunk_size(0);
    }
}

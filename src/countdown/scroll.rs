//! Pause-while-scrolling heuristic.
//!
//! While a list is being scrolled the engine does not tick. A poller compares
//! the scroll offset between polls and resumes ticking once it stops moving.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that can report how far a list is scrolled.
pub trait ScrollSource: Send + Sync {
  fn scroll_offset(&self) -> f64;
}

/// Outcome of one scroll poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollActivity {
  Scrolling,
  Settled,
}

/// Remembers the last observed offset.
#[derive(Debug, Clone, Copy)]
pub struct ScrollGate {
  last_offset: f64,
}

impl ScrollGate {
  pub fn new(offset: f64) -> Self {
    Self {
      last_offset: offset,
    }
  }

  /// Compare `offset` with the previous poll and record it.
  pub fn poll(&mut self, offset: f64) -> ScrollActivity {
    if offset == self.last_offset {
      ScrollActivity::Settled
    } else {
      self.last_offset = offset;
      ScrollActivity::Scrolling
    }
  }
}

/// Scroll offset a view can update from its own event handling.
#[derive(Debug, Clone, Default)]
pub struct ScrollOffset {
  bits: Arc<AtomicU64>,
}

impl ScrollOffset {
  pub fn new(offset: f64) -> Self {
    Self {
      bits: Arc::new(AtomicU64::new(offset.to_bits())),
    }
  }

  pub fn set(&self, offset: f64) {
    self.bits.store(offset.to_bits(), Ordering::Relaxed);
  }
}

impl ScrollSource for ScrollOffset {
  fn scroll_offset(&self) -> f64 {
    f64::from_bits(self.bits.load(Ordering::Relaxed))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unchanged_offset_settles() {
    let mut gate = ScrollGate::new(120.0);
    assert_eq!(gate.poll(120.0), ScrollActivity::Settled);
  }

  #[test]
  fn test_moving_offset_keeps_scrolling() {
    let mut gate = ScrollGate::new(0.0);
    assert_eq!(gate.poll(40.0), ScrollActivity::Scrolling);
    assert_eq!(gate.poll(90.0), ScrollActivity::Scrolling);
    assert_eq!(gate.poll(90.0), ScrollActivity::Settled);
  }

  #[test]
  fn test_scroll_offset_shared_between_clones() {
    let offset = ScrollOffset::new(3.5);
    let view_side = offset.clone();
    view_side.set(10.25);
    assert_eq!(offset.scroll_offset(), 10.25);
  }
}

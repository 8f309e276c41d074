use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::countdown::{CountdownEngine, RegistrationId};

/// Emitted once per tick, after every entity of the collection was updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickEvent {
  pub registration: RegistrationId,
  /// Instant the pass was computed for
  pub at: DateTime<Utc>,
  /// Number of entities in the collection during the pass
  pub len: usize,
}

/// An entity whose countdown reached "Ended" during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedItem {
  /// Position in the collection at the time of the tick
  pub index: usize,
  pub key: String,
}

/// Emitted after a tick in which at least one entity newly ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedEvent {
  pub registration: RegistrationId,
  pub items: Vec<EndedItem>,
}

/// Countdown notifications merged into a single stream
#[derive(Debug)]
pub enum Event {
  /// Collection was refreshed by a tick
  Tick(TickEvent),
  /// Some entities ended during a tick
  Ended(EndedEvent),
  /// The consumer fell behind and this many notifications were dropped
  Lagged(u64),
}

/// Event handler that forwards both engine channels into one receiver
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Subscribe to `engine`. Must be called from within a Tokio runtime.
  pub fn new(engine: &CountdownEngine) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(forward(engine.subscribe_ticks(), tx.clone(), Event::Tick));
    tokio::spawn(forward(engine.subscribe_ended(), tx, Event::Ended));

    Self { rx }
  }

  /// Receive the next event. `None` once the engine is gone.
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

async fn forward<E: Clone>(
  mut source: broadcast::Receiver<E>,
  tx: mpsc::UnboundedSender<Event>,
  wrap: fn(E) -> Event,
) {
  loop {
    let event = match source.recv().await {
      Ok(event) => wrap(event),
      Err(broadcast::error::RecvError::Lagged(missed)) => Event::Lagged(missed),
      Err(broadcast::error::RecvError::Closed) => break,
    };
    if tx.send(event).is_err() {
      break;
    }
  }
}

//! The countdown engine: one active registration, ticked on an interval.

use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::fields::{Countdown, CountdownFields, Deadline, SharedCollection};
use super::format::{format_countdown, ENDED};
use super::scroll::{ScrollActivity, ScrollGate, ScrollSource};
use crate::auction::SortMode;
use crate::clock::Clock;
use crate::event::{EndedEvent, EndedItem, TickEvent};

const CHANNEL_CAPACITY: usize = 64;

/// Identifies one call to `CountdownEngine::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
  /// No registration, no timers
  #[default]
  Idle,
  /// Tick interval active
  Running,
  /// Registered, waiting for the list to stop scrolling
  PausedForScroll,
}

/// Timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSettings {
  pub tick_interval: Duration,
  pub scroll_poll_interval: Duration,
}

impl Default for CountdownSettings {
  fn default() -> Self {
    Self {
      tick_interval: Duration::from_millis(1000),
      scroll_poll_interval: Duration::from_millis(500),
    }
  }
}

/// Per-registration options.
#[derive(Clone, Default)]
pub struct CountdownOptions {
  /// Sort order of the displayed list. Newest-first lists show the end time itself.
  pub sort_mode: Option<SortMode>,
  /// When present, ticking waits until this source stops scrolling.
  pub scroll: Option<Arc<dyn ScrollSource>>,
}

impl CountdownOptions {
  pub fn sorted_by(mut self, sort_mode: SortMode) -> Self {
    self.sort_mode = Some(sort_mode);
    self
  }

  pub fn with_scroll_source(mut self, source: Arc<dyn ScrollSource>) -> Self {
    self.scroll = Some(source);
    self
  }
}

/// Outcome of a single pass over the registered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
  pub len: usize,
  pub ended: Vec<EndedItem>,
}

trait TickTarget: Send + Sync {
  fn tick(&self, now: DateTime<Utc>) -> TickReport;
}

struct Registration<T> {
  collection: SharedCollection<T>,
  fields: CountdownFields<T>,
  newest_first: bool,
}

impl<T: Send> Registration<T> {
  /// Update one entity. Returns its key if it ended during this pass.
  fn update(&self, item: &mut T, now: DateTime<Utc>) -> Option<String> {
    let fields = &self.fields;

    if (fields.display)(item).as_str() == ENDED {
      return None;
    }

    if self.newest_first {
      let listed = (fields.target)(item).to_string();
      *(fields.display)(item) = listed;
      return None;
    }

    let memo = *(fields.deadline)(item);
    let deadline = match memo {
      Some(deadline) => deadline,
      None => {
        let parsed = Deadline::parse((fields.target)(item));
        if parsed == Deadline::Unparseable {
          warn!(
            key = (fields.key)(item),
            end_time = (fields.target)(item),
            "unparseable end time, treating as ended"
          );
        }
        *(fields.deadline)(item) = Some(parsed);
        parsed
      }
    };

    let text = match deadline {
      Deadline::At(target) => format_countdown(target, now),
      Deadline::Unparseable => ENDED.to_string(),
    };
    let ended = text == ENDED;
    *(fields.display)(item) = text;

    if !ended {
      return None;
    }
    if let Some(has_ended) = fields.has_ended {
      *has_ended(item) = true;
    }
    Some((fields.key)(item).to_string())
  }
}

impl<T: Send> TickTarget for Registration<T> {
  fn tick(&self, now: DateTime<Utc>) -> TickReport {
    let mut items = self
      .collection
      .lock()
      .unwrap_or_else(PoisonError::into_inner);

    let mut ended = Vec::new();
    for (index, item) in items.iter_mut().enumerate() {
      match panic::catch_unwind(AssertUnwindSafe(|| self.update(item, now))) {
        Ok(Some(key)) => ended.push(EndedItem { index, key }),
        Ok(None) => {}
        Err(_) => warn!(index, "countdown update panicked, entity skipped"),
      }
    }

    TickReport {
      len: items.len(),
      ended,
    }
  }
}

struct Active {
  id: RegistrationId,
  target: Arc<dyn TickTarget>,
}

#[derive(Default)]
struct Inner {
  next_id: u64,
  phase: EngineState,
  active: Option<Active>,
  ticker: Option<JoinHandle<()>>,
  scroll_watch: Option<JoinHandle<()>>,
}

impl Inner {
  fn stop_timers(&mut self) {
    if let Some(ticker) = self.ticker.take() {
      ticker.abort();
    }
    if let Some(watch) = self.scroll_watch.take() {
      watch.abort();
    }
  }

  fn is_active(&self, id: RegistrationId) -> bool {
    self.active.as_ref().is_some_and(|a| a.id == id)
  }
}

struct Shared {
  clock: Arc<dyn Clock>,
  settings: CountdownSettings,
  state: Mutex<Inner>,
  ticks: broadcast::Sender<TickEvent>,
  ended: broadcast::Sender<EndedEvent>,
}

impl Shared {
  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Run one pass for `id`. `None` if `id` is no longer the active registration.
  fn tick(&self, id: RegistrationId) -> Option<TickReport> {
    let target = {
      let inner = self.lock();
      match &inner.active {
        Some(active) if active.id == id => Arc::clone(&active.target),
        _ => return None,
      }
    };

    let now = self.clock.now();
    let report = target.tick(now);

    // A clear or re-register may have landed while the pass ran unlocked.
    if !self.lock().is_active(id) {
      debug!(registration = %id, "pass finished after registration was retired");
      return None;
    }

    // Send errors only mean nobody is subscribed.
    let _ = self.ticks.send(TickEvent {
      registration: id,
      at: now,
      len: report.len,
    });
    if !report.ended.is_empty() {
      debug!(registration = %id, count = report.ended.len(), "items ended");
      let _ = self.ended.send(EndedEvent {
        registration: id,
        items: report.ended.clone(),
      });
    }

    Some(report)
  }

  fn clear(&self) {
    let mut inner = self.lock();
    inner.stop_timers();
    inner.phase = EngineState::Idle;
    if let Some(active) = inner.active.take() {
      info!(registration = %active.id, "countdown cleared");
    }
  }

  fn resume_after_scroll(self: &Arc<Self>, id: RegistrationId) {
    let mut inner = self.lock();
    if !inner.is_active(id) || inner.phase != EngineState::PausedForScroll {
      return;
    }
    // Called from the scroll watch itself, so its handle is detached rather than aborted.
    inner.scroll_watch.take();
    inner.phase = EngineState::Running;
    inner.ticker = Some(spawn_ticker(
      Arc::downgrade(self),
      id,
      self.settings.tick_interval,
    ));
    debug!(registration = %id, "scrolling settled, countdown resumed");
  }
}

impl Drop for Shared {
  fn drop(&mut self) {
    self
      .state
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .stop_timers();
  }
}

fn spawn_ticker(shared: Weak<Shared>, id: RegistrationId, period: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      interval.tick().await;
      let Some(shared) = shared.upgrade() else {
        break;
      };
      if shared.tick(id).is_none() {
        break;
      }
    }
  })
}

fn spawn_scroll_watch(
  shared: Weak<Shared>,
  id: RegistrationId,
  source: Arc<dyn ScrollSource>,
  mut gate: ScrollGate,
  period: Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
      interval.tick().await;
      let Some(shared) = shared.upgrade() else {
        break;
      };
      if gate.poll(source.scroll_offset()) == ScrollActivity::Settled {
        shared.resume_after_scroll(id);
        break;
      }
    }
  })
}

/// Keeps one collection's countdown text current.
///
/// Only one registration is active at a time; registering another retires
/// the previous one. Views must call `clear_countdown` (or
/// `RegistrationHandle::clear`) when they are left.
///
/// Clones share the same state. Timers stop when the last clone is dropped.
#[derive(Clone)]
pub struct CountdownEngine {
  shared: Arc<Shared>,
}

impl CountdownEngine {
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self::with_settings(clock, CountdownSettings::default())
  }

  pub fn with_settings(clock: Arc<dyn Clock>, settings: CountdownSettings) -> Self {
    let (ticks, _) = broadcast::channel(CHANNEL_CAPACITY);
    let (ended, _) = broadcast::channel(CHANNEL_CAPACITY);

    Self {
      shared: Arc::new(Shared {
        clock,
        settings,
        state: Mutex::new(Inner::default()),
        ticks,
        ended,
      }),
    }
  }

  pub fn state(&self) -> EngineState {
    self.shared.lock().phase
  }

  pub fn active_registration(&self) -> Option<RegistrationId> {
    self.shared.lock().active.as_ref().map(|a| a.id)
  }

  /// Notifications sent after every completed pass.
  pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickEvent> {
    self.shared.ticks.subscribe()
  }

  /// Notifications carrying the entities that ended during a pass.
  pub fn subscribe_ended(&self) -> broadcast::Receiver<EndedEvent> {
    self.shared.ended.subscribe()
  }

  /// Start ticking `collection`, retiring any previous registration.
  ///
  /// Must be called from within a Tokio runtime.
  pub fn register<T: Send + 'static>(
    &self,
    collection: SharedCollection<T>,
    fields: CountdownFields<T>,
    options: CountdownOptions,
  ) -> RegistrationHandle {
    let newest_first = options
      .sort_mode
      .is_some_and(|mode| mode.is_newest_first());
    let target: Arc<dyn TickTarget> = Arc::new(Registration {
      collection,
      fields,
      newest_first,
    });

    let mut inner = self.shared.lock();
    inner.stop_timers();
    inner.next_id += 1;
    let id = RegistrationId(inner.next_id);

    match inner.active.replace(Active { id, target }) {
      Some(previous) => {
        info!(registration = %id, previous = %previous.id, "countdown registration replaced")
      }
      None => info!(registration = %id, "countdown registered"),
    }

    let weak = Arc::downgrade(&self.shared);
    match options.scroll {
      Some(source) => {
        let gate = ScrollGate::new(source.scroll_offset());
        inner.phase = EngineState::PausedForScroll;
        inner.scroll_watch = Some(spawn_scroll_watch(
          weak,
          id,
          source,
          gate,
          self.shared.settings.scroll_poll_interval,
        ));
      }
      None => {
        inner.phase = EngineState::Running;
        inner.ticker = Some(spawn_ticker(weak, id, self.shared.settings.tick_interval));
      }
    }

    RegistrationHandle {
      id,
      shared: Arc::downgrade(&self.shared),
    }
  }

  /// Register an entity type that knows its own countdown fields.
  pub fn register_collection<T: Countdown>(
    &self,
    collection: SharedCollection<T>,
    options: CountdownOptions,
  ) -> RegistrationHandle {
    self.register(collection, T::countdown_fields(), options)
  }

  /// Stop ticking and forget the registration. Safe to call at any time.
  pub fn clear_countdown(&self) {
    self.shared.clear();
  }

  /// Run one pass for the active registration right away.
  pub fn tick_now(&self) -> Option<TickReport> {
    let id = self.active_registration()?;
    self.shared.tick(id)
  }
}

/// Returned by `CountdownEngine::register`.
///
/// A handle only controls its own registration; once replaced it is inert.
#[derive(Debug, Clone)]
pub struct RegistrationHandle {
  id: RegistrationId,
  shared: Weak<Shared>,
}

impl RegistrationHandle {
  pub fn id(&self) -> RegistrationId {
    self.id
  }

  pub fn is_active(&self) -> bool {
    self
      .shared
      .upgrade()
      .is_some_and(|shared| shared.lock().is_active(self.id))
  }

  /// Clear the engine if this handle's registration is still active.
  pub fn clear(&self) -> bool {
    let Some(shared) = self.shared.upgrade() else {
      return false;
    };
    if !shared.lock().is_active(self.id) {
      return false;
    }
    shared.clear();
    true
  }
}

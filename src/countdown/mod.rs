//! Live "time remaining" text for cached auction lists.
//!
//! A view registers the collection it displays with the `CountdownEngine`.
//! Once per tick the engine rewrites each entity's display field in place,
//! flags entities that just ended, and publishes two notifications: one per
//! completed pass and one per batch of newly ended entities.

mod engine;
mod fields;
mod format;
mod scroll;

pub use engine::{
  CountdownEngine, CountdownOptions, CountdownSettings, EngineState, RegistrationHandle,
  RegistrationId, TickReport,
};
pub use fields::{
  shared, Countdown, CountdownFields, Deadline, SharedCollection, LOCAL_END_TIME_FORMAT,
};
pub use format::{format_countdown, ENDED};
pub use scroll::{ScrollActivity, ScrollGate, ScrollOffset, ScrollSource};

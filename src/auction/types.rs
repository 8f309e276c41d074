use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::countdown::{Countdown, CountdownFields, Deadline};

/// Search result ordering understood by the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortMode {
  #[default]
  #[serde(rename = "MetaEndSort")]
  EndingSoonest,
  #[serde(rename = "MetaNewSort")]
  NewlyListed,
  #[serde(rename = "PricePlusShipLowest")]
  PriceLowest,
  #[serde(rename = "PricePlusShipHighest")]
  PriceHighest,
}

impl SortMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::EndingSoonest => "MetaEndSort",
      Self::NewlyListed => "MetaNewSort",
      Self::PriceLowest => "PricePlusShipLowest",
      Self::PriceHighest => "PricePlusShipHighest",
    }
  }

  /// Newest-first lists show when an item was listed, not how long it has left.
  pub fn is_newest_first(&self) -> bool {
    matches!(self, Self::NewlyListed)
  }
}

impl fmt::Display for SortMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "metaendsort" | "ending" | "ending-soonest" => Ok(Self::EndingSoonest),
      "metanewsort" | "newest" | "newly-listed" => Ok(Self::NewlyListed),
      "priceplusshiplowest" | "price-low" => Ok(Self::PriceLowest),
      "priceplusshiphighest" | "price-high" => Ok(Self::PriceHighest),
      other => Err(format!("unknown sort mode '{}'", other)),
    }
  }
}

/// Entity with a server end time that gets a local end time and a countdown.
pub trait Listing: Countdown + Clone + Sync {
  fn item_id(&self) -> &str;

  /// End time as sent by the server (UTC)
  fn end_time_utc(&self) -> &str;

  /// Local end time, derived from `end_time_utc`
  fn end_time_mut(&mut self) -> &mut String;
}

/// One search hit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchItem {
  pub item_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub current_price: f64,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub bid_count: u32,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub end_time_utc: String,
  #[serde(default)]
  pub end_time: String,
  #[serde(default, rename = "CountDownTime")]
  pub countdown: String,
  #[serde(skip)]
  pub deadline: Option<Deadline>,
}

/// An item on the user's watch list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Watch {
  pub item_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub current_price: f64,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub bid_count: u32,
  #[serde(default)]
  pub end_time_utc: String,
  #[serde(default)]
  pub end_time: String,
  #[serde(default, rename = "CountDownTime")]
  pub countdown: String,
  #[serde(default)]
  pub has_ended: bool,
  #[serde(skip)]
  pub deadline: Option<Deadline>,
}

/// A scheduled (or finished) snipe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snipe {
  pub snipe_id: String,
  pub item_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub max_bid: f64,
  #[serde(default)]
  pub current_price: f64,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub end_time_utc: String,
  #[serde(default)]
  pub end_time: String,
  #[serde(default, rename = "CountDownTime")]
  pub countdown: String,
  #[serde(default)]
  pub has_ended: bool,
  #[serde(skip)]
  pub deadline: Option<Deadline>,
}

/// A search the user saved on the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedSearch {
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub terms: String,
  #[serde(default)]
  pub sort: Option<SortMode>,
  #[serde(default)]
  pub country: Option<u32>,
}

/// Full item details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDetail {
  pub item_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub seller: Option<String>,
  #[serde(default)]
  pub current_price: f64,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub bid_count: u32,
  #[serde(default)]
  pub end_time_utc: String,
  #[serde(default)]
  pub end_time: String,
  #[serde(default, rename = "CountDownTime")]
  pub countdown: String,
  #[serde(skip)]
  pub deadline: Option<Deadline>,
}

// ============================================================================
// Countdown and Listing implementations
// ============================================================================

impl Countdown for SearchItem {
  fn countdown_fields() -> CountdownFields<Self> {
    CountdownFields {
      key: |item| item.item_id.as_str(),
      target: |item| item.end_time.as_str(),
      display: |item| &mut item.countdown,
      deadline: |item| &mut item.deadline,
      has_ended: None,
    }
  }
}

impl Listing for SearchItem {
  fn item_id(&self) -> &str {
    &self.item_id
  }

  fn end_time_utc(&self) -> &str {
    &self.end_time_utc
  }

  fn end_time_mut(&mut self) -> &mut String {
    &mut self.end_time
  }
}

fn watch_has_ended(watch: &mut Watch) -> &mut bool {
  &mut watch.has_ended
}

impl Countdown for Watch {
  fn countdown_fields() -> CountdownFields<Self> {
    CountdownFields {
      key: |watch| watch.item_id.as_str(),
      target: |watch| watch.end_time.as_str(),
      display: |watch| &mut watch.countdown,
      deadline: |watch| &mut watch.deadline,
      has_ended: Some(watch_has_ended),
    }
  }
}

impl Listing for Watch {
  fn item_id(&self) -> &str {
    &self.item_id
  }

  fn end_time_utc(&self) -> &str {
    &self.end_time_utc
  }

  fn end_time_mut(&mut self) -> &mut String {
    &mut self.end_time
  }
}

fn snipe_has_ended(snipe: &mut Snipe) -> &mut bool {
  &mut snipe.has_ended
}

impl Countdown for Snipe {
  fn countdown_fields() -> CountdownFields<Self> {
    CountdownFields {
      key: |snipe| snipe.snipe_id.as_str(),
      target: |snipe| snipe.end_time.as_str(),
      display: |snipe| &mut snipe.countdown,
      deadline: |snipe| &mut snipe.deadline,
      has_ended: Some(snipe_has_ended),
    }
  }
}

impl Listing for Snipe {
  fn item_id(&self) -> &str {
    &self.item_id
  }

  fn end_time_utc(&self) -> &str {
    &self.end_time_utc
  }

  fn end_time_mut(&mut self) -> &mut String {
    &mut self.end_time
  }
}

impl Countdown for ItemDetail {
  fn countdown_fields() -> CountdownFields<Self> {
    CountdownFields {
      key: |item| item.item_id.as_str(),
      target: |item| item.end_time.as_str(),
      display: |item| &mut item.countdown,
      deadline: |item| &mut item.deadline,
      has_ended: None,
    }
  }
}

impl Listing for ItemDetail {
  fn item_id(&self) -> &str {
    &self.item_id
  }

  fn end_time_utc(&self) -> &str {
    &self.end_time_utc
  }

  fn end_time_mut(&mut self) -> &mut String {
    &mut self.end_time
  }
}

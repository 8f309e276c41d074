use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a snipe, as understood by the snipes endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnipeStatus {
  Active,
  Won,
  Lost,
}

impl SnipeStatus {
  pub const ALL: [SnipeStatus; 3] = [SnipeStatus::Active, SnipeStatus::Won, SnipeStatus::Lost];

  /// Value used for the `status` query parameter.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Won => "won",
      Self::Lost => "lost",
    }
  }
}

impl fmt::Display for SnipeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SnipeStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "active" => Ok(Self::Active),
      "won" => Ok(Self::Won),
      "lost" => Ok(Self::Lost),
      other => Err(format!("unknown snipe status '{}'", other)),
    }
  }
}

/// Identifies one cached collection.
///
/// Snipe caches are three independent entries, not one list filtered three ways.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
  SearchResults,
  Watches,
  SavedSearches,
  Detail { item_id: String },
  Snipes(SnipeStatus),
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SearchResults => f.write_str("search results"),
      Self::Watches => f.write_str("watches"),
      Self::SavedSearches => f.write_str("saved searches"),
      Self::Detail { item_id } => write!(f, "item {}", item_id),
      Self::Snipes(status) => write!(f, "{} snipes", status),
    }
  }
}

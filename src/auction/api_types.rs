//! Serde-deserializable envelopes matching the auction API responses.
//!
//! Every endpoint answers `{ "success": bool, "message": string?, <payload> }`
//! where the payload key depends on the endpoint.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

use super::types::{ItemDetail, SavedSearch, SearchItem, Snipe, Watch};

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(flatten)]
  pub payload: T,
}

impl<T> ApiEnvelope<T> {
  /// Unwrap the payload, turning `success: false` into an error carrying the server message.
  pub fn into_payload(self, action: &str) -> Result<T> {
    if self.success {
      Ok(self.payload)
    } else {
      let message = self
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "server reported failure".to_string());
      Err(eyre!("Failed to {}: {}", action, message))
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchPayload {
  #[serde(default)]
  pub items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WatchesPayload {
  #[serde(default)]
  pub watches: Vec<Watch>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnipesPayload {
  #[serde(default)]
  pub snipes: Vec<Snipe>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SavedSearchesPayload {
  #[serde(default)]
  pub searches: Vec<SavedSearch>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemPayload {
  #[serde(default)]
  pub item: Option<ItemDetail>,
}

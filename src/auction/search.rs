//! Search parameters and the cached page state they map to.

use sha2::{Digest, Sha256};

use super::types::{SearchItem, SortMode};
use crate::countdown::SharedCollection;

/// Parameters of one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
  pub terms: String,
  pub sort: SortMode,
  /// 1-based page number
  pub page: u32,
  pub saved_search_id: Option<String>,
  /// Country filter, 0 for any
  pub country: u32,
  /// Restrict to items located in `country` rather than available to it
  pub located_in: bool,
  /// Replace the cached pages with this page instead of appending
  pub rebase: bool,
}

impl SearchQuery {
  pub fn new(terms: impl Into<String>) -> Self {
    Self {
      terms: terms.into(),
      sort: SortMode::default(),
      page: 1,
      saved_search_id: None,
      country: 0,
      located_in: false,
      rebase: false,
    }
  }

  pub fn sort(mut self, sort: SortMode) -> Self {
    self.sort = sort;
    self
  }

  pub fn page(mut self, page: u32) -> Self {
    self.page = page.max(1);
    self
  }

  pub fn country(mut self, country: u32) -> Self {
    self.country = country;
    self
  }

  pub fn located_in(mut self, located_in: bool) -> Self {
    self.located_in = located_in;
    self
  }

  pub fn saved_search(mut self, id: impl Into<String>) -> Self {
    self.saved_search_id = Some(id.into());
    self
  }

  pub fn rebase(mut self, rebase: bool) -> Self {
    self.rebase = rebase;
    self
  }

  /// Identify the filter set, ignoring page and rebase.
  ///
  /// Two queries with the same fingerprint page through the same result list.
  pub fn fingerprint(&self) -> String {
    let input = format!(
      "terms:{}|sort:{}|saved:{}|country:{}|located_in:{}",
      normalize_terms(&self.terms),
      self.sort.as_str(),
      self.saved_search_id.as_deref().unwrap_or(""),
      self.country,
      self.located_in,
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Query string parameters for the search endpoint.
  pub fn to_params(&self) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("terms", self.terms.trim().to_string()),
      ("sort", self.sort.as_str().to_string()),
      ("page", self.page.to_string()),
      ("country", self.country.to_string()),
      ("locatedIn", self.located_in.to_string()),
    ];
    if let Some(id) = &self.saved_search_id {
      params.push(("savedSearchId", id.clone()));
    }
    params
  }
}

/// Collapse whitespace and lowercase so equivalent term strings share a cache entry.
fn normalize_terms(terms: &str) -> String {
  terms
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// Cached state of the current search: which filters, how many pages, which items.
#[derive(Debug, Clone)]
pub struct SearchPages {
  pub fingerprint: String,
  /// First page contained in `items`
  pub first_page: u32,
  /// Last page contained in `items`
  pub last_page: u32,
  pub items: SharedCollection<SearchItem>,
}

impl SearchPages {
  /// Whether `query` can be answered from these pages without a fetch.
  pub fn covers(&self, query: &SearchQuery) -> bool {
    self.fingerprint == query.fingerprint()
      && (self.first_page..=self.last_page).contains(&query.page)
  }
}

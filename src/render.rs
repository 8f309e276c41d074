//! Plain-text rows for printing auction lists.

use crate::auction::{SavedSearch, SearchItem, Snipe, Watch};

const TITLE_WIDTH: usize = 40;

/// Truncate a string to at most `max_chars` characters, adding "..." if truncated
pub fn truncate(s: &str, max_chars: usize) -> String {
  if s.chars().count() <= max_chars {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

fn price(amount: f64, currency: &str) -> String {
  if currency.is_empty() {
    format!("{:.2}", amount)
  } else {
    format!("{:.2} {}", amount, currency)
  }
}

/// One printable line per entity
pub trait TableRow {
  fn row(&self) -> String;
}

impl TableRow for SearchItem {
  fn row(&self) -> String {
    format!(
      "{:<14} {:<40} {:>14} {:>4} bids  {:<12} {}",
      self.item_id,
      truncate(&self.title, TITLE_WIDTH),
      price(self.current_price, &self.currency),
      self.bid_count,
      self.countdown,
      self.end_time,
    )
  }
}

impl TableRow for Watch {
  fn row(&self) -> String {
    let marker = if self.has_ended { "x" } else { " " };
    format!(
      "{} {:<14} {:<40} {:>14} {:<12} {}",
      marker,
      self.item_id,
      truncate(&self.title, TITLE_WIDTH),
      price(self.current_price, &self.currency),
      self.countdown,
      self.end_time,
    )
  }
}

impl TableRow for Snipe {
  fn row(&self) -> String {
    format!(
      "{:<10} {:<14} {:<40} max {:>14} {:<8} {}",
      self.snipe_id,
      self.item_id,
      truncate(&self.title, TITLE_WIDTH),
      price(self.max_bid, &self.currency),
      self.status,
      self.countdown,
    )
  }
}

impl TableRow for SavedSearch {
  fn row(&self) -> String {
    let sort = self.sort.map(|s| s.to_string()).unwrap_or_default();
    format!("{:<10} {:<30} {:<30} {}", self.id, truncate(&self.name, 30), self.terms, sort)
  }
}

//! Auction service access: wire types, the HTTP client and the cached data source.

mod api_types;
mod client;
mod search;
mod source;
mod time;
mod types;

pub use client::{AuctionApi, HttpAuctionClient};
pub use search::{SearchPages, SearchQuery};
pub use source::DataSource;
pub use time::{localize, parse_server_time, parse_utc_offset, DisplayZone};
pub use types::{ItemDetail, Listing, SavedSearch, SearchItem, Snipe, SortMode, Watch};

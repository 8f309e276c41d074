use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{
  ApiEnvelope, ItemPayload, SavedSearchesPayload, SearchPayload, SnipesPayload, WatchesPayload,
};
use super::search::SearchQuery;
use super::types::{ItemDetail, SavedSearch, SearchItem, Snipe, Watch};
use crate::cache::SnipeStatus;
use crate::config::Config;

/// Network side of the auction service, one call per collection.
///
/// Implementations return entities exactly as the server sent them; time
/// normalization and caching happen in `DataSource`.
pub trait AuctionApi: Send + Sync {
  fn search(&self, query: &SearchQuery) -> impl Future<Output = Result<Vec<SearchItem>>> + Send;

  fn watches(&self) -> impl Future<Output = Result<Vec<Watch>>> + Send;

  fn snipes(&self, status: SnipeStatus) -> impl Future<Output = Result<Vec<Snipe>>> + Send;

  fn saved_searches(&self) -> impl Future<Output = Result<Vec<SavedSearch>>> + Send;

  fn item_detail(&self, item_id: &str) -> impl Future<Output = Result<ItemDetail>> + Send;
}

/// Auction API client over HTTPS
#[derive(Clone)]
pub struct HttpAuctionClient {
  http: reqwest::Client,
  base: Url,
  username: String,
  token: String,
}

impl HttpAuctionClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;

    let mut base = Url::parse(&config.api.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", config.api.url, e))?;
    // Endpoints are joined relative to the base, which needs a trailing slash.
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("snipewatch/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      username: config.api.username.clone(),
      token,
    })
  }

  async fn get<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    params: &[(&str, String)],
    action: &str,
  ) -> Result<T> {
    let url = self
      .base
      .join(endpoint)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", endpoint, e))?;
    debug!(%url, "GET");

    let response = self
      .http
      .get(url)
      .basic_auth(&self.username, Some(&self.token))
      .query(params)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to {}: {}", action, e))?;

    let envelope: ApiEnvelope<T> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", action, e))?;

    envelope.into_payload(action)
  }
}

impl AuctionApi for HttpAuctionClient {
  async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchItem>> {
    let payload: SearchPayload = self
      .get("search", &query.to_params(), "search auctions")
      .await?;
    Ok(payload.items)
  }

  async fn watches(&self) -> Result<Vec<Watch>> {
    let payload: WatchesPayload = self.get("watches", &[], "load watches").await?;
    Ok(payload.watches)
  }

  async fn snipes(&self, status: SnipeStatus) -> Result<Vec<Snipe>> {
    let params = [("status", status.as_str().to_string())];
    let payload: SnipesPayload = self
      .get("snipes", &params, &format!("load {} snipes", status))
      .await?;
    Ok(payload.snipes)
  }

  async fn saved_searches(&self) -> Result<Vec<SavedSearch>> {
    let payload: SavedSearchesPayload = self
      .get("savedsearches", &[], "load saved searches")
      .await?;
    Ok(payload.searches)
  }

  async fn item_detail(&self, item_id: &str) -> Result<ItemDetail> {
    let endpoint = format!("items/{}", item_id);
    let action = format!("load item {}", item_id);
    let payload: ItemPayload = self.get(&endpoint, &[], &action).await?;
    payload
      .item
      .ok_or_else(|| eyre!("Failed to {}: response contained no item", action))
  }
}

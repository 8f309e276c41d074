//! Data source that wraps an `AuctionApi` with transparent caching.

use color_eyre::Result;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use tracing::debug;

use super::client::AuctionApi;
use super::search::{SearchPages, SearchQuery};
use super::time::{localize, DisplayZone};
use super::types::{ItemDetail, Listing, SavedSearch, SearchItem, Snipe, Watch};
use crate::cache::{CacheKey, CacheStore, FreshnessPolicy, SnipeStatus};
use crate::countdown::{shared, SharedCollection};

/// Auction collections with caching.
///
/// Every collection is looked up in the `CacheStore` under the caller's
/// freshness policy first. Only misses reach the network; fetched entities get
/// their local end time derived before they are stored and returned.
///
/// Fetch failures are returned as-is. Stale data is only served when the
/// caller asked for `UseCachedEvenIfStale`, and then without calling the network.
/// Overlapping calls for one key are not coalesced; the last one to finish wins.
pub struct DataSource<A> {
  api: A,
  cache: CacheStore,
  zone: DisplayZone,
}

impl<A: Clone> Clone for DataSource<A> {
  fn clone(&self) -> Self {
    Self {
      api: self.api.clone(),
      cache: self.cache.clone(),
      zone: self.zone,
    }
  }
}

impl<A: AuctionApi> DataSource<A> {
  pub fn new(api: A, cache: CacheStore, zone: DisplayZone) -> Self {
    Self { api, cache, zone }
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  /// Drop one cached collection.
  pub fn invalidate(&self, key: &CacheKey) {
    self.cache.invalidate(key);
  }

  /// Drop every cached collection, e.g. on logout.
  pub fn clear_all(&self) {
    self.cache.clear_all();
  }

  fn localize_all<T: Listing>(&self, items: &mut [T]) {
    for item in items.iter_mut() {
      localize(item, self.zone);
    }
  }

  /// Serve `key` from cache if `policy` allows it, otherwise fetch and store.
  async fn fetch_collection<T, F, Fut>(
    &self,
    key: CacheKey,
    policy: FreshnessPolicy,
    fetcher: F,
  ) -> Result<SharedCollection<T>>
  where
    T: Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if let Some(cached) = self.cache.get::<SharedCollection<T>>(&key, policy) {
      return Ok(cached.data);
    }

    debug!(%key, ?policy, "fetching from network");
    let items = fetcher().await?;
    debug!(%key, count = items.len(), "fetched");

    let collection = shared(items);
    self.cache.set(key, Arc::clone(&collection));
    Ok(collection)
  }

  pub async fn retrieve_watches(&self, policy: FreshnessPolicy) -> Result<SharedCollection<Watch>> {
    self
      .fetch_collection(CacheKey::Watches, policy, || async {
        let mut watches = self.api.watches().await?;
        self.localize_all(&mut watches);
        Ok(watches)
      })
      .await
  }

  pub async fn retrieve_snipes(
    &self,
    status: SnipeStatus,
    policy: FreshnessPolicy,
  ) -> Result<SharedCollection<Snipe>> {
    self
      .fetch_collection(CacheKey::Snipes(status), policy, || async {
        let mut snipes = self.api.snipes(status).await?;
        self.localize_all(&mut snipes);
        Ok(snipes)
      })
      .await
  }

  pub async fn retrieve_saved_searches(
    &self,
    policy: FreshnessPolicy,
  ) -> Result<SharedCollection<SavedSearch>> {
    self
      .fetch_collection(CacheKey::SavedSearches, policy, || {
        self.api.saved_searches()
      })
      .await
  }

  pub async fn retrieve_detail(
    &self,
    item_id: &str,
    policy: FreshnessPolicy,
  ) -> Result<Arc<ItemDetail>> {
    let key = CacheKey::Detail {
      item_id: item_id.to_string(),
    };
    if let Some(cached) = self.cache.get::<Arc<ItemDetail>>(&key, policy) {
      return Ok(cached.data);
    }

    debug!(%key, ?policy, "fetching from network");
    let mut detail = self.api.item_detail(item_id).await?;
    localize(&mut detail, self.zone);

    let detail = Arc::new(detail);
    self.cache.set(key, Arc::clone(&detail));
    Ok(detail)
  }

  /// Retrieve search results, paging through one filter set.
  ///
  /// A change of terms, sort, saved search, country or located-in starts a new
  /// list. The page directly after the cached ones is appended to the cached
  /// list, unless `rebase` is set; any other page replaces it. Appending keeps
  /// the expiry of the pages already held, and under `UseFreshIfValid` or
  /// `ForceRefresh` expired pages are not extended.
  pub async fn retrieve_search_results(
    &self,
    query: &SearchQuery,
    policy: FreshnessPolicy,
  ) -> Result<SharedCollection<SearchItem>> {
    let key = CacheKey::SearchResults;

    if !query.rebase {
      if let Some(cached) = self.cache.get::<SearchPages>(&key, policy) {
        if cached.data.covers(query) {
          return Ok(cached.data.items);
        }
        debug!(page = query.page, "search filters or page changed");
      }
    }

    debug!(page = query.page, rebase = query.rebase, "fetching search results");
    let mut items = self.api.search(query).await?;
    self.localize_all(&mut items);

    let fingerprint = query.fingerprint();
    let previous_policy = match policy {
      FreshnessPolicy::UseCachedEvenIfStale => FreshnessPolicy::UseCachedEvenIfStale,
      _ => FreshnessPolicy::UseFreshIfValid,
    };
    let previous = self
      .cache
      .get::<SearchPages>(&key, previous_policy)
      .filter(|cached| {
        !query.rebase
          && cached.data.fingerprint == fingerprint
          && query.page == cached.data.last_page + 1
      });

    let Some(previous) = previous else {
      let pages = SearchPages {
        fingerprint,
        first_page: query.page,
        last_page: query.page,
        items: shared(items),
      };
      let collection = Arc::clone(&pages.items);
      self.cache.set(key, pages);
      return Ok(collection);
    };

    let mut merged = previous
      .data
      .items
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    let known: HashSet<String> = merged.iter().map(|i| i.item_id.clone()).collect();
    merged.extend(items.into_iter().filter(|i| !known.contains(&i.item_id)));

    let pages = SearchPages {
      fingerprint,
      first_page: previous.data.first_page,
      last_page: query.page,
      items: shared(merged),
    };
    let collection = Arc::clone(&pages.items);
    self.cache.set_expiring_at(key, pages, previous.expires_at);
    Ok(collection)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::clock::ManualClock;
  use chrono::{Duration, FixedOffset, TimeZone, Utc};
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::sync::Mutex;

  const PAGE_SIZE: usize = 20;

  /// Counting in-memory API
  #[derive(Clone, Default)]
  struct MockApi {
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    queries: Arc<Mutex<Vec<SearchQuery>>>,
  }

  impl MockApi {
    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
      self.fail.store(fail, Ordering::SeqCst);
    }

    fn begin(&self) -> Result<()> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail.load(Ordering::SeqCst) {
        return Err(eyre!("Failed to reach server: connection refused"));
      }
      Ok(())
    }
  }

  fn end_time_utc() -> String {
    "2024-05-01T12:00:00Z".to_string()
  }

  impl AuctionApi for MockApi {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchItem>> {
      self.begin()?;
      self.queries.lock().unwrap().push(query.clone());
      // "overlap" pages share half their items with the previous page
      let overlap = query.terms == "overlap";
      Ok(
        (0..PAGE_SIZE)
          .map(|i| SearchItem {
            item_id: if overlap {
              ((query.page as usize - 1) * PAGE_SIZE / 2 + i).to_string()
            } else {
              format!("{}-{}-{}", query.country, query.page, i)
            },
            end_time_utc: end_time_utc(),
            ..Default::default()
          })
          .collect(),
      )
    }

    async fn watches(&self) -> Result<Vec<Watch>> {
      self.begin()?;
      Ok(vec![
        Watch {
          item_id: "w1".to_string(),
          end_time_utc: end_time_utc(),
          ..Default::default()
        },
        Watch {
          item_id: "w2".to_string(),
          end_time_utc: "not a time".to_string(),
          ..Default::default()
        },
      ])
    }

    async fn snipes(&self, status: SnipeStatus) -> Result<Vec<Snipe>> {
      self.begin()?;
      Ok(vec![Snipe {
        snipe_id: format!("{}-1", status),
        item_id: "i1".to_string(),
        end_time_utc: end_time_utc(),
        ..Default::default()
      }])
    }

    async fn saved_searches(&self) -> Result<Vec<SavedSearch>> {
      self.begin()?;
      Ok(vec![SavedSearch {
        id: "s1".to_string(),
        name: "Cameras".to_string(),
        terms: "leica m6".to_string(),
        ..Default::default()
      }])
    }

    async fn item_detail(&self, item_id: &str) -> Result<ItemDetail> {
      self.begin()?;
      Ok(ItemDetail {
        item_id: item_id.to_string(),
        end_time_utc: end_time_utc(),
        ..Default::default()
      })
    }
  }

  fn source() -> (DataSource<MockApi>, MockApi, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    let api = MockApi::default();
    let zone = DisplayZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap());
    let source = DataSource::new(
      api.clone(),
      CacheStore::new(Arc::new(clock.clone())),
      zone,
    );
    (source, api, clock)
  }

  fn len<T>(collection: &SharedCollection<T>) -> usize {
    collection.lock().unwrap().len()
  }

  #[tokio::test]
  async fn test_watches_fetched_once_then_cached() {
    let (source, api, _) = source();

    let first = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 1);

    let second = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
  }

  #[tokio::test]
  async fn test_fetched_entities_are_localized() {
    let (source, _, _) = source();
    let watches = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    let watches = watches.lock().unwrap();
    assert_eq!(watches[0].end_time, "2024-05-01 14:00:00 +02:00");
    assert_eq!(watches[0].countdown, "");
    assert_eq!(watches[1].end_time, "");
  }

  #[tokio::test]
  async fn test_expired_entry_refetched() {
    let (source, api, clock) = source();
    source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    clock.advance(Duration::minutes(10));
    source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 2);
  }

  #[tokio::test]
  async fn test_stale_policy_skips_network() {
    let (source, api, clock) = source();
    let first = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    clock.advance(Duration::hours(5));
    api.set_failing(true);
    let stale = source
      .retrieve_watches(FreshnessPolicy::UseCachedEvenIfStale)
      .await
      .unwrap();
    assert_eq!(api.calls(), 1);
    assert!(Arc::ptr_eq(&first, &stale));
  }

  #[tokio::test]
  async fn test_stale_policy_fetches_when_empty() {
    let (source, api, _) = source();
    source
      .retrieve_snipes(SnipeStatus::Won, FreshnessPolicy::UseCachedEvenIfStale)
      .await
      .unwrap();
    assert_eq!(api.calls(), 1);
  }

  #[tokio::test]
  async fn test_failure_propagates_without_fallback() {
    let (source, api, clock) = source();
    source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    clock.advance(Duration::minutes(11));
    api.set_failing(true);

    let err = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap_err();
    assert!(err.to_string().contains("connection refused"));
  }

  #[tokio::test]
  async fn test_failed_force_refresh_keeps_old_entry() {
    let (source, api, _) = source();
    let first = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    api.set_failing(true);
    assert!(source
      .retrieve_watches(FreshnessPolicy::ForceRefresh)
      .await
      .is_err());
    assert_eq!(api.calls(), 2);

    let cached = source
      .cache()
      .get::<SharedCollection<Watch>>(&CacheKey::Watches, FreshnessPolicy::UseCachedEvenIfStale)
      .unwrap();
    assert!(Arc::ptr_eq(&first, &cached.data));
    assert_eq!(cached.source, CacheSource::CacheFresh);
  }

  #[tokio::test]
  async fn test_force_refresh_replaces_collection() {
    let (source, api, _) = source();
    let first = source
      .retrieve_watches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    let refreshed = source
      .retrieve_watches(FreshnessPolicy::ForceRefresh)
      .await
      .unwrap();
    assert_eq!(api.calls(), 2);
    assert!(!Arc::ptr_eq(&first, &refreshed));
  }

  #[tokio::test]
  async fn test_snipe_statuses_cached_independently() {
    let (source, api, _) = source();
    for status in SnipeStatus::ALL {
      source
        .retrieve_snipes(status, FreshnessPolicy::UseFreshIfValid)
        .await
        .unwrap();
    }
    assert_eq!(api.calls(), 3);

    let won = source
      .retrieve_snipes(SnipeStatus::Won, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);
    assert_eq!(won.lock().unwrap()[0].snipe_id, "won-1");
  }

  #[tokio::test]
  async fn test_invalidate_and_clear_all() {
    let (source, api, _) = source();
    source
      .retrieve_snipes(SnipeStatus::Active, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    source
      .retrieve_saved_searches(FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    source.invalidate(&CacheKey::Snipes(SnipeStatus::Active));
    source
      .retrieve_snipes(SnipeStatus::Active, FreshnessPolicy::UseCachedEvenIfStale)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);

    source.clear_all();
    assert!(source.cache().is_empty());
    source
      .retrieve_saved_searches(FreshnessPolicy::UseCachedEvenIfStale)
      .await
      .unwrap();
    assert_eq!(api.calls(), 4);
  }

  #[tokio::test]
  async fn test_detail_cached_per_item() {
    let (source, api, _) = source();
    let a = source
      .retrieve_detail("a", FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    source
      .retrieve_detail("b", FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    let again = source
      .retrieve_detail("a", FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    assert_eq!(api.calls(), 2);
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(a.end_time, "2024-05-01 14:00:00 +02:00");
  }

  #[tokio::test]
  async fn test_search_filter_change_refetches() {
    let (source, api, _) = source();
    let query = SearchQuery::new("laptop").country(1);

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 1);

    let other_country = source
      .retrieve_search_results(&query.clone().country(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 2);
    assert_eq!(other_country.lock().unwrap()[0].item_id, "2-1-0");

    source
      .retrieve_search_results(&query.clone().country(2).located_in(true), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);
  }

  #[tokio::test]
  async fn test_search_pages_append() {
    let (source, api, _) = source();
    let query = SearchQuery::new("laptop").country(1);

    let first = source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(len(&first), PAGE_SIZE);

    let both = source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(len(&both), 2 * PAGE_SIZE);
    assert_eq!(api.calls(), 2);
    assert_eq!(api.queries.lock().unwrap()[1].page, 2);

    // Both loaded pages are now served from cache.
    let cached = source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert!(Arc::ptr_eq(&both, &cached));
    assert_eq!(api.calls(), 2);
  }

  #[tokio::test]
  async fn test_search_rebase_replaces_pages() {
    let (source, api, _) = source();
    let query = SearchQuery::new("laptop").country(1);

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    let rebased = source
      .retrieve_search_results(&query.clone().page(2).rebase(true), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    assert_eq!(api.calls(), 2);
    let items = rebased.lock().unwrap();
    assert_eq!(items.len(), PAGE_SIZE);
    assert!(items.iter().all(|i| i.item_id.starts_with("1-2-")));
  }

  #[tokio::test]
  async fn test_search_append_skips_duplicates() {
    let (source, api, _) = source();
    let query = SearchQuery::new("overlap");

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    let merged = source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();

    assert_eq!(api.calls(), 2);
    assert_eq!(len(&merged), PAGE_SIZE + PAGE_SIZE / 2);
  }

  #[tokio::test]
  async fn test_search_page_gap_is_not_cached() {
    let (source, api, _) = source();
    let query = SearchQuery::new("laptop");

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    let third = source
      .retrieve_search_results(&query.clone().page(3), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(len(&third), PAGE_SIZE);

    let second = source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);
    assert!(second
      .lock()
      .unwrap()
      .iter()
      .all(|i| i.item_id.starts_with("0-2-")));
  }

  #[tokio::test]
  async fn test_search_expired_pages_are_not_extended() {
    let (source, api, clock) = source();
    let query = SearchQuery::new("laptop");

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    clock.advance(Duration::minutes(15));

    let second = source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(len(&second), PAGE_SIZE);

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);
  }

  #[tokio::test]
  async fn test_search_append_keeps_first_page_expiry() {
    let (source, api, clock) = source();
    let query = SearchQuery::new("laptop");

    source
      .retrieve_search_results(&query, FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    clock.advance(Duration::minutes(8));
    source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 2);

    clock.advance(Duration::minutes(3));
    source
      .retrieve_search_results(&query.clone().page(2), FreshnessPolicy::UseFreshIfValid)
      .await
      .unwrap();
    assert_eq!(api.calls(), 3);
  }
}

use clap::{Parser, Subcommand};
use color_eyre::Result;
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::info;

use snipewatch::auction::{DataSource, HttpAuctionClient, SearchQuery, SortMode};
use snipewatch::cache::{CacheStore, FreshnessPolicy, SnipeStatus};
use snipewatch::clock::{Clock, SystemClock};
use snipewatch::config::Config;
use snipewatch::countdown::{Countdown, CountdownEngine, CountdownOptions, SharedCollection};
use snipewatch::event::{Event, EventHandler};
use snipewatch::render::TableRow;

#[derive(Parser, Debug)]
#[command(name = "snipewatch")]
#[command(about = "Auction lists with live countdowns")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/snipewatch/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Ignore cached data and fetch again
  #[arg(long, global = true, conflicts_with = "stale")]
  refresh: bool,

  /// Accept expired cached data instead of fetching
  #[arg(long, global = true)]
  stale: bool,

  /// Keep the countdown running for this many seconds
  #[arg(short, long, global = true, default_value_t = 30)]
  seconds: u64,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Items on the watch list
  Watches,
  /// Scheduled and finished snipes
  Snipes {
    /// Only this status; all three are loaded when omitted
    #[arg(long)]
    status: Option<SnipeStatus>,
  },
  /// Search listings
  Search {
    terms: String,
    #[arg(long, default_value_t = SortMode::EndingSoonest)]
    sort: SortMode,
    #[arg(long, default_value_t = 0)]
    country: u32,
    /// Only items located in the country
    #[arg(long)]
    located_in: bool,
    /// Number of result pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Searches saved on the server
  SavedSearches,
}

impl Args {
  fn policy(&self) -> FreshnessPolicy {
    if self.refresh {
      FreshnessPolicy::ForceRefresh
    } else if self.stale {
      FreshnessPolicy::UseCachedEvenIfStale
    } else {
      FreshnessPolicy::UseFreshIfValid
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = snipewatch::logging::init(&config.logging)?;

  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let cache = CacheStore::new(Arc::clone(&clock)).with_ttl(config.cache.ttl());
  let source = DataSource::new(HttpAuctionClient::new(&config)?, cache, config.display.zone());
  let engine = CountdownEngine::with_settings(clock, config.countdown.settings());

  let policy = args.policy();
  let run_for = Duration::from_secs(args.seconds);

  match &args.command {
    Command::Watches => {
      let watches = source.retrieve_watches(policy).await?;
      run_countdown(&engine, watches, CountdownOptions::default(), run_for).await?;
    }
    Command::Snipes { status: Some(status) } => {
      let snipes = source.retrieve_snipes(*status, policy).await?;
      run_countdown(&engine, snipes, CountdownOptions::default(), run_for).await?;
    }
    Command::Snipes { status: None } => {
      let all = try_join_all(
        SnipeStatus::ALL
          .iter()
          .map(|status| source.retrieve_snipes(*status, policy)),
      )
      .await?;
      for (status, snipes) in SnipeStatus::ALL.iter().zip(&all).skip(1) {
        println!("== {} snipes ==", status);
        print_rows(snipes);
      }
      // Only active snipes still count down
      let active = Arc::clone(&all[0]);
      run_countdown(&engine, active, CountdownOptions::default(), run_for).await?;
    }
    Command::Search {
      terms,
      sort,
      country,
      located_in,
      pages,
    } => {
      let base = SearchQuery::new(terms.as_str())
        .sort(*sort)
        .country(*country)
        .located_in(*located_in);

      let mut results = source.retrieve_search_results(&base, policy).await?;
      for page in 2..=(*pages).max(1) {
        results = source
          .retrieve_search_results(&base.clone().page(page), policy)
          .await?;
      }

      let options = CountdownOptions::default().sorted_by(*sort);
      run_countdown(&engine, results, options, run_for).await?;
    }
    Command::SavedSearches => {
      let searches = source.retrieve_saved_searches(policy).await?;
      print_rows(&searches);
    }
  }

  Ok(())
}

fn print_rows<T: TableRow>(collection: &SharedCollection<T>) {
  let items = collection.lock().unwrap_or_else(PoisonError::into_inner);
  if items.is_empty() {
    println!("(none)");
  }
  for item in items.iter() {
    println!("{}", item.row());
  }
}

/// Tick `collection` and print it after every pass until `run_for` elapses or Ctrl-C.
async fn run_countdown<T: Countdown + TableRow>(
  engine: &CountdownEngine,
  collection: SharedCollection<T>,
  options: CountdownOptions,
  run_for: Duration,
) -> Result<()> {
  let mut events = EventHandler::new(engine);
  let handle = engine.register_collection(Arc::clone(&collection), options);
  info!(registration = %handle.id(), "countdown started");

  let deadline = tokio::time::sleep(run_for);
  tokio::pin!(deadline);

  loop {
    tokio::select! {
      _ = &mut deadline => break,
      _ = tokio::signal::ctrl_c() => break,
      event = events.next() => match event {
        Some(Event::Tick(tick)) => {
          println!("-- {} ({} items) --", tick.at.format("%H:%M:%S"), tick.len);
          print_rows(&collection);
        }
        Some(Event::Ended(ended)) => {
          for item in ended.items {
            println!("ended: {}", item.key);
          }
        }
        Some(Event::Lagged(missed)) => info!(missed, "skipped countdown notifications"),
        None => break,
      },
    }
  }

  handle.clear();
  Ok(())
}

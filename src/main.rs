mod api;
mod app;
mod cache;
mod config;
mod error;
mod event;
mod logging;
mod orders;
mod query;
mod storage;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::debug;

use api::{ApiClient, CachedCatalog, OfflineApi, OrderApi};
use app::Store;
use cache::{ExecutionContext, ResourceCache};
use config::{Config, StorageBackend};
use orders::{Order, OrderId, OrderPatch, OrderStatus, OrderStore, RecordId};
use query::Resource;
use storage::{LocalStorage, MemoryStorage, SqliteStorage};

#[derive(Parser, Debug)]
#[command(name = "miam")]
#[command(about = "Terminal client for the miam food-ordering service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/miam/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL of the service
  #[arg(long)]
  api_url: Option<String>,

  /// Never contact the server for orders
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sync with the server, then list orders
  Orders {
    /// List what is stored locally without syncing
    #[arg(long)]
    local: bool,
  },
  /// Show one order
  Order { id: OrderId },
  /// Create an order from its JSON form
  Create {
    #[arg(long)]
    json: String,
  },
  /// Patch an order
  Update {
    id: OrderId,
    #[arg(long)]
    status: Option<OrderStatus>,
    #[arg(long, value_parser = parse_total)]
    total: Option<f64>,
    #[arg(long)]
    name: Option<String>,
  },
  /// Drop an order from the local list
  Remove { id: OrderId },
  /// Drop every local order
  Clear,
  /// Reconcile local orders with the server
  Sync,
  /// List restaurants
  Restaurants,
  /// Show one restaurant
  Restaurant { id: RecordId },
  /// List restaurant categories
  Categories,
  /// Show one dish
  Dish { id: RecordId },
  /// Open the terminal viewer
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override API url if specified on command line
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  // The viewer owns the terminal, so its logs always go to a file
  let log_dir = match args.command {
    Command::Watch => logging::default_dir(),
    _ => None,
  };
  let _log_guard = logging::init(&config.logging, log_dir)?;

  let client = ApiClient::new(&config.api, Config::api_token())?;
  debug!(url = %client.base_url(), offline = args.offline, "Starting");

  let api: Box<dyn OrderApi> = if args.offline {
    Box::new(OfflineApi)
  } else {
    Box::new(client.clone())
  };

  // A one-shot command never reads the same key twice, so it skips the cache
  let context = match args.command {
    Command::Watch => ExecutionContext::Interactive,
    _ => ExecutionContext::Headless,
  };
  let catalog = CachedCatalog::new(
    client,
    ResourceCache::with_context(context),
    config.cache.fetch_options(),
  );

  let mut store: Store = OrderStore::open(api, open_storage(&config)?)?;

  match args.command {
    Command::Orders { local } => {
      if !local {
        sync(&mut store).await?;
      }
      print_orders(&store);
    }
    Command::Order { id } => {
      let order = store
        .get_by_id(&id)
        .ok_or_else(|| eyre!("No order with id {}", id))?;
      println!("{}", serde_json::to_string_pretty(order)?);
    }
    Command::Create { json } => {
      let order: Order =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid order JSON: {}", e))?;
      let id = store.create(order).await?;
      println!("{} {}", sync_label(&store, &id), id);
    }
    Command::Update {
      id,
      status,
      total,
      name,
    } => {
      let patch = OrderPatch {
        status,
        total,
        name,
        ..Default::default()
      };
      if patch.is_empty() {
        return Err(eyre!("Nothing to update, pass --status, --total or --name"));
      }
      if store.get_by_id(&id).is_none() {
        return Err(eyre!("No order with id {}", id));
      }
      store.update(&id, patch).await?;
      println!("{} {}", sync_label(&store, &id), id);
    }
    Command::Remove { id } => {
      store.remove(&id)?;
      println!("Removed {}", id);
    }
    Command::Clear => {
      let count = store.count();
      store.clear()?;
      println!("Cleared {} orders", count);
    }
    Command::Sync => {
      sync(&mut store).await?;
      println!(
        "{} orders, {} not on the server",
        store.count(),
        store.pending().count()
      );
    }
    Command::Restaurants => {
      for restaurant in require(catalog.restaurants().await)? {
        println!(
          "{:<6} {:<30} {:<14} {}",
          restaurant.id.to_string(),
          restaurant.name,
          restaurant.category.unwrap_or_default(),
          restaurant.city.unwrap_or_default()
        );
      }
    }
    Command::Restaurant { id } => {
      let restaurant = require(catalog.restaurant(&id).await)?
        .ok_or_else(|| eyre!("No restaurant with id {}", id))?;
      println!("{}", serde_json::to_string_pretty(&restaurant)?);
    }
    Command::Categories => {
      for category in require(catalog.categories().await)? {
        println!("{}", category);
      }
    }
    Command::Dish { id } => {
      let dish =
        require(catalog.dish(&id).await)?.ok_or_else(|| eyre!("No dish with id {}", id))?;
      println!("{}", serde_json::to_string_pretty(&dish)?);
    }
    Command::Watch => {
      let api_url = config.api.url.clone();
      let mut app = app::App::new(store, catalog, api_url);
      app.run().await?;
    }
  }

  Ok(())
}

/// Totals must survive a round trip through JSON, which has no NaN.
fn parse_total(s: &str) -> Result<f64, String> {
  let total: f64 = s.trim().parse().map_err(|e| format!("invalid total '{}': {}", s, e))?;
  if total.is_finite() {
    Ok(total)
  } else {
    Err(format!("total must be a finite number, got '{}'", s))
  }
}

fn open_storage(config: &Config) -> Result<Box<dyn LocalStorage>> {
  Ok(match config.storage.backend {
    StorageBackend::Memory => Box::new(MemoryStorage::new()),
    StorageBackend::Sqlite => match &config.storage.path {
      Some(path) => Box::new(SqliteStorage::open_at(path)?),
      None => Box::new(SqliteStorage::open()?),
    },
  })
}

async fn sync(store: &mut Store) -> Result<()> {
  store.fetch_all().await?;
  if let Some(error) = store.last_error() {
    eprintln!("Server unavailable ({}), showing local orders", error);
  }
  Ok(())
}

/// Data of a one-shot read, or its error
fn require<T: Clone + Send + Sync + 'static>(resource: Resource<T>) -> Result<T> {
  match resource.error() {
    Some(error) => Err(eyre!("{}: {}", resource.key(), error)),
    None => Ok(resource.data()),
  }
}

fn sync_label(store: &Store, id: &OrderId) -> &'static str {
  match store.sync_state(id) {
    Some(orders::SyncState::ServerConfirmed) => "synced",
    Some(orders::SyncState::LocallyPatched) => "patched locally",
    Some(orders::SyncState::LocalOnly) | None => "local",
  }
}

fn print_orders(store: &Store) {
  if store.count() == 0 {
    println!("No orders");
    return;
  }
  for (order, sync) in store.entries() {
    let (marker, _) = ui::renderfns::sync_marker(sync);
    println!(
      "{} {:<14} {:<10} {:>10}  {}",
      marker,
      order
        .id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_default(),
      order.status.as_ref().map(OrderStatus::as_str).unwrap_or("?"),
      ui::renderfns::format_price(order.total),
      order.name.as_deref().unwrap_or("")
    );
  }
}

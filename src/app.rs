use crate::api::{CachedCatalog, OrderApi};
use crate::cache::ResourceCache;
use crate::event::{Event, EventHandler};
use crate::orders::{OrderId, OrderPatch, OrderStatus, OrderStore};
use crate::storage::LocalStorage;
use crate::ui;
use crate::ui::orders::OrdersView;
use crate::ui::restaurants::RestaurantsView;
use crate::ui::view::{View, ViewAction};
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, error, info};

/// Order store as wired by the binary: any API, any storage backend
pub type Store = OrderStore<Box<dyn OrderApi>, Box<dyn LocalStorage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
  Orders,
  Restaurants,
}

/// Main application state
pub struct App {
  store: Store,

  /// Shared with the catalog; focus signals go through it
  cache: ResourceCache,

  api_url: String,

  tab: Tab,
  orders: OrdersView,
  restaurants: RestaurantsView,

  /// Outcome of the last action, shown in the footer
  status: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(store: Store, catalog: CachedCatalog, api_url: String) -> Self {
    let cache = catalog.cache().clone();
    let mut app = Self {
      store,
      cache,
      api_url,
      tab: Tab::Orders,
      orders: OrdersView::new(),
      restaurants: RestaurantsView::new(catalog),
      status: None,
      should_quit: false,
    };
    app.refresh_orders_view();
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    self.sync_orders().await;

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event).await,
        None => break,
      }
    }

    Ok(())
  }

  async fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key).await,
      Event::Tick => {
        self.orders.tick();
        self.restaurants.tick();
      }
      Event::FocusGained => {
        let listeners = self.cache.notify_focus();
        debug!(listeners, "Focus regained, revalidating");
        self.sync_orders().await;
      }
    }
  }

  async fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Tab | KeyCode::BackTab => {
        self.tab = match self.tab {
          Tab::Orders => Tab::Restaurants,
          Tab::Restaurants => Tab::Orders,
        };
      }
      _ => {
        let action = self.current_view_mut().handle_key(key);
        self.perform(action).await;
      }
    }
  }

  async fn perform(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::SyncOrders => self.sync_orders().await,
      ViewAction::CancelOrder(id) => self.cancel_order(id).await,
      ViewAction::RemoveOrder(id) => {
        match self.store.remove(&id) {
          Ok(()) => self.status = Some(format!("Removed order {}", id)),
          Err(e) => self.report(e),
        }
        self.refresh_orders_view();
      }
    }
  }

  async fn sync_orders(&mut self) {
    if let Err(e) = self.store.fetch_all().await {
      self.report(e);
    } else {
      self.status = match self.store.last_error() {
        Some(error) => Some(format!("Working offline: {}", error)),
        None => {
          info!(count = self.store.count(), "Orders refreshed");
          Some(format!("Synced {} orders", self.store.count()))
        }
      };
    }
    self.refresh_orders_view();
  }

  async fn cancel_order(&mut self, id: OrderId) {
    let patch = OrderPatch {
      status: Some(OrderStatus::Cancelled),
      ..Default::default()
    };
    match self.store.update(&id, patch).await {
      Ok(()) => self.status = Some(format!("Cancelled order {}", id)),
      Err(e) => self.report(e),
    }
    self.refresh_orders_view();
  }

  fn report(&mut self, e: color_eyre::Report) {
    error!(error = %e, "Order store operation failed");
    self.status = Some(format!("Error: {}", e));
  }

  fn refresh_orders_view(&mut self) {
    let rows = self
      .store
      .entries()
      .map(|(order, sync)| (order.clone(), sync))
      .collect();
    let sync_error = self.store.last_error().map(|e| e.to_string());
    self.orders.set_orders(rows, sync_error);
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> &dyn View {
    match self.tab {
      Tab::Orders => &self.orders,
      Tab::Restaurants => &self.restaurants,
    }
  }

  pub fn current_view_mut(&mut self) -> &mut dyn View {
    match self.tab {
      Tab::Orders => &mut self.orders,
      Tab::Restaurants => &mut self.restaurants,
    }
  }

  pub fn tab_titles(&self) -> Vec<String> {
    vec![self.orders.title(), self.restaurants.title()]
  }

  pub fn active_tab(&self) -> usize {
    match self.tab {
      Tab::Orders => 0,
      Tab::Restaurants => 1,
    }
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn pending_orders(&self) -> usize {
    self.store.pending().count()
  }
}

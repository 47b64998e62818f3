use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tokio::sync::oneshot;

use crate::api::types::Restaurant;
use crate::api::CachedCatalog;
use crate::cache::CacheSource;
use crate::query::Resource;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// View for the restaurant catalog
pub struct RestaurantsView {
  catalog: CachedCatalog,
  pending: Option<oneshot::Receiver<Resource<Vec<Restaurant>>>>,
  resource: Option<Resource<Vec<Restaurant>>>,
  list_state: ListState,
}

impl RestaurantsView {
  pub fn new(catalog: CachedCatalog) -> Self {
    let mut view = Self {
      catalog,
      pending: None,
      resource: None,
      list_state: ListState::default(),
    };
    view.load();
    view
  }

  /// Request the list through the cache without blocking the event loop
  fn load(&mut self) {
    let (tx, rx) = oneshot::channel();
    let catalog = self.catalog.clone();
    tokio::spawn(async move {
      let _ = tx.send(catalog.restaurants().await);
    });
    self.pending = Some(rx);
  }

  fn restaurants(&self) -> Vec<Restaurant> {
    self.resource.as_ref().map(|r| r.data()).unwrap_or_default()
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let restaurants = self.restaurants();
    ensure_valid_selection(&mut self.list_state, restaurants.len());

    let title = match &self.resource {
      None => " Restaurants (loading...) ".to_string(),
      Some(resource) => match (resource.error(), resource.source()) {
        (Some(e), _) => format!(" Restaurants ({}) (error: {}) ", restaurants.len(), e),
        (None, CacheSource::Cache) => format!(" Restaurants ({}) (cached) ", restaurants.len()),
        _ => format!(" Restaurants ({}) ", restaurants.len()),
      },
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if restaurants.is_empty() {
      let content = match &self.resource {
        None => "Loading...",
        Some(r) if r.is_error() => "Failed to load restaurants. Press 'r' to retry.",
        Some(_) => "No restaurants found.",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = restaurants
      .iter()
      .map(|restaurant| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<6}", restaurant.id.to_string()),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<30}", truncate(&restaurant.name, 30)),
            Style::default().fg(Color::White).bold(),
          ),
          Span::raw(" "),
          Span::styled(
            format!(
              "{:<14}",
              truncate(restaurant.category.as_deref().unwrap_or(""), 14)
            ),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::styled(
            truncate(restaurant.city.as_deref().unwrap_or(""), 20),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for RestaurantsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => match &self.resource {
        Some(resource) => resource.refetch(),
        None if self.pending.is_none() => self.load(),
        None => {}
      },
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn title(&self) -> String {
    "Restaurants".to_string()
  }

  fn tick(&mut self) {
    if let Some(rx) = &mut self.pending {
      match rx.try_recv() {
        Ok(resource) => {
          self.resource = Some(resource);
          self.pending = None;
        }
        Err(oneshot::error::TryRecvError::Empty) => {}
        Err(oneshot::error::TryRecvError::Closed) => self.pending = None,
      }
    }

    if let Some(resource) = &mut self.resource {
      resource.poll();
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "switch").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::cache::{FetchOptions, ResourceCache};
  use crate::config::ApiConfig;
  use mockito::Server;

  #[tokio::test]
  async fn test_tick_picks_up_loaded_restaurants() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/api/restaurants")
      .with_status(200)
      .with_body(r#"[{"id": 3, "name": "Le Comptoir", "city": "Lyon"}]"#)
      .create_async()
      .await;

    let config = ApiConfig {
      url: server.url(),
      timeout_secs: 5,
    };
    let client = ApiClient::new(&config, None).unwrap();
    let catalog = CachedCatalog::new(client, ResourceCache::new(), FetchOptions::default());
    let mut view = RestaurantsView::new(catalog);

    let mut rounds = 0;
    while view.resource.is_none() && rounds < 100 {
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
      view.tick();
      rounds += 1;
    }

    let restaurants = view.restaurants();
    assert_eq!(restaurants.len(), 1);
    assert_eq!(restaurants[0].name, "Le Comptoir");
    assert!(view.pending.is_none());
  }
}

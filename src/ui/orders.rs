use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::orders::{Order, OrderStatus, SyncState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_price, status_color, sync_marker, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// View for the order list
///
/// Holds a snapshot of the store; the App replaces it after every store
/// operation.
pub struct OrdersView {
  rows: Vec<(Order, SyncState)>,
  sync_error: Option<String>,
  list_state: ListState,
}

impl OrdersView {
  pub fn new() -> Self {
    Self {
      rows: Vec::new(),
      sync_error: None,
      list_state: ListState::default(),
    }
  }

  pub fn set_orders(&mut self, rows: Vec<(Order, SyncState)>, sync_error: Option<String>) {
    self.rows = rows;
    self.sync_error = sync_error;
    ensure_valid_selection(&mut self.list_state, self.rows.len());
  }

  fn selected(&self) -> Option<&Order> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.rows.get(idx))
      .map(|(order, _)| order)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    ensure_valid_selection(&mut self.list_state, self.rows.len());

    let title = match &self.sync_error {
      Some(e) => format!(" Orders ({}) (offline: {}) ", self.rows.len(), e),
      None => format!(" Orders ({}) ", self.rows.len()),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.rows.is_empty() {
      let paragraph = Paragraph::new("No orders yet. Create one with `miam create`.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .rows
      .iter()
      .map(|(order, sync)| {
        let (marker, marker_color) = sync_marker(*sync);
        let id = order
          .id
          .as_ref()
          .map(|id| id.to_string())
          .unwrap_or_else(|| "-".to_string());
        let status = order.status.as_ref().map(OrderStatus::as_str).unwrap_or("?");
        let name = order.name.as_deref().unwrap_or("");

        let line = Line::from(vec![
          Span::styled(format!("{} ", marker), Style::default().fg(marker_color)),
          Span::styled(
            format!("{:<14}", truncate(&id, 14)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", status),
            Style::default().fg(status_color(order.status.as_ref())),
          ),
          Span::raw(" "),
          Span::raw(format!("{:>10}", format_price(order.total))),
          Span::raw("  "),
          Span::raw(format!("{} items ", order.items.len())),
          Span::raw(truncate(name, 40)),
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

impl Default for OrdersView {
  fn default() -> Self {
    Self::new()
  }
}

impl View for OrdersView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => return ViewAction::SyncOrders,
      KeyCode::Char('c') => {
        if let Some(order) = self.selected() {
          if order.status != Some(OrderStatus::Cancelled) {
            if let Some(id) = &order.id {
              return ViewAction::CancelOrder(id.clone());
            }
          }
        }
      }
      KeyCode::Char('d') => {
        if let Some(id) = self.selected().and_then(|order| order.id.clone()) {
          return ViewAction::RemoveOrder(id);
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn title(&self) -> String {
    "Orders".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "switch").with_priority(10),
      ShortcutInfo::new("r", "sync").with_priority(20),
      ShortcutInfo::new("c", "cancel").with_priority(30),
      ShortcutInfo::new("d", "remove").with_priority(40),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

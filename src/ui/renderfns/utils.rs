use ratatui::prelude::Color;

use crate::orders::{OrderStatus, SyncState};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for an order status
pub fn status_color(status: Option<&OrderStatus>) -> Color {
  match status {
    Some(OrderStatus::Delivered) => Color::Green,
    Some(OrderStatus::Preparing | OrderStatus::Delivering) => Color::Yellow,
    Some(OrderStatus::Cancelled) => Color::DarkGray,
    _ => Color::White,
  }
}

/// One-character marker for how far an order got towards the server
pub fn sync_marker(sync: SyncState) -> (&'static str, Color) {
  match sync {
    SyncState::ServerConfirmed => ("✓", Color::Green),
    SyncState::LocallyPatched => ("~", Color::Yellow),
    SyncState::LocalOnly => ("●", Color::Red),
  }
}

pub fn format_price(amount: f64) -> String {
  format!("{:.2} €", amount)
}

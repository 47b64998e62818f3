use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::orders::OrderId;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input.
///
/// Order mutations go through the App, which owns the order store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
  /// No action needed
  None,
  /// Reconcile the order list with the server
  SyncOrders,
  /// Mark an order as cancelled
  CancelOrder(OrderId),
  /// Drop an order from the local list
  RemoveOrder(OrderId),
}

/// Trait for view behavior
///
/// Views handle their own keys and return actions for the App to execute.
/// Views that load data asynchronously hold a `Resource<T>` and poll it in
/// `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Tab label
  fn title(&self) -> String;

  /// Called on each tick to allow views to poll async resources
  fn tick(&mut self) {}

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "switch").with_priority(10),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

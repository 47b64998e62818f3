pub mod orders;
pub mod renderfns;
pub mod restaurants;
pub mod view;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  let tabs = app.tab_titles();
  let active = app.active_tab();
  let shortcuts = app.current_view().shortcuts();
  renderfns::draw_header(frame, chunks[0], app.api_url(), &tabs, active, &shortcuts);

  app.current_view_mut().render(frame, chunks[1]);

  renderfns::draw_footer(frame, chunks[2], app.status(), app.pending_orders());
}

/// Keep the selection inside the list, or clear it for an empty list
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    None => state.select(Some(0)),
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

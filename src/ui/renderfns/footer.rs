use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the latest status message
pub fn draw_footer(frame: &mut Frame, area: Rect, status: Option<&str>, pending: usize) {
  let mut spans = vec![Span::raw(" ")];

  if pending > 0 {
    spans.push(Span::styled(
      format!("{} unsynced", pending),
      Style::default().fg(Color::Red).bold(),
    ));
    spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
  }

  match status {
    Some(message) => spans.push(Span::styled(
      message.to_string(),
      Style::default().fg(Color::White),
    )),
    None => spans.push(Span::styled(
      "Tab:switch  j/k:nav  r:refresh  q:quit",
      Style::default().fg(Color::DarkGray),
    )),
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

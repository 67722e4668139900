use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Yes/No prompt shown before a batch run. Defaults to No.
pub struct ConfirmDialog {
    pub prompt: String,
    pub accept: bool,
}

/// What a key press did to the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Pending,
    Yes,
    No,
}

impl ConfirmDialog {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), accept: false }
    }

    pub fn toggle(&mut self) {
        self.accept = !self.accept;
    }

    /// `y`/`n` answer directly, Enter answers with the highlighted button,
    /// Esc is always No.
    pub fn key(&mut self, c: Option<char>, enter: bool, escape: bool) -> Answer {
        if escape {
            return Answer::No;
        }
        if enter {
            return if self.accept { Answer::Yes } else { Answer::No };
        }
        match c.map(|c| c.to_ascii_lowercase()) {
            Some('y') => Answer::Yes,
            Some('n') => Answer::No,
            Some('h') | Some('l') | Some('\t') => {
                self.toggle();
                Answer::Pending
            }
            _ => Answer::Pending,
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.prompt.chars().count() as u16 + 6).max(40);
        let area = centered_rect(width, 7, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Batch send ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        let prompt = Paragraph::new(Span::styled(self.prompt.as_str(), Style::default().fg(Color::White)))
            .alignment(Alignment::Center);
        f.render_widget(prompt, rows[1]);

        let highlighted = |on: bool, bg: Color| {
            if on {
                Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            }
        };
        let buttons = Line::from(vec![
            Span::styled("  [Yes]  ", highlighted(self.accept, Color::Green)),
            Span::raw("   "),
            Span::styled("  [No]  ", highlighted(!self.accept, Color::Red)),
        ]);
        f.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), rows[3]);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_defaults_to_no() {
        let mut d = ConfirmDialog::new("Send?");
        assert_eq!(d.key(None, true, false), Answer::No);
        d.toggle();
        assert_eq!(d.key(None, true, false), Answer::Yes);
    }

    #[test]
    fn letters_answer_directly() {
        let mut d = ConfirmDialog::new("Send?");
        assert_eq!(d.key(Some('Y'), false, false), Answer::Yes);
        assert_eq!(d.key(Some('h'), false, false), Answer::Pending);
        assert!(d.accept);
        assert_eq!(d.key(Some('x'), false, true), Answer::No);
    }
}

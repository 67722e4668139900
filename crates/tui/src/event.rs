use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::{App, Mode};
use crate::confirm::Answer;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_events();
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with 100ms timeout (keeps TUI responsive)
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match app.mode {
                        Mode::Normal => normal_key(app, key),
                        Mode::EditMessage => edit_key(app, key),
                        Mode::ConfirmBatch(_) => confirm_key(app, key),
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

fn normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.quit(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => app.move_down(),
        KeyCode::Enter => app.send_selected(),
        KeyCode::Char('b') | KeyCode::Char('B') => app.request_batch(),
        KeyCode::Char('e') | KeyCode::Char('E') => app.start_edit(),
        KeyCode::Char('c') | KeyCode::Char('C') => app.cancel_run(),
        KeyCode::Char('r') | KeyCode::Char('R') => app.reload_contacts(),
        KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
        KeyCode::PageUp => app.scroll_log_up(10),
        KeyCode::PageDown => app.scroll_log_down(10),
        _ => {}
    }
}

fn edit_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.finish_edit(),
        KeyCode::Backspace => {
            app.message.pop();
        }
        KeyCode::Char(c) => app.message.push(c),
        _ => {}
    }
}

fn confirm_key(app: &mut App, key: KeyEvent) {
    let Mode::ConfirmBatch(dialog) = &mut app.mode else { return };
    let c = match key.code {
        KeyCode::Char(c) => Some(c),
        KeyCode::Left | KeyCode::Right | KeyCode::Tab => Some('\t'),
        _ => None,
    };
    match dialog.key(c, key.code == KeyCode::Enter, key.code == KeyCode::Esc) {
        Answer::Pending => {}
        Answer::Yes => app.resolve_batch(true),
        Answer::No => app.resolve_batch(false),
    }
}

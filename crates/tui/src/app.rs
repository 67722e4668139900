use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use courier_core::contacts;
use courier_core::logger;
use courier_core::types::{ActionTarget, Command, Event, LogLine};

use crate::confirm::ConfirmDialog;

pub struct ContactRow {
    pub target: ActionTarget,
    /// Result of the last send to this contact in this session.
    pub result: Option<bool>,
}

pub enum Mode {
    Normal,
    EditMessage,
    ConfirmBatch(ConfirmDialog),
}

pub struct App {
    pub contacts: Vec<ContactRow>,
    pub contacts_path: PathBuf,
    pub message: String,
    pub mode: Mode,
    pub selected: usize,
    pub log_visible: bool,
    pub log_lines: Vec<LogLine>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub progress: u8,
    pub running: bool,
    pub last_run: Option<bool>,
    pub event_rx: mpsc::Receiver<Event>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub cancel: Arc<AtomicBool>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        targets: Vec<ActionTarget>,
        contacts_path: PathBuf,
        event_rx: mpsc::Receiver<Event>,
        cmd_tx: mpsc::Sender<Command>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            contacts: rows(targets),
            contacts_path,
            message: String::new(),
            mode: Mode::Normal,
            selected: 0,
            log_visible: true,
            log_lines: Vec::new(),
            log_scroll: 0,
            progress: 0,
            running: false,
            last_run: None,
            event_rx,
            cmd_tx,
            cancel,
            should_quit: false,
        }
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                Event::Log(line) => self.log_lines.push(line),
                Event::Progress(p) => self.progress = p.min(100),
                Event::TargetResult(name, ok) => {
                    if let Some(row) = self.contacts.iter_mut().find(|r| r.target.name == name) {
                        row.result = Some(ok);
                    }
                }
                Event::Completed(ok) => {
                    self.running = false;
                    self.last_run = Some(ok);
                }
            }
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.contacts.len() {
            self.selected += 1;
        }
    }

    fn can_send(&self) -> bool {
        if self.running {
            logger::warn("a run is already in progress");
            return false;
        }
        if self.message.trim().is_empty() {
            logger::warn("message is empty, press e to edit it");
            return false;
        }
        true
    }

    fn start_run(&mut self, cmd: Command) {
        self.progress = 0;
        self.running = true;
        self.last_run = None;
        if self.cmd_tx.send(cmd).is_err() {
            self.running = false;
            logger::error("worker is gone");
        }
    }

    pub fn send_selected(&mut self) {
        if !self.can_send() {
            return;
        }
        let Some(row) = self.contacts.get(self.selected) else { return };
        let cmd = Command::SendOne(row.target.clone(), self.message.clone());
        self.start_run(cmd);
    }

    pub fn request_batch(&mut self) {
        if !self.can_send() {
            return;
        }
        let prompt = format!("Send to all {} contacts?", self.contacts.len());
        self.mode = Mode::ConfirmBatch(ConfirmDialog::new(prompt));
    }

    /// Close the confirm dialog, starting the batch if it was accepted.
    pub fn resolve_batch(&mut self, accepted: bool) {
        self.mode = Mode::Normal;
        if !accepted {
            return;
        }
        for row in &mut self.contacts {
            row.result = None;
        }
        let targets = self.contacts.iter().map(|r| r.target.clone()).collect();
        self.start_run(Command::SendBatch(targets, self.message.clone()));
    }

    pub fn cancel_run(&mut self) {
        if self.running {
            self.cancel.store(true, Ordering::SeqCst);
            logger::info("cancel requested, stopping after the current contact");
        }
    }

    pub fn start_edit(&mut self) {
        self.mode = Mode::EditMessage;
    }

    pub fn finish_edit(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn reload_contacts(&mut self) {
        if self.running {
            logger::warn("cannot reload contacts during a run");
            return;
        }
        match contacts::load(&self.contacts_path) {
            Ok(targets) => {
                self.contacts = rows(targets);
                self.selected = self.selected.min(self.contacts.len().saturating_sub(1));
            }
            Err(e) => logger::error(&format!("reload failed: {:#}", e)),
        }
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn quit(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}

fn rows(targets: Vec<ActionTarget>) -> Vec<ContactRow> {
    targets.into_iter().map(|target| ContactRow { target, result: None }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(names: &[&str]) -> (App, mpsc::Sender<Event>, mpsc::Receiver<Command>) {
        let (event_tx, event_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let targets = names.iter().map(|n| ActionTarget::new(*n)).collect();
        let app = App::new(targets, PathBuf::from("contacts.txt"), event_rx, cmd_tx, Arc::default());
        (app, event_tx, cmd_rx)
    }

    #[test]
    fn results_and_completion_update_rows() {
        let (mut app, tx, _cmd) = app(&["A", "B"]);
        app.running = true;
        tx.send(Event::TargetResult("B".into(), false)).unwrap();
        tx.send(Event::Progress(50)).unwrap();
        tx.send(Event::Completed(true)).unwrap();
        app.drain_events();

        assert_eq!(app.contacts[1].result, Some(false));
        assert_eq!(app.progress, 50);
        assert!(!app.running);
        assert_eq!(app.last_run, Some(true));
    }

    #[test]
    fn empty_message_sends_nothing() {
        let (mut app, _tx, cmd) = app(&["A"]);
        app.send_selected();
        assert!(cmd.try_recv().is_err());
        assert!(!app.running);
    }

    #[test]
    fn accepted_batch_sends_every_contact() {
        let (mut app, _tx, cmd) = app(&["A", "B"]);
        app.message = "hi".into();
        app.request_batch();
        assert!(matches!(app.mode, Mode::ConfirmBatch(_)));
        app.resolve_batch(true);

        match cmd.try_recv().unwrap() {
            Command::SendBatch(targets, message) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(message, "hi");
            }
            _ => panic!("expected a batch command"),
        }
        assert!(app.running);
    }
}

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};
use chrono::Local;

use crate::types::{Event, LogLine};

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    event_tx: Option<mpsc::Sender<Event>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;
pub const COLOR_MAGENTA: u8 = 4;

fn logger() -> &'static Mutex<Logger> {
    LOGGER.get_or_init(|| {
        Mutex::new(Logger { file: None, event_tx: None, prefixes: HashMap::new() })
    })
}

/// Open (and truncate) `log_dir/app.log`. Lines logged before this are only
/// forwarded to the event channel, if any.
pub fn init(log_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("app.log"))?;

    logger().lock().unwrap().file = Some(file);
    Ok(())
}

/// Wire the presentation-layer event channel.
pub fn set_event_sender(tx: mpsc::Sender<Event>) {
    logger().lock().unwrap().event_tx = Some(tx);
}

/// Register a prefix with a color. All subsequent `*_p` calls with this
/// prefix render in that color.
pub fn register_prefix(prefix: &str, color: u8) {
    logger().lock().unwrap().prefixes.insert(prefix.to_string(), color);
}

/// Register the prefixes the core logs under.
pub fn register_core_prefixes() {
    register_prefix("locate", COLOR_GRAY);
    register_prefix("act", COLOR_GRAY);
    register_prefix("session", COLOR_MAGENTA);
    register_prefix("batch", COLOR_BLUE);
    register_prefix("result", COLOR_GREEN);
}

fn write_log(level: &'static str, prefix: &str, msg: &str) {
    let ts = Local::now().format("%H:%M:%S").to_string();

    let Ok(mut l) = logger().lock() else { return };
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    if let Some(file) = l.file.as_mut() {
        let line = if prefix.is_empty() {
            format!("[{}] [{}] {}", ts, level, msg)
        } else {
            format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
        };
        writeln!(file, "{}", line).ok();
    }

    if let Some(tx) = &l.event_tx {
        tx.send(Event::Log(LogLine {
            level,
            prefix: prefix.to_string(),
            color,
            timestamp: ts,
            message: msg.to_string(),
        }))
        .ok();
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log under a registered prefix.
pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}

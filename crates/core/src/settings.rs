use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Run configuration. Produced by the config file, read-only to the core for
/// the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub executable_path: PathBuf,
    pub reference_root: PathBuf,
    pub contacts_file: PathBuf,
    /// Pause after each synthetic input action.
    pub input_pause_secs: f64,
    pub hybrid_mode: bool,
    pub login_wait_secs: u64,
    pub retry_count: u32,
    /// Match confidence threshold in (0, 1].
    pub confidence: f32,
    pub window_title: String,
    /// Window class used by the accessibility attach tier.
    pub window_class: String,
    /// Executable names killed before a relaunch.
    pub process_names: Vec<String>,
    /// Substring of the active window title that indicates an open chat.
    pub chat_title_marker: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            executable_path: PathBuf::from(r"C:\Program Files\Weixin\Weixin.exe"),
            reference_root: PathBuf::from("references"),
            contacts_file: PathBuf::from("contacts.txt"),
            input_pause_secs: 0.5,
            hybrid_mode: true,
            login_wait_secs: 5,
            retry_count: 2,
            confidence: 0.7,
            window_title: "微信".into(),
            window_class: "Qt51514QWindowIcon".into(),
            process_names: vec!["WeChat.exe".into(), "WeChatApp.exe".into()],
            chat_title_marker: "聊天".into(),
        }
    }
}

impl AutomationConfig {
    /// Load the config file, filling any missing keys from defaults and
    /// writing the merged result back. A missing or unreadable file yields
    /// defaults (and a fresh file when the directory is writable).
    pub fn load(path: &Path) -> Self {
        let config = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<AutomationConfig>(&s).ok())
            .unwrap_or_default()
            .validated();
        config.save(path).ok();
        config
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    /// Clamp values into their usable ranges.
    pub fn validated(mut self) -> Self {
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            self.confidence = AutomationConfig::default().confidence;
        }
        self.retry_count = self.retry_count.max(1);
        self.input_pause_secs = self.input_pause_secs.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: AutomationConfig = serde_json::from_str(r#"{"retry_count": 4}"#).unwrap();
        assert_eq!(cfg.retry_count, 4);
        assert_eq!(cfg.confidence, 0.7);
        assert!(cfg.hybrid_mode);
    }

    #[test]
    fn load_rewrites_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"confidence": 0.9, "login_wait_secs": 12}"#).unwrap();

        let cfg = AutomationConfig::load(&path);
        assert_eq!(cfg.confidence, 0.9);
        assert_eq!(cfg.login_wait_secs, 12);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("window_class"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = AutomationConfig { confidence: 1.7, retry_count: 0, ..Default::default() }.validated();
        assert_eq!(cfg.confidence, 0.7);
        assert_eq!(cfg.retry_count, 1);
    }
}

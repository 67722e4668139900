use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::imageops;

use crate::error::{AutomationError, Result};
use crate::logger;
use crate::platform::Platform;
use crate::types::*;

/// Reads `root/{light,dark}/{element}.png`, caching each element's variants
/// after the first successful load.
pub struct ReferenceStore {
    root: PathBuf,
    cache: HashMap<String, Vec<ReferenceImage>>,
}

impl ReferenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: HashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, element: &str, theme: Theme) -> PathBuf {
        self.root.join(theme.dir_name()).join(format!("{}.png", element))
    }

    /// Create the theme directories if they don't exist yet.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for theme in Theme::ALL {
            let dir = self.root.join(theme.dir_name());
            if !dir.is_dir() {
                std::fs::create_dir_all(&dir)?;
                logger::info(&format!("created reference directory {}", dir.display()));
            }
        }
        Ok(())
    }

    /// `theme/element` pairs with no file on disk.
    pub fn missing(&self, elements: &[&str]) -> Vec<String> {
        Theme::ALL
            .iter()
            .flat_map(|&theme| elements.iter().map(move |&e| (theme, e)))
            .filter(|&(theme, e)| !self.path_for(e, theme).is_file())
            .map(|(theme, e)| format!("{}/{}", theme, e))
            .collect()
    }

    /// Every available variant of `element`, light first. An element with no
    /// file in either theme is `MissingReference`; an unreadable file is
    /// `ReferenceIo`.
    pub fn variants(&mut self, element: &str) -> Result<Vec<ReferenceImage>> {
        if let Some(cached) = self.cache.get(element) {
            return Ok(cached.clone());
        }

        let mut variants = Vec::new();
        for theme in Theme::ALL {
            let path = self.path_for(element, theme);
            if !path.is_file() {
                continue;
            }
            let pixels = image::open(&path)
                .map_err(|e| AutomationError::ReferenceIo {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
                .to_luma8();
            variants.push(ReferenceImage { name: element.to_string(), theme, pixels });
        }

        if variants.is_empty() {
            return Err(AutomationError::MissingReference(element.to_string()));
        }
        self.cache.insert(element.to_string(), variants.clone());
        Ok(variants)
    }
}

/// Snapshot a `size` region centred on `around` and store it as the
/// `theme` variant of `element`.
pub fn capture_reference(
    platform: &mut dyn Platform,
    store: &ReferenceStore,
    element: &str,
    theme: Theme,
    around: (i32, i32),
    size: (u32, u32),
) -> Result<PathBuf> {
    let screen = platform.capture(None)?;
    let (w, h) = (size.0.min(screen.width()), size.1.min(screen.height()));
    let max_x = screen.width().saturating_sub(w) as i32;
    let max_y = screen.height().saturating_sub(h) as i32;
    let x = (around.0 - w as i32 / 2).clamp(0, max_x) as u32;
    let y = (around.1 - h as i32 / 2).clamp(0, max_y) as u32;

    let path = store.path_for(element, theme);
    let io_err = |e: String| AutomationError::ReferenceIo { path: path.display().to_string(), reason: e };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(e.to_string()))?;
    }
    imageops::crop_imm(&screen, x, y, w, h)
        .to_image()
        .save(&path)
        .map_err(|e| io_err(e.to_string()))?;
    logger::info(&format!("saved reference {}", path.display()));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write(root: &Path, theme: Theme, name: &str) {
        let dir = root.join(theme.dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        GrayImage::from_pixel(30, 30, Luma([90])).save(dir.join(format!("{}.png", name))).unwrap();
    }

    #[test]
    fn variants_are_light_then_dark() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), Theme::Dark, "send_button");
        write(dir.path(), Theme::Light, "send_button");

        let mut store = ReferenceStore::new(dir.path());
        let themes: Vec<_> = store.variants("send_button").unwrap().iter().map(|r| r.theme).collect();
        assert_eq!(themes, [Theme::Light, Theme::Dark]);
    }

    #[test]
    fn absent_element_is_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReferenceStore::new(dir.path());
        assert_eq!(
            store.variants("search_icon").unwrap_err(),
            AutomationError::MissingReference("search_icon".into())
        );
    }

    #[test]
    fn missing_lists_theme_and_element() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), Theme::Light, "search_icon");
        let store = ReferenceStore::new(dir.path());
        assert_eq!(store.missing(&["search_icon"]), ["dark/search_icon"]);
    }

    #[test]
    fn corrupt_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("light")).unwrap();
        std::fs::write(dir.path().join("light/message_input.png"), b"not a png").unwrap();
        let mut store = ReferenceStore::new(dir.path());
        assert!(matches!(store.variants("message_input"), Err(AutomationError::ReferenceIo { .. })));
    }
}

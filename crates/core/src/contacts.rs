use std::path::Path;

use anyhow::{Context, Result};

use crate::logger;
use crate::types::ActionTarget;

const HEADER: &str = "# one contact per line\n# lines starting with # are ignored\n";

/// Parse a contact list: trimmed, non-empty, non-comment lines in file order.
pub fn parse(text: &str) -> Vec<ActionTarget> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ActionTarget::new)
        .collect()
}

/// Read the contact file. A missing file is replaced by a commented template
/// and yields an empty list.
pub fn load(path: &Path) -> Result<Vec<ActionTarget>> {
    if !path.exists() {
        std::fs::write(path, HEADER).with_context(|| format!("creating {}", path.display()))?;
        logger::info(&format!("created empty contact list {}", path.display()));
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let targets = parse(&text);
    logger::info(&format!("loaded {} contact(s) from {}", targets.len(), path.display()));
    Ok(targets)
}

pub fn save(path: &Path, targets: &[ActionTarget]) -> Result<()> {
    let mut out = String::from(HEADER);
    for t in targets {
        out.push_str(&t.name);
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let targets = parse("# header\n\n  Alice  \n#Bob\nCarol[pig]\n   \n");
        let names: Vec<_> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Carol[pig]"]);
    }

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.txt");
        assert!(load(&path).unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.txt");
        let targets = vec![ActionTarget::new("仙尊"), ActionTarget::new("B")];
        save(&path, &targets).unwrap();
        assert_eq!(load(&path).unwrap(), targets);
    }
}

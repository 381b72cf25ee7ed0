use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::drops::DropRecord;

pub const DEFAULT_OUTPUT_DIR: &str = "Droplists";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonsterDrops {
    pub monster: String,
    pub drops: Vec<DropRecord>,
}

impl MonsterDrops {
    pub fn unresolved(&self) -> usize {
        self.drops.iter().filter(|d| d.id.is_none()).count()
    }
}

/// File-system safe form of a wiki title.
pub fn safe_name(title: &str) -> String {
    title.replace(['/', '\\'], "_")
}

/// Create `<dir>/droplist_<category>_<timestamp>.<ext>` and return its path.
pub fn create_output_file(dir: &Path, category: &str, format: OutputFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!(
        "droplist_{}_{}.{}",
        safe_name(category),
        stamp,
        format.extension()
    ));
    std::fs::File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(path)
}

pub fn format_text(entry: &MonsterDrops) -> String {
    let mut out = format!("Drop table for {}:\n", entry.monster);
    for drop in &entry.drops {
        match drop.id {
            Some(id) => out.push_str(&format!("{} (ID: {})\n", drop.name, id)),
            None => out.push_str(&format!("{} (ID: Not found)\n", drop.name)),
        }
    }
    out.push('\n');
    out
}

pub fn append_text(path: &Path, entry: &MonsterDrops) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(format_text(entry).as_bytes())?;
    Ok(())
}

pub fn write_json(path: &Path, entries: &[MonsterDrops]) -> Result<()> {
    let body = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

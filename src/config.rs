use std::path::PathBuf;

use crate::dump::{DumpLog, DEFAULT_DUMP_DIR};
use crate::output::{OutputFormat, DEFAULT_OUTPUT_DIR};

pub const DEFAULT_API_URL: &str = "https://oldschool.runescape.wiki/api.php";
pub const API_URL_ENV: &str = "OSRS_WIKI_API";

/// Runtime settings, built once in `main` and passed down by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub item_db: PathBuf,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub dump: DumpLog,
}

impl Settings {
    pub fn new(item_db: PathBuf, format: OutputFormat, logs: bool) -> Self {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            api_url,
            item_db,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format,
            dump: DumpLog::new(logs, DEFAULT_DUMP_DIR),
        }
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::output::safe_name;

pub const DEFAULT_DUMP_DIR: &str = "Logs";

/// Writes raw API exchanges and intermediate results to `Logs/` when `--logs`
/// is given. Passed to whoever needs it; disabled dumps are no-ops.
#[derive(Debug, Clone)]
pub struct DumpLog {
    enabled: bool,
    dir: PathBuf,
}

#[derive(Serialize)]
pub struct ApiExchange<'a> {
    pub url: &'a str,
    pub params: BTreeMap<&'a str, &'a str>,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub content: &'a str,
}

impl DumpLog {
    pub fn new(enabled: bool, dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            dir: dir.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn api_response(&self, subject: &str, exchange: &ApiExchange) {
        self.parsed(subject, "api_response", exchange);
    }

    pub fn parsed<T: Serialize + ?Sized>(&self, subject: &str, kind: &str, value: &T) {
        if !self.enabled {
            return;
        }
        let written = serde_json::to_string_pretty(value)
            .context("Failed to serialize dump")
            .and_then(|body| self.write(subject, kind, &body));
        match written {
            Ok(path) => debug!("Dumped {} for {} to {}", kind, subject, path.display()),
            Err(e) => warn!("Could not dump {} for {}: {:#}", kind, subject, e),
        }
    }

    fn write(&self, subject: &str, kind: &str, body: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(file_name(subject, kind));
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn file_name(subject: &str, kind: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}_{}.log", safe_name(subject), kind, stamp)
}

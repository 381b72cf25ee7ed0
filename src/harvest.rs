use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::drops::{self, is_nothing};
use crate::items::ItemDb;
use crate::output::{self, MonsterDrops, OutputFormat};
use crate::wiki::{PageMarkup, WikiClient};

const CONCURRENCY: usize = 10;

pub struct Harvest {
    pub entries: usize,
    pub monsters: usize,
    pub results: Vec<MonsterDrops>,
    pub path: PathBuf,
}

impl Harvest {
    pub fn drop_count(&self) -> usize {
        self.results.iter().map(|r| r.drops.len()).sum()
    }

    pub fn unresolved(&self) -> usize {
        self.results.iter().map(MonsterDrops::unresolved).sum()
    }
}

/// Drops of every monster page in `category`, written to a new output file.
pub async fn harvest_category(
    settings: &Settings,
    client: Arc<WikiClient>,
    items: &ItemDb,
    category: &str,
    limit: Option<usize>,
) -> Result<Harvest> {
    let mut entries = client.category_members(category).await?;
    if let Some(n) = limit {
        entries.truncate(n);
    }
    settings.dump.parsed(category, "category_members", &entries);
    info!("{} entries in category {}", entries.len(), category);

    let checks = run_concurrently(&client, &entries, "Checking pages", |c, title| async move {
        c.is_monster(&title).await
    })
    .await;
    let monsters: Vec<String> = entries
        .iter()
        .zip(checks)
        .filter(|(_, is_monster)| is_monster.unwrap_or(false))
        .map(|(title, _)| title.clone())
        .collect();
    settings.dump.parsed(category, "filtered_monsters", &monsters);
    info!("{} monsters in category {}", monsters.len(), category);

    let pages: Vec<PageMarkup> = run_concurrently(&client, &monsters, "Fetching drops", |c, title| async move {
        c.page_markup(&title).await
    })
    .await
    .into_iter()
    .zip(&monsters)
    .filter_map(|(result, title)| match result {
        Some(Ok(page)) => page,
        Some(Err(e)) => {
            warn!("Skipping {}: {:#}", title, e);
            None
        }
        None => None,
    })
    .collect();

    let results = collect_drops(settings, &pages, items);

    let path = output::create_output_file(&settings.output_dir, category, settings.format)?;
    match settings.format {
        OutputFormat::Text => {
            for entry in &results {
                output::append_text(&path, entry)?;
            }
        }
        OutputFormat::Json => output::write_json(&path, &results)?,
    }

    Ok(Harvest {
        entries: entries.len(),
        monsters: monsters.len(),
        results,
        path,
    })
}

/// Extract and resolve drops for already fetched pages, keeping page order.
pub fn collect_drops(settings: &Settings, pages: &[PageMarkup], items: &ItemDb) -> Vec<MonsterDrops> {
    pages
        .par_iter()
        .map(|page| {
            let mut names = drops::drop_names(&page.html, &page.wikitext);
            names.retain(|n| !is_nothing(n));
            settings.dump.parsed(&page.title, "monster_drops", &names);
            MonsterDrops {
                monster: page.title.clone(),
                drops: drops::resolve_all(names, items),
            }
        })
        .collect()
}

/// Run `task` for every title with at most `CONCURRENCY` in flight. Results
/// come back in title order; a task that died leaves `None`.
async fn run_concurrently<T, F, Fut>(
    client: &Arc<WikiClient>,
    titles: &[String],
    label: &str,
    task: F,
) -> Vec<Option<T>>
where
    F: Fn(Arc<WikiClient>, String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let pb = ProgressBar::new(titles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(label.to_string());

    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, T)>(CONCURRENCY * 2);

    for (idx, title) in titles.iter().enumerate() {
        let fut = task(Arc::clone(client), title.clone());
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };
            let _ = tx.send((idx, fut.await)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = titles.iter().map(|_| None).collect();
    while let Some((idx, value)) = rx.recv().await {
        slots[idx] = Some(value);
        pb.inc(1);
    }
    pb.finish_and_clear();

    slots
}

mod config;
mod drops;
mod dump;
mod harvest;
mod items;
mod output;
mod wiki;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::Settings;
use drops::is_nothing;
use items::{ItemDb, DEFAULT_ITEM_DB_PATH};
use output::{MonsterDrops, OutputFormat};
use wiki::WikiClient;

#[derive(Parser)]
#[command(name = "osrs_drops", about = "OSRS Wiki drop table scraper")]
struct Cli {
    /// Dump raw API responses and parsed results to Logs/
    #[arg(long, global = true)]
    logs: bool,
    /// Item database (JSON object keyed by item id)
    #[arg(long, global = true, default_value = DEFAULT_ITEM_DB_PATH)]
    item_db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect drop tables for every monster in a wiki category
    Category {
        /// Category name without the "Category:" prefix
        name: String,
        /// Max category entries to check (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output file format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the drop table of a single page
    Monster {
        /// Wiki page title
        title: String,
    },
    /// Look up the item id for a name
    Resolve {
        /// Item name as it appears in a drop table
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let format = match &cli.command {
        Commands::Category { format, .. } => *format,
        _ => OutputFormat::Text,
    };
    let settings = Settings::new(cli.item_db, format, cli.logs);
    if settings.dump.is_enabled() {
        info!("Dumping API responses to {}", settings.dump.dir().display());
    }

    let items = load_items(&settings);

    match cli.command {
        Commands::Category { name, limit, .. } => {
            let client = Arc::new(WikiClient::new(&settings.api_url, settings.dump.clone())?);
            let harvest = harvest::harvest_category(&settings, client, &items, &name, limit).await?;

            if harvest.monsters == 0 {
                println!(
                    "No monsters found in category '{}' ({} entries checked).",
                    name, harvest.entries
                );
            }
            for entry in &harvest.results {
                print_summary(entry);
            }
            println!(
                "\nDrop tables for {} monsters ({} drops, {} unresolved) in category '{}' saved to {}",
                harvest.results.len(),
                harvest.drop_count(),
                harvest.unresolved(),
                name,
                harvest.path.display()
            );
        }
        Commands::Monster { title } => {
            let client = WikiClient::new(&settings.api_url, settings.dump.clone())?;
            let Some(page) = client.page_markup(&title).await? else {
                println!("No page data for '{}'.", title);
                return Ok(());
            };
            let mut found = drops::extract_drops(&page.html, &page.wikitext, &items);
            found.retain(|d| !is_nothing(&d.name));
            settings.dump.parsed(&title, "monster_drops", &found);

            let entry = MonsterDrops {
                monster: page.title,
                drops: found,
            };
            print!("{}", output::format_text(&entry));
        }
        Commands::Resolve { name } => match items.resolve(&name) {
            Some(id) => {
                let canonical = items.get(id).map(|r| r.name.as_str()).unwrap_or(&name);
                println!("{} -> {} ({})", name, id, canonical);
            }
            None => println!("{} -> Not found", name),
        },
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    Ok(())
}

/// A missing or broken item database is not fatal; every drop is then unresolved.
fn load_items(settings: &Settings) -> ItemDb {
    match ItemDb::load(&settings.item_db) {
        Ok(items) => items,
        Err(e) => {
            warn!("{:#}; item ids will not be resolved", e);
            ItemDb::default()
        }
    }
}

fn print_summary(entry: &MonsterDrops) {
    let unresolved = entry.unresolved();
    if unresolved == 0 {
        println!("{:<32} {:>4} drops", entry.monster, entry.drops.len());
    } else {
        println!(
            "{:<32} {:>4} drops ({} without id)",
            entry.monster,
            entry.drops.len(),
            unresolved
        );
    }
}

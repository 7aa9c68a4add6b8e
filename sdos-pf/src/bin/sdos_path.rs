//! sdos-path - find the collaboration chain between two artists
//!
//! Resolves both artists through the catalog search (numeric arguments are
//! taken as catalog ids), loads or builds the collaboration graph and prints
//! every hop with its MBID and the recording that links it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sdos_common::config;
use sdos_common::db::connect_catalog;
use sdos_common::time::format_seconds;
use sdos_common::ArtistId;
use sdos_pf::cache::GraphCache;
use sdos_pf::catalog::{Catalog, PgCatalog};
use sdos_pf::search::ExcludedEdges;
use sdos_pf::{logging, Error, GraphManager, ManagerSettings, PathQuery};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "sdos-path")]
#[command(about = "Find the shortest collaboration chain between two artists")]
#[command(version)]
struct Args {
    /// First artist: a name or a numeric catalog id
    from: String,

    /// Second artist: a name or a numeric catalog id
    to: String,

    /// Rebuild the collaboration graph from the catalog instead of using the cache
    #[arg(long)]
    rebuild: bool,

    /// Collaboration to ignore, as two artist ids `A:B` (repeatable)
    #[arg(long = "exclude", value_name = "A:B", value_parser = parse_edge)]
    exclude: Vec<(ArtistId, ArtistId)>,

    /// Catalog connection URL [env: DATABASE_URL]
    #[arg(long)]
    database_url: Option<String>,

    /// Folder holding the cache artifacts [env: SDOS_CACHE_FOLDER]
    #[arg(long)]
    cache_folder: Option<PathBuf>,

    /// Config file to use instead of the platform default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_edge(value: &str) -> std::result::Result<(ArtistId, ArtistId), String> {
    let (a, b) = value
        .split_once(':')
        .ok_or_else(|| format!("expected A:B, got '{}'", value))?;
    let parse = |id: &str| {
        id.trim()
            .parse::<ArtistId>()
            .map_err(|_| format!("'{}' is not an artist id", id))
    };
    Ok((parse(a)?, parse(b)?))
}

/// Log filter requested with `-v`, `None` to use the configured level
fn verbosity_filter(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        _ => Some("debug"),
    }
}

/// An artist picked from the command line
struct Selected {
    id: ArtistId,
    name: String,
}

async fn select_artist(catalog: &dyn Catalog, input: &str) -> Result<Option<Selected>> {
    if let Ok(id) = input.trim().parse::<ArtistId>() {
        let name = catalog
            .lookup_artist(id)
            .await?
            .map(|artist| artist.name)
            .unwrap_or_else(|| format!("<id:{}>", id));
        return Ok(Some(Selected { id, name }));
    }

    let matches = catalog.search_artists(input, 5).await?;
    let Some(best) = matches.first() else {
        return Ok(None);
    };
    if matches.len() > 1 {
        println!(
            "  '{}' matched {} artists; using {} (id={}, {} recordings)",
            input,
            matches.len(),
            best.name,
            best.id,
            best.release_count
        );
    }
    Ok(Some(Selected {
        id: best.id,
        name: best.name.clone(),
    }))
}

async fn timed_select(catalog: &dyn Catalog, input: &str, which: &str) -> Result<(Selected, Duration)> {
    let started = Instant::now();
    match select_artist(catalog, input).await? {
        Some(selected) => Ok((selected, started.elapsed())),
        None => bail!("{} artist '{}' not found", which, input),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_filter = logging::init(verbosity_filter(args.verbose).unwrap_or("warn"));

    println!("MusicBrainz Six Degrees of Separation (SDOS)");
    println!("--------------------------------------------------");

    let toml_config = match &args.config {
        Some(path) => config::load_toml_config_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => config::load_toml_config(),
    };
    if verbosity_filter(args.verbose).is_none() {
        log_filter.apply_level(&toml_config.logging.level);
    }
    let database_url = config::resolve_database_url(args.database_url.as_deref(), &toml_config);
    let cache_folder = config::resolve_cache_folder(args.cache_folder.as_deref(), &toml_config);
    config::ensure_directory_exists(&cache_folder)?;

    let pool = connect_catalog(&database_url)
        .await
        .context("Failed to connect to catalog")?;
    println!("Connected to catalog");

    let catalog: Arc<dyn Catalog> = Arc::new(PgCatalog::new(pool, toml_config.catalog.clone()));
    let cache = GraphCache::new(&cache_folder)
        .with_max_age(ManagerSettings::max_cache_age(&toml_config.graph));
    let manager = GraphManager::new(
        Arc::clone(&catalog),
        cache,
        ManagerSettings::from_config(&toml_config.graph),
    );

    if let Err(e) = manager.ensure_names().await {
        warn!("Artist names unavailable, falling back to catalog lookups: {}", e);
    }

    let started = Instant::now();
    let graph_size = if args.rebuild {
        manager.rebuild().await?.graph_size
    } else {
        manager.ensure_loaded().await?.graph.len()
    };
    println!(
        "Graph ready (artists in graph: {}) - build/load took {}",
        graph_size,
        format_seconds(started.elapsed())
    );

    let (first, first_time) = timed_select(catalog.as_ref(), &args.from, "First").await?;
    let (second, second_time) = timed_select(catalog.as_ref(), &args.to, "Second").await?;

    println!("\nSearch Performance:");
    println!("  First artist lookup : {}", format_seconds(first_time));
    println!("  Second artist lookup: {}", format_seconds(second_time));
    println!(
        "  Total artist lookup : {}",
        format_seconds(first_time + second_time)
    );

    println!(
        "\nSearching for connection between '{}' and '{}'...",
        first.name, second.name
    );

    let excluded: ExcludedEdges = args.exclude.iter().copied().collect();
    let query = PathQuery::new(first.id, second.id).excluding(excluded);
    let outcome = match manager.find_path(query).await {
        Ok(outcome) => outcome,
        Err(Error::EntityNotInGraph { missing }) => {
            println!("One or both artists have no collaborations in the graph (or were filtered).");
            for (selected, label) in [(&first, "first"), (&second, "second")] {
                if missing.contains(&selected.id) {
                    println!("   - {} (id={}, {} artist) not in graph", selected.name, selected.id, label);
                }
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if !outcome.found {
        println!(
            "No connection path found between '{}' and '{}'.",
            first.name, second.name
        );
        println!("Path search completed in {}", format_seconds(outcome.elapsed));
        std::process::exit(1);
    }

    println!(
        "\nConnection path found ({} degrees of separation) in {}:\n",
        outcome.hop_count,
        format_seconds(outcome.elapsed)
    );

    let steps = manager.describe_path(first.id, &outcome.path).await;
    for (n, step) in steps.iter().enumerate() {
        println!(
            "{}. {}  <-->  {} (MBID: {})",
            n + 1,
            step.from_name,
            step.to_name,
            step.to_mbid.as_deref().unwrap_or("none")
        );
        if let Some(work) = &step.work {
            println!("    via: '{}'\n", work);
        }
    }

    if let Some(last) = steps.last() {
        println!("Final artist: {}", last.to_name);
    }
    Ok(())
}

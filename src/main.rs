//! Submission Harvester main entry point
//!
//! This is the command-line interface for harvesting a paginated listing of
//! public submissions.

use clap::Parser;
use std::path::PathBuf;
use submission_harvester::config::{load_config_with_hash, Config};
use submission_harvester::content::{parse_documents, ParseOptions, PopplerParser};
use submission_harvester::crawler::Coordinator;
use submission_harvester::linker::link_supplementary;
use submission_harvester::output::{
    load_statistics, load_unclassified, print_statistics, print_unclassified,
};
use submission_harvester::storage::{backup_database, open_storage};
use submission_harvester::{
    ConfigError, GroupClassification, HarvestError, PageTracker, RecordStore,
};
use tracing_subscriber::EnvFilter;

/// Submission Harvester: a resumable harvester for public submissions
///
/// Walks every page of the submissions listing, downloads each submission's
/// document and links supplementary amendments to their original submission.
/// Interrupted runs resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "submission-harvester")]
#[command(version)]
#[command(about = "A resumable harvester for public submissions", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Mark pages START..=END as not scraped so the next run revisits them
    #[arg(long, group = "mode", num_args = 2, value_names = ["START", "END"])]
    reset_pages: Option<Vec<u32>>,

    /// Record a reviewer classification for a top-level submission
    #[arg(long, group = "mode", num_args = 2, value_names = ["EXTERNAL_ID", "KIND"])]
    classify: Option<Vec<String>>,

    /// List top-level submissions that have not been classified
    #[arg(long, group = "mode")]
    list_unclassified: bool,

    /// Link supplementary submissions to their parents and exit
    #[arg(long, group = "mode")]
    link: bool,

    /// Extract text from downloaded documents and exit
    #[arg(long, group = "mode")]
    parse: bool,

    /// Stop parsing after this many submissions
    #[arg(long, requires = "parse")]
    limit: Option<usize>,

    /// Discard previously extracted content before parsing
    #[arg(long, requires = "parse")]
    reset_content: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if let Some(backup_dir) = &config.output.backup_dir {
        if let Some(path) = backup_database(&config.output.database_path, backup_dir)? {
            tracing::info!("Database backed up to {}", path.display());
        }
    }

    if cli.stats {
        handle_stats(&config)?;
    } else if let Some(range) = &cli.reset_pages {
        handle_reset_pages(&config, range[0], range[1])?;
    } else if let Some(args) = &cli.classify {
        handle_classify(&config, &args[0], &args[1])?;
    } else if cli.list_unclassified {
        handle_list_unclassified(&config)?;
    } else if cli.link {
        handle_link(&config)?;
    } else if cli.parse {
        let options = ParseOptions {
            limit: cli.limit,
            reset: cli.reset_content,
        };
        handle_parse(&config, options)?;
    } else {
        handle_harvest(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("submission_harvester=info,warn"),
            1 => EnvFilter::new("submission_harvester=debug,info"),
            2 => EnvFilter::new("submission_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what a harvest would do
fn handle_dry_run(config: &Config) {
    println!("=== Submission Harvester Dry Run ===\n");

    println!("Harvester Configuration:");
    println!("  Page workers: {}", config.harvester.concurrency);
    println!("  Full page size: {}", config.harvester.page_size);
    println!("  Settle delay: {}ms", config.harvester.settle_delay_ms);
    println!(
        "  Failure cooldown: {}s",
        config.harvester.failure_cooldown_secs
    );

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  Keyword: \"{}\"", config.source.keyword);
    println!(
        "  Order: {} {}",
        config.source.sort.as_query_value(),
        config.source.direction.as_query_value()
    );

    println!("\nSession:");
    println!("  User agent: {}", config.session.user_agent);
    match config.session.request_timeout() {
        Some(timeout) => println!("  Request timeout: {}s", timeout.as_secs()),
        None => println!("  Request timeout: none"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path.display());
    println!("  Documents: {}", config.output.document_dir.display());
    if let Some(backup_dir) = &config.output.backup_dir {
        println!("  Backups: {}", backup_dir.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), HarvestError> {
    println!("Database: {}\n", config.output.database_path.display());

    let storage = open_storage(&config.output.database_path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --reset-pages: clears the scraped flag on a page range
fn handle_reset_pages(config: &Config, start: u32, end: u32) -> Result<(), HarvestError> {
    let mut storage = open_storage(&config.output.database_path)?;
    let reset = storage.reset_range(start, end)?;
    println!("✓ Reset {} scraped pages in {}..={}", reset, start, end);
    Ok(())
}

/// Handles --classify: stores a reviewer classification
fn handle_classify(config: &Config, external_id: &str, kind: &str) -> Result<(), HarvestError> {
    let classification: GroupClassification = kind
        .parse()
        .map_err(|e: String| HarvestError::Config(ConfigError::Validation(e)))?;

    let mut storage = open_storage(&config.output.database_path)?;
    link_supplementary(&mut storage)?;
    storage.set_group_classification(external_id, classification)?;
    println!("✓ {} classified as {}", external_id, classification);
    Ok(())
}

/// Handles --list-unclassified: prints submissions awaiting review
fn handle_list_unclassified(config: &Config) -> Result<(), HarvestError> {
    let mut storage = open_storage(&config.output.database_path)?;
    let records = load_unclassified(&mut storage)?;
    print_unclassified(&records);
    Ok(())
}

/// Handles --link: runs the supplementary linker on its own
fn handle_link(config: &Config) -> Result<(), HarvestError> {
    let mut storage = open_storage(&config.output.database_path)?;
    let report = link_supplementary(&mut storage)?;
    println!(
        "✓ {} supplementary submissions: {} linked, {} already linked",
        report.candidates, report.links_created, report.already_linked
    );
    Ok(())
}

/// Handles --parse: links, then extracts document content
fn handle_parse(config: &Config, options: ParseOptions) -> Result<(), HarvestError> {
    let mut storage = open_storage(&config.output.database_path)?;
    let report = parse_documents(
        &mut storage,
        &PopplerParser::new(),
        &config.output.document_dir,
        options,
    )?;

    println!(
        "✓ Parsed {} of {} submissions ({} skipped for missing documents)",
        report.parsed, report.unparsed, report.missing
    );
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config) -> Result<(), HarvestError> {
    tracing::info!(
        "Harvesting \"{}\" from {} with {} workers",
        config.source.keyword,
        config.source.base_url,
        config.harvester.concurrency
    );

    let coordinator = Coordinator::new(config)?;
    let report = match coordinator.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e);
        }
    };
    println!("{}", report);

    let links = coordinator.storage().with(|s| link_supplementary(s))?;
    tracing::info!(
        "Linked {} supplementary submissions ({} already linked)",
        links.links_created,
        links.already_linked
    );

    Ok(())
}

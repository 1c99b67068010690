use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use strata_blob::{BlobStore, InMemoryBlobRepository};
use strata_ingest::{IngestOptions, IngestReport, Ingester};
use strata_tree::{
    BroadcastPublisher, InMemoryOutbox, InMemoryTreeStore, Notifier, PathStore, TermIndex,
};
use strata_types::{merge, ArchiveConfig, ROOT};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Ingest(args) => cmd_ingest(config, args),
        Command::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ArchiveConfig> {
    match path {
        Some(path) => ArchiveConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ArchiveConfig::default()),
    }
}

fn open_archive(config: &ArchiveConfig) -> PathStore {
    let blobs = BlobStore::new(Arc::new(InMemoryBlobRepository::new()))
        .with_chunk_size(config.blob.chunk_size);
    let notifier = Notifier::from_settings(
        &config.notifications,
        Arc::new(InMemoryOutbox::new()),
        Arc::new(BroadcastPublisher::new(config.notifications.channel_capacity)),
    );
    PathStore::new(Arc::new(InMemoryTreeStore::new()), blobs)
        .with_search(Arc::new(TermIndex::new()))
        .with_notifier(notifier)
        .with_agent(&config.agent)
}

fn cmd_ingest(config: ArchiveConfig, args: IngestArgs) -> anyhow::Result<()> {
    let mut settings = config.ingest.clone();
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    let mut options = IngestOptions::new(&args.source, &args.group, &args.user);
    if let Some(ip) = args.local_ip {
        options.local_ip = ip;
    }
    options.skip_import = args.no_import;
    options.include_filter = args.include;

    let store = Arc::new(open_archive(&config));
    let report = Ingester::new(Arc::clone(&store), settings, options).run()?;
    print_report(&report);

    println!();
    print_tree(&store, ROOT, 0)?;
    if !report.is_success() {
        anyhow::bail!("{} file(s) could not be ingested", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    let mark = if report.is_success() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("{} Ingest complete", mark);
    println!("  Collections created: {}", report.collections_created.to_string().bold());
    println!("  Resources created:   {}", report.resources_created.to_string().bold());
    println!("  Resources updated:   {}", report.resources_updated.to_string().bold());
    println!("  Unchanged:           {}", report.resources_unchanged.to_string().dimmed());
    println!("  Elapsed:             {:.2?}", report.elapsed);
    for failure in &report.failures {
        println!(
            "  {} {} after {} attempts: {}",
            "failed:".red(),
            failure.path.yellow(),
            failure.attempts,
            failure.error
        );
    }
}

fn print_tree(store: &PathStore, path: &str, depth: usize) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    if depth == 0 {
        println!("{}", path.blue().bold());
    }
    let children = store.children(path)?;
    for name in &children.collections {
        println!("{indent}  {}/", name.blue());
        print_tree(store, &merge(path, name), depth + 1)?;
    }
    for name in &children.resources {
        let resource = store.find_resource(&merge(path, name))?;
        let size = resource.map(|r| r.size).unwrap_or_default();
        println!("{indent}  {} {}", name, format!("({size} bytes)").dimmed());
    }
    Ok(())
}

fn cmd_config(config: &ArchiveConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

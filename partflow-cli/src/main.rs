//! partflow: inspect and edit a workflow snapshot
//!
//! Loads a snapshot of parts into the bucketed store, applies any requested
//! moves and removals, and prints the resulting buckets.
//!
//! Usage:
//!   partflow parts.json --move 12=cnc --remove 7 --output parts.json
//!   partflow parts.json --search bracket --sort name --limit 20 --json

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use partflow_cli::{
    MoveRequest, apply_edits, open_snapshot, parse_id, parse_move, read_config, render_json,
    render_text, save_snapshot, trace_writes,
};
use partflow_model::{CategoryConfig, EntityId, ListQuery, SortOrder};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "partflow")]
#[command(about = "Inspect and edit a partflow workflow snapshot")]
struct Args {
    /// Snapshot file: a bucket map or a flat array of parts
    snapshot: PathBuf,

    /// Category layout config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Move a part to another bucket (repeatable)
    #[arg(long = "move", value_name = "ID=CATEGORY", value_parser = parse_move)]
    moves: Vec<MoveRequest>,

    /// Remove a part (repeatable)
    #[arg(long = "remove", value_name = "ID", value_parser = parse_id)]
    removals: Vec<EntityId>,

    /// Only list parts matching this text
    #[arg(short, long)]
    search: Option<String>,

    /// Only list parts in this bucket
    #[arg(long)]
    category: Option<String>,

    /// Sort the listing by this field (name, status, assigned, amount, ...)
    #[arg(long, value_name = "FIELD")]
    sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,

    /// Maximum number of parts to list
    #[arg(long)]
    limit: Option<usize>,

    /// Number of parts to skip
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Write the resulting snapshot to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => CategoryConfig::default(),
    };
    let manager = open_snapshot(&args.snapshot, config)?;
    let _writes = trace_writes(manager.store());

    let report = apply_edits(&manager, &args.moves, &args.removals)?;
    if !report.moved.is_empty() || !report.removed.is_empty() {
        info!(
            moved = report.moved.len(),
            removed = report.removed.len(),
            missing = report.missing.len(),
            "Edits applied"
        );
    }

    if let Some(path) = &args.output {
        save_snapshot(&manager, path)?;
    }

    let query = list_query(&args);
    if args.json {
        let out = render_json(&manager, query.as_ref())?;
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render_text(&manager, query.as_ref())?);
    }
    Ok(())
}

/// A flat listing is requested by any filter, sort or paging flag.
fn list_query(args: &Args) -> Option<ListQuery> {
    let wanted = args.search.is_some()
        || args.category.is_some()
        || args.sort.is_some()
        || args.limit.is_some()
        || args.offset > 0;
    wanted.then(|| ListQuery {
        search: args.search.clone(),
        category: args.category.clone(),
        sort_by: args.sort.clone(),
        sort_order: if args.desc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        },
        limit: args.limit,
        offset: args.offset,
    })
}

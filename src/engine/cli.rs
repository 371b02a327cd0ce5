//! CLI command handler: resolve options, open the catalog, run one subcommand and print the result.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use log::{debug, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::engine::arg_parser::{Cli, Commands};
use crate::engine::progress::{create_progress_bar, progress_callback, refresh_bar};
use crate::engine::tools::parse_cutoff;
use crate::pipeline::Validator;
use crate::review::ReviewOutcome;
use crate::utils::valicat_toml::{apply_file_to_opts, load_valicat_toml};
use crate::utils::{catalog_from_env, setup_logging};
use crate::{ErrorReviewRow, Opts, RunMode, RunSummary, StatusSnapshot};

/// Defaults, then `valicat.toml` beside the catalog, then CLI flags.
fn setup_opts(cli: &Cli) -> Result<Opts> {
    let common = &cli.common;
    let catalog = common
        .catalog
        .clone()
        .or_else(|| catalog_from_env(Path::new(".")))
        .context("no catalog given; pass --catalog or set VALICAT_CATALOG")?;
    let mut opts = Opts {
        catalog,
        ..Default::default()
    };
    if let Some(file) = opts.catalog.parent().and_then(load_valicat_toml) {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(v) = common.verbose {
        opts.verbose = v;
    }
    if let Some(n) = common.max_concurrent {
        opts.max_concurrent = n.max(1);
    }
    if let Some(n) = common.batch_size {
        opts.batch_size = n.max(1);
    }
    opts.json = common.json;
    setup_logging(opts.verbose);
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
    Ok(opts)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn count_or_dash(n: Option<u64>) -> String {
    n.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn print_status(s: &StatusSnapshot) {
    println!("New images:           {}", count_or_dash(s.new_images));
    println!("Due for revalidation: {}", count_or_dash(s.due_images));
    let failed = |n: Option<u64>| {
        let text = count_or_dash(n);
        if n.unwrap_or(0) > 0 {
            text.red().to_string()
        } else {
            text
        }
    };
    println!("New errors:           {}", failed(s.new_errors));
    println!("Revalidation errors:  {}", failed(s.revalidation_errors));
}

fn print_summary(s: &RunSummary) {
    let state = if s.cancelled {
        "cancelled".yellow()
    } else {
        "done".green()
    };
    println!(
        "{} {}: {} checked, {} recorded, {} confirmed",
        s.mode, state, s.dispatched, s.recorded, s.confirmed
    );
    if s.failures() > 0 {
        let text = format!(
            "{} missing, {} unreadable, {} mismatched",
            s.missing, s.unreadable, s.mismatched
        );
        println!("{}", text.red());
    }
}

fn print_errors(rows: &[ErrorReviewRow]) {
    if rows.is_empty() {
        println!("{}", "No errors awaiting review.".green());
        return;
    }
    for r in rows {
        println!(
            "{} [{}] {}",
            r.image_id.to_string().red(),
            r.detected_at,
            r.message
        );
        println!("    path: {}", r.last_known_path().unwrap_or("-"));
        if let Some(d) = &r.new_digest {
            println!("    new checksum: {d}");
        }
        println!("    {}", r.suggestion);
    }
}

/// Run one kind of validation in the foreground; Ctrl+C cancels it cooperatively.
fn run_validation(validator: &Arc<Validator>, mode: RunMode, opts: &Opts) -> Result<()> {
    let handler_validator = Arc::clone(validator);
    ctrlc::set_handler(move || {
        warn!("Cancel requested; finishing in-flight checks");
        handler_validator.cancel_all();
    })
    .context("set Ctrl+C handler")?;

    let bar = if opts.verbose && !opts.json {
        let cutoff = match mode {
            RunMode::Revalidation { cutoff } => Some(cutoff),
            RunMode::Discovery => None,
        };
        let snap = validator.refresh_status(cutoff, true)?;
        let total = match mode {
            RunMode::Discovery => snap.new_images,
            RunMode::Revalidation { .. } => snap.due_images,
        };
        Some(create_progress_bar(
            total.unwrap_or(0) as usize,
            mode.label(),
        ))
    } else {
        None
    };
    let summary = validator.run_blocking(mode, progress_callback(&bar))?;
    if let Some(bar) = &bar {
        refresh_bar(bar);
        eprintln!();
    }
    if opts.json {
        print_json(&summary)
    } else {
        print_summary(&summary);
        Ok(())
    }
}

fn report_review(outcome: ReviewOutcome, verb: &str, json: bool) -> Result<()> {
    if json {
        print_json(&outcome)?;
    }
    match outcome {
        ReviewOutcome::Applied(n) => {
            if !json {
                println!("{} {} error(s).", verb, n);
            }
            Ok(())
        }
        ReviewOutcome::Declined(reason) => bail!("{}", reason),
    }
}

/// Run the selected subcommand against the catalog.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    let validator = Arc::new(Validator::open(&opts)?);
    match &cli.command {
        Commands::Status { cutoff } => {
            let cutoff = cutoff.as_deref().map(parse_cutoff).transpose()?;
            let snap = validator.refresh_status(cutoff, true)?;
            if opts.json {
                print_json(&snap)?;
            } else {
                print_status(&snap);
            }
        }
        Commands::Discover => run_validation(&validator, RunMode::Discovery, &opts)?,
        Commands::Revalidate { cutoff } => {
            let cutoff = parse_cutoff(cutoff)?;
            run_validation(&validator, RunMode::Revalidation { cutoff }, &opts)?;
        }
        Commands::Buckets => {
            let buckets = validator.cutoff_buckets()?;
            if opts.json {
                print_json(&buckets)?;
            } else if buckets.is_empty() {
                println!("No validated images to revalidate.");
            } else {
                for b in &buckets {
                    println!("--cutoff \"{}\"  revalidates {} image(s)", b.cutoff, b.count);
                }
            }
        }
        Commands::Errors { kind } => {
            let rows = validator.errors(kind.map(Into::into))?;
            if opts.json {
                print_json(&rows)?;
            } else {
                print_errors(&rows);
            }
        }
        Commands::Ignore { ids } => {
            report_review(validator.review_ignore(ids)?, "Ignored", opts.json)?;
        }
        Commands::Accept { ids } => {
            report_review(validator.review_accept(ids)?, "Accepted", opts.json)?;
        }
        Commands::Preview { id, out, edge } => {
            let edge = edge.unwrap_or(opts.preview_edge);
            let img = validator
                .preview(*id, edge)
                .with_context(|| format!("no readable preview for image {id}"))?;
            img.save(out)
                .with_context(|| format!("write preview to {}", out.display()))?;
            if !opts.json {
                println!("Wrote {}x{} preview to {}", img.width(), img.height(), out.display());
            }
        }
    }
    Ok(())
}

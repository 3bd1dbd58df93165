//! Index command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};

use super::load_embedder;
use crate::config::Settings;
use crate::indexing::{IndexProgress, IndexingPipeline, IndexingReport};

const EMBED_BAR_TEMPLATE: &str =
    "{spinner:.cyan} Embedding [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})";

pub struct IndexArgs {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub threads: Option<usize>,
    pub no_progress: bool,
    pub json: bool,
}

/// Run the offline pipeline over `args.source`.
pub fn run(args: IndexArgs, config: &Settings) -> Result<()> {
    let snapshot_path = args.output.unwrap_or_else(|| config.resolved_index_path());
    let threads = args.threads.unwrap_or(config.indexing.parallel_threads).max(1);
    let show_progress = config.indexing.show_progress && !args.no_progress && !args.json;

    let embedder = load_embedder(config)?;
    let pipeline = IndexingPipeline::new(config, embedder)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("failed to start worker threads")?;

    tracing::debug!(
        target: "cli",
        "indexing {} -> {} with {threads} threads",
        args.source.display(),
        snapshot_path.display()
    );

    let progress = show_progress.then(Progress::new);
    let report = pool.install(|| {
        pipeline.run(&args.source, &snapshot_path, |event| {
            if let Some(progress) = &progress {
                progress.update(&event);
            }
        })
    });
    if let Some(progress) = &progress {
        progress.finish();
    }
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

struct Progress {
    bar: ProgressBar,
}

impl Progress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Loading documents...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn update(&self, event: &IndexProgress) {
        match event {
            IndexProgress::Loaded { documents, skipped } => {
                self.bar.set_message(format!(
                    "Loaded {documents} documents ({skipped} skipped), chunking..."
                ));
            }
            IndexProgress::Chunked { chunks } => {
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template(EMBED_BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=>-"),
                );
                self.bar.set_length(*chunks as u64);
                self.bar.set_position(0);
            }
            IndexProgress::Embedding { done, .. } => self.bar.set_position(*done as u64),
            IndexProgress::Built { chunks, dimension } => {
                self.bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.bar
                    .set_message(format!("Built index of {chunks} x {dimension}, saving..."));
            }
            IndexProgress::Saved { path } => {
                self.bar.set_message(format!("Saved {}", path.display()));
            }
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn print_report(report: &IndexingReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Indexing", ""]);

    table.add_row(vec!["Documents indexed".to_string(), report.documents_indexed.to_string()]);
    table.add_row(vec!["Chunks indexed".to_string(), report.chunks_indexed.to_string()]);
    table.add_row(vec!["Dimension".to_string(), report.dimension.to_string()]);
    table.add_row(vec!["Documents skipped".to_string(), report.skipped.len().to_string()]);
    table.add_row(vec!["Snapshot".to_string(), report.snapshot_path.display().to_string()]);
    table.add_row(vec![
        "Elapsed".to_string(),
        format!(
            "{:.2}s (embed {:.2}s, {:.1} chunks/s)",
            report.elapsed.as_secs_f64(),
            report.timings.embed.as_secs_f64(),
            report.throughput()
        ),
    ]);
    println!("{table}");

    if !report.skipped.is_empty() {
        println!("\nSkipped documents:");
        for skipped in &report.skipped {
            println!("  - {}: {}", skipped.filename, skipped.reason);
        }
    }
}

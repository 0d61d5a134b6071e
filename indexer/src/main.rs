use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use spindex_core::builder::{IndexBuilder, Ingest};
use spindex_core::config::{IndexerConfig, DEFAULT_HAMMING_DISTANCE, DEFAULT_SPILL_THRESHOLD};
use spindex_core::persist::IndexPaths;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

/// One crawled page. Other fields in the file are ignored.
#[derive(Debug, Deserialize)]
struct InputDoc {
    url: String,
    content: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an on-disk tf-idf inverted index from crawled HTML pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of JSON documents
    Build {
        /// Dataset directory, one `{url, content}` JSON file per page
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: String,
        /// Documents held in memory before spilling to disk
        #[arg(long, default_value_t = DEFAULT_SPILL_THRESHOLD)]
        spill_threshold: usize,
        /// Max Hamming distance between fingerprints of near-duplicate pages
        #[arg(long, default_value_t = DEFAULT_HAMMING_DISTANCE)]
        hamming_distance: u32,
        /// Cap on stored fingerprints (unbounded if omitted)
        #[arg(long)]
        fingerprint_budget: Option<usize>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, spill_threshold, hamming_distance, fingerprint_budget } => {
            let config = IndexerConfig {
                spill_threshold,
                hamming_distance,
                fingerprint_budget,
                ..IndexerConfig::default()
            };
            build_index(Path::new(&input), &output, config)
        }
    }
}

fn build_index(input: &Path, output: &str, config: IndexerConfig) -> Result<()> {
    let files = collect_files(input);
    tracing::info!(files = files.len(), input = %input.display(), "starting index build");

    let mut builder = IndexBuilder::new(IndexPaths::new(output), config)?;
    let mut skipped = 0usize;
    for file in &files {
        let doc = match read_doc(file) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(file = %file.display(), error = %err, "skipping unreadable document");
                skipped += 1;
                continue;
            }
        };
        if let Ingest::Indexed(doc_id) = builder.ingest(&doc.url, &doc.content)? {
            if doc_id % 1000 == 0 {
                tracing::info!(doc_id, seen = builder.stats().seen, "progress");
            }
        }
    }

    let summary = builder.finish()?;
    tracing::info!(
        num_docs = summary.num_docs,
        num_terms = summary.num_terms,
        seen = summary.stats.seen,
        repeat_urls = summary.stats.repeat_urls,
        near_duplicates = summary.stats.near_duplicates,
        skipped,
        output,
        "done"
    );
    Ok(())
}

/// Every regular file under `input`, in a stable order so doc ids are reproducible.
fn collect_files(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn read_doc(path: &Path) -> Result<InputDoc> {
    let f = File::open(path)?;
    let doc = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?;
    Ok(doc)
}

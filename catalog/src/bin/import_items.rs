//! Bulk-import catalog items from a CSV export.
//!
//! Each row becomes one item with its token set computed under the configured
//! policy. Rows are written in batches, one transaction per batch.
//!
//! Columns are located by header name (case-insensitive): `description`,
//! `category`, `upc` / `upcRetail`, `upcCase`, `itemNumber`. Files without a
//! recognizable header fall back to the column order
//! description, category, upc, itemNumber.
//!
//! ```bash
//! cargo run --release --bin import-items -- items.csv --db catalog.sqlite
//! RUST_LOG=debug cargo run --release --bin import-items -- items.csv --db catalog.sqlite -b 1000
//! ```

use anyhow::{bail, Context, Result};
use catalog_search::{CatalogStore, ItemFields, SearchConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

/// Import a CSV file of catalog items into a catalog database.
#[derive(Parser)]
#[command(name = "import-items")]
struct Cli {
    /// CSV file to import (first row is the header)
    input: PathBuf,

    /// Catalog database path (created if missing)
    #[arg(long = "db", default_value = "catalog.sqlite")]
    db_path: PathBuf,

    /// Items per write transaction
    #[arg(short, long, default_value_t = 500)]
    batch_size: usize,

    /// JSON search configuration (token policy etc.)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Column positions of each item field in the CSV.
#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    description: Option<usize>,
    category: Option<usize>,
    item_number: Option<usize>,
    upc_retail: Option<usize>,
    upc_case: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = ColumnMap::default();
        for (i, header) in headers.iter().enumerate() {
            let key: String = header
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            let slot = match key.as_str() {
                "description" | "itemdescription" => &mut map.description,
                "category" => &mut map.category,
                "itemnumber" | "itemno" => &mut map.item_number,
                "upc" | "upcretail" => &mut map.upc_retail,
                "upccase" => &mut map.upc_case,
                _ => continue,
            };
            slot.get_or_insert(i);
        }

        if map == ColumnMap::default() {
            tracing::warn!("no known column headers, using positional columns");
            map = ColumnMap {
                description: Some(0),
                category: Some(1),
                upc_retail: Some(2),
                item_number: Some(3),
                upc_case: None,
            };
        }
        map
    }

    fn fields(&self, record: &csv::StringRecord) -> ItemFields {
        let cell = |column: Option<usize>| {
            column
                .and_then(|i| record.get(i))
                .map(|value| value.to_string())
        };
        ItemFields {
            description: cell(self.description),
            category: cell(self.category),
            item_number: cell(self.item_number),
            upc_retail: cell(self.upc_retail),
            upc_case: cell(self.upc_case),
        }
        .normalized()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if cli.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }

    let config = match &cli.config {
        Some(path) => SearchConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };

    let store = CatalogStore::open_with_config(&cli.db_path, config)
        .with_context(|| format!("opening catalog {}", cli.db_path.display()))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let columns = ColumnMap::from_headers(reader.headers()?);
    tracing::debug!(?columns, "resolved CSV columns");

    let started = Instant::now();
    let mut batch = Vec::with_capacity(cli.batch_size);
    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut batches = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("parsing row {}", row + 2))?;
        let fields = columns.fields(&record);
        if fields.is_empty() {
            skipped += 1;
            continue;
        }
        batch.push(fields);

        if batch.len() == cli.batch_size {
            imported += store.import_batch(std::mem::take(&mut batch))?;
            batches += 1;
            tracing::info!(batch = batches, imported, "committed batch");
        }
    }

    if !batch.is_empty() {
        imported += store.import_batch(batch)?;
        batches += 1;
        tracing::info!(batch = batches, imported, "committed batch");
    }

    tracing::info!(
        imported,
        skipped,
        batches,
        total = store.item_count()?,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "import finished"
    );
    Ok(())
}

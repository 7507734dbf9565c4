use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::Context;

use crate::config::Config;
use crate::models::registration::{FieldSchema, Registration};

/// What actually happened to an accepted record. `Skipped` means the log
/// is disabled by configuration and is still reported as success upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Appended,
    Skipped,
}

/// Append-only CSV log of accepted registrations. Rows are serialized in
/// memory and written with a single append-mode write, so concurrent
/// submissions cannot interleave partial rows.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    disabled: bool,
    schema: FieldSchema,
}

impl CsvStore {
    pub fn new(config: &Config, schema: FieldSchema) -> Self {
        Self {
            path: config.csv_path(),
            disabled: config.disable_csv,
            schema,
        }
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Creates the log with its header row if absent. Idempotent; safe to
    /// race from concurrent startups (first writer wins).
    pub async fn ensure_initialized(&self) -> anyhow::Result<()> {
        if self.disabled {
            tracing::info!("CSV log disabled; skipping header creation");
            return Ok(());
        }
        let path = self.path.clone();
        let header = serialize_row(&self.schema.header_row())?;
        tokio::task::spawn_blocking(move || init_file(&path, &header))
            .await
            .context("storage init task panicked")?
    }

    /// Appends one record. Never rewrites or reorders earlier rows.
    pub async fn append(&self, record: &Registration) -> anyhow::Result<StoreOutcome> {
        if self.disabled {
            tracing::info!("CSV log disabled; not writing registration to disk");
            return Ok(StoreOutcome::Skipped);
        }
        self.ensure_initialized().await?;

        let path = self.path.clone();
        let row = serialize_row(&record.csv_row())?;
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening {} for append", path.display()))?;
            // One write call per row keeps O_APPEND writes record-atomic
            file.write_all(&row)
                .with_context(|| format!("appending to {}", path.display()))?;
            Ok(())
        })
        .await
        .context("storage append task panicked")??;

        Ok(StoreOutcome::Appended)
    }
}

pub(crate) fn serialize_row(fields: &[&str]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields).context("serializing CSV row")?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV row: {e}"))
}

fn init_file(path: &std::path::Path, header: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(header)
                .with_context(|| format!("writing header to {}", path.display()))?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e).with_context(|| format!("creating {}", path.display())),
    }
}

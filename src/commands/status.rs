use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::extract::{StoreSummary, summarize_store};
use crate::commands::inventory::inventory_manifest_path;
use crate::model::{ExtractRunManifest, PdfInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let inventory_path = inventory_manifest_path(&args.cache_root);
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("wells.sqlite"));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: PdfInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            pdf_count = inventory.pdf_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_run_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: ExtractRunManifest = read_json(&path)?;
            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                ocr_mode = %manifest.ocr_mode,
                pdf_count = manifest.counts.pdf_count,
                processed = manifest.counts.processed_pdf_count,
                failed = manifest.counts.failed_pdf_count,
                native_only = manifest.counts.native_only_count,
                ocr_invoked = manifest.counts.ocr_invoked_count,
                ocr_recovered_well_name = manifest.counts.ocr_recovered_well_name_count,
                with_well_name = manifest.counts.records_with_well_name,
                with_api_number = manifest.counts.records_with_api_number,
                "loaded latest extract run manifest"
            );
            for failure in &manifest.failures {
                warn!(source_pdf = %failure.source_pdf, error = %failure.error, "failed document");
            }
        }
        None => warn!(path = %manifest_dir.display(), "no extract run manifest found"),
    }

    if db_path.exists() {
        let connection = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let summary = store_summary_or_default(&connection, &db_path);

        info!(
            path = %db_path.display(),
            wells = summary.wells,
            with_well_name = summary.with_well_name,
            with_api_number = summary.with_api_number,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

/// Store counts, or zeros with a warning when the store cannot be queried.
fn store_summary_or_default(connection: &Connection, db_path: &Path) -> StoreSummary {
    match summarize_store(connection) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(
                path = %db_path.display(),
                error = %format!("{err:#}"),
                "failed to summarize store"
            );
            StoreSummary::default()
        }
    }
}

/// Newest `extract_run_*.json`; the compact UTC stamp in the name sorts chronologically.
fn latest_run_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("extract_run_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_run_manifest {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.pop())
}

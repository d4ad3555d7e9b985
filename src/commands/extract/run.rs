use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cli::{ExtractArgs, OcrMode};
use crate::commands::inventory::discover_pdfs;
use crate::model::{
    DocumentFailure, ExtractCounts, ExtractPaths, ExtractRunManifest, Field, Record, ToolVersions,
};
use crate::util::{
    command_available, command_version_optional, ensure_directory, now_utc_string,
    utc_compact_string, write_json_pretty,
};

use super::native_text::PopplerTextLayer;
use super::ocr_text::{OCRMYPDF, OcrMyPdf};
use super::orchestrator::{Escalation, Extractor};
use super::store::{RecordSink, SqliteSink, summarize_store};
use super::types::{Document, ExtractionConfig};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let manifest_path = args.run_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("extract_run_{}.json", utc_compact_string(started_ts)))
    });
    let records_path = args.records_path.clone().unwrap_or_else(|| {
        cache_root
            .join("records")
            .join(format!("records_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = if args.no_store {
        None
    } else {
        Some(
            args.db_path
                .clone()
                .unwrap_or_else(|| cache_root.join("wells.sqlite")),
        )
    };

    let pdf_paths = if args.files.is_empty() {
        discover_pdfs(&args.data_dir)?
    } else {
        args.files.clone()
    };
    if pdf_paths.is_empty() {
        bail!("no PDFs found in {}", args.data_dir.display());
    }

    info!(
        run_id = %run_id,
        pdf_count = pdf_paths.len(),
        ocr_mode = args.ocr_mode.as_str(),
        "starting extract"
    );

    let config = ExtractionConfig::from_args(&args);
    let mut warnings = Vec::new();
    if config.ocr_mode == OcrMode::Auto && !command_available(OCRMYPDF) {
        let message = format!("{OCRMYPDF} is unavailable; OCR fallback will recover no fields");
        warn!("{message}");
        warnings.push(message);
    }

    let tool_versions = collect_tool_versions();
    let text_layer = PopplerTextLayer::default();
    let ocr_engine = OcrMyPdf::default();
    let extractor = Extractor::new(&text_layer, &ocr_engine, config)?;

    let mut sink = match &db_path {
        Some(path) => Some(SqliteSink::open(path)?),
        None => None,
    };

    let outcome = run_batch(
        &extractor,
        &pdf_paths,
        sink.as_mut().map(|sink| sink as &mut dyn RecordSink),
    );

    write_json_pretty(&records_path, &outcome.records)?;
    info!(path = %records_path.display(), records = outcome.records.len(), "wrote records");

    if let Some(sink) = &sink {
        let summary = summarize_store(sink.connection())?;
        info!(
            wells = summary.wells,
            with_well_name = summary.with_well_name,
            with_api_number = summary.with_api_number,
            "store status"
        );
    }

    let status = if outcome.failures.is_empty() {
        "completed"
    } else {
        "completed_with_failures"
    };

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        ocr_mode: args.ocr_mode.as_str().to_string(),
        tool_versions,
        paths: ExtractPaths {
            data_dir: args.data_dir.display().to_string(),
            cache_root: cache_root.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
            records_path: records_path.display().to_string(),
            db_path: db_path.as_ref().map(|path| path.display().to_string()),
        },
        counts: outcome.counts.clone(),
        failures: outcome.failures,
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        processed = outcome.counts.processed_pdf_count,
        failed = outcome.counts.failed_pdf_count,
        ocr_invoked = outcome.counts.ocr_invoked_count,
        "extract completed"
    );

    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    pub records: Vec<Record>,
    pub counts: ExtractCounts,
    pub failures: Vec<DocumentFailure>,
}

/// Extracts every document in order. A document that cannot be read, or whose
/// record cannot be stored, is logged and recorded as a failure; the batch
/// continues with the next one.
pub(crate) fn run_batch(
    extractor: &Extractor<'_>,
    pdf_paths: &[PathBuf],
    mut sink: Option<&mut dyn RecordSink>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        counts: ExtractCounts {
            pdf_count: pdf_paths.len(),
            ..ExtractCounts::default()
        },
        ..BatchOutcome::default()
    };

    for path in pdf_paths {
        let extraction = Document::from_path(path)
            .and_then(|document| extractor.extract_detailed(&document));

        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(err) => {
                record_failure(&mut outcome, path, format!("{err:#}"));
                continue;
            }
        };

        let counts = &mut outcome.counts;
        counts.pages_total += extraction.page_count;
        counts.pages_failed += extraction.failed_pages.len();
        match extraction.escalation {
            Escalation::NativeOnly => counts.native_only_count += 1,
            Escalation::NativeThenOcr => counts.ocr_invoked_count += 1,
        }
        if extraction.ocr_filled.contains(&Field::WellNameAndNumber) {
            counts.ocr_recovered_well_name_count += 1;
        }

        let record = extraction.record;
        info!(
            source_pdf = %record.source_pdf,
            well_name = record.text(Field::WellNameAndNumber).unwrap_or_default(),
            api_number_10 = record.text(Field::ApiNumber10).unwrap_or_default(),
            fields = record.present_count(),
            "extracted record"
        );

        if let Some(sink) = sink.as_deref_mut() {
            if let Err(err) = sink.upsert(&record) {
                record_failure(&mut outcome, path, format!("{err:#}"));
                continue;
            }
            outcome.counts.records_upserted += 1;
        }

        if record.has(Field::WellNameAndNumber) {
            outcome.counts.records_with_well_name += 1;
        }
        if record.has(Field::ApiNumber10) {
            outcome.counts.records_with_api_number += 1;
        }
        outcome.counts.processed_pdf_count += 1;
        outcome.records.push(record);
    }

    outcome
}

fn record_failure(outcome: &mut BatchOutcome, path: &Path, error: String) {
    let source_pdf = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    error!(source_pdf = %source_pdf, error = %error, "document failed; continuing");
    outcome.counts.failed_pdf_count += 1;
    outcome.failures.push(DocumentFailure { source_pdf, error });
}

fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        pdfinfo: command_version_optional("pdfinfo", &["-v"]),
        pdftotext: command_version_optional("pdftotext", &["-v"]),
        ocrmypdf: command_version_optional(OCRMYPDF, &["--version"]),
    }
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "wellfile".to_string(),
        "extract".to_string(),
        "--data-dir".to_string(),
        args.data_dir.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    for file in &args.files {
        command.push("--file".to_string());
        command.push(file.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.records_path {
        command.push("--records-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.run_manifest_path {
        command.push("--run-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.no_store {
        command.push("--no-store".to_string());
    }
    command.push("--ocr-mode".to_string());
    command.push(args.ocr_mode.as_str().to_string());
    if args.ocr_mode != OcrMode::Off {
        command.push("--ocr-lang".to_string());
        command.push(args.ocr_lang.clone());
        command.push("--ocr-oversample".to_string());
        command.push(args.ocr_oversample.to_string());
        command.push("--ocr-timeout-secs".to_string());
        command.push(args.ocr_timeout_secs.to_string());
    }

    command.join(" ")
}

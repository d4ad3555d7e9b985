use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, warn};

use super::types::Document;

/// Access to a document's embedded text layer, one page at a time.
pub(crate) trait TextLayer {
    /// Fails only when the document cannot be opened at all.
    fn page_count(&self, path: &Path) -> Result<usize>;

    /// `page_number` is 1-based.
    fn page_text(&self, path: &Path, page_number: usize) -> Result<String>;
}

/// Poppler's `pdfinfo` and `pdftotext`.
#[derive(Debug, Clone)]
pub(crate) struct PopplerTextLayer {
    pdfinfo: String,
    pdftotext: String,
}

impl Default for PopplerTextLayer {
    fn default() -> Self {
        Self {
            pdfinfo: "pdfinfo".to_string(),
            pdftotext: "pdftotext".to_string(),
        }
    }
}

impl TextLayer for PopplerTextLayer {
    fn page_count(&self, path: &Path) -> Result<usize> {
        let output = Command::new(&self.pdfinfo)
            .arg(path)
            .output()
            .with_context(|| format!("failed to execute pdfinfo for {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdfinfo returned non-zero exit status for {}: {}",
                path.display(),
                stderr.trim()
            );
        }

        parse_pdfinfo_page_count(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("pdfinfo reported no page count for {}", path.display()))
    }

    fn page_text(&self, path: &Path, page_number: usize) -> Result<String> {
        let output = Command::new(&self.pdftotext)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg(path)
            .arg("-")
            .output()
            .with_context(|| format!("failed to execute pdftotext for {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {} page {}: {}",
                path.display(),
                page_number,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .replace(&['\u{0000}', '\u{000C}'][..], ""))
    }
}

pub(crate) fn parse_pdfinfo_page_count(stdout: &str) -> Result<usize> {
    let pattern =
        Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").context("failed to compile pdfinfo pages regex")?;

    let captures = pattern
        .captures(stdout)
        .context("missing 'Pages:' line in pdfinfo output")?;

    captures
        .get(1)
        .map(|m| m.as_str())
        .context("missing page count capture")?
        .parse::<usize>()
        .context("invalid page count in pdfinfo output")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NativeText {
    /// Non-empty pages in page order, joined by newlines.
    pub text: String,
    pub page_count: usize,
    pub failed_pages: Vec<usize>,
}

pub(crate) fn extract_native_text(
    layer: &dyn TextLayer,
    document: &Document,
) -> Result<NativeText> {
    let page_count = layer
        .page_count(&document.path)
        .with_context(|| format!("failed to open {}", document.source_pdf))?;

    let mut chunks = Vec::with_capacity(page_count);
    let mut failed_pages = Vec::new();

    for page_number in 1..=page_count {
        let page_text = match layer.page_text(&document.path, page_number) {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    source_pdf = %document.source_pdf,
                    page = page_number,
                    error = %error,
                    "native text extraction failed for page"
                );
                failed_pages.push(page_number);
                String::new()
            }
        };

        if !page_text.trim().is_empty() {
            chunks.push(page_text);
        }
    }

    debug!(
        source_pdf = %document.source_pdf,
        page_count,
        text_pages = chunks.len(),
        failed_pages = failed_pages.len(),
        "native text extracted"
    );

    Ok(NativeText {
        text: chunks.join("\n"),
        page_count,
        failed_pages,
    })
}

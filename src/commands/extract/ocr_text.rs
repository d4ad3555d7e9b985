use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use super::types::{Document, OcrSettings};

pub(crate) const OCRMYPDF: &str = "ocrmypdf";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LOG_TAIL_CHARS: usize = 400;

/// Locations inside a per-invocation scratch directory.
#[derive(Debug, Clone)]
pub(crate) struct OcrRequest<'a> {
    pub input: &'a Path,
    pub output_pdf: PathBuf,
    pub sidecar: PathBuf,
    pub log: PathBuf,
    pub settings: &'a OcrSettings,
}

impl<'a> OcrRequest<'a> {
    fn new(input: &'a Path, workspace: &Path, settings: &'a OcrSettings) -> Self {
        Self {
            input,
            output_pdf: workspace.join("ocr.pdf"),
            sidecar: workspace.join("sidecar.txt"),
            log: workspace.join("ocr.log"),
            settings,
        }
    }
}

/// An external recognizer that writes recognized text to `request.sidecar`.
pub(crate) trait OcrEngine {
    fn recognize(&self, request: &OcrRequest<'_>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub(crate) struct OcrMyPdf {
    program: String,
}

impl Default for OcrMyPdf {
    fn default() -> Self {
        Self {
            program: OCRMYPDF.to_string(),
        }
    }
}

impl OcrMyPdf {
    pub(crate) fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OcrEngine for OcrMyPdf {
    fn recognize(&self, request: &OcrRequest<'_>) -> Result<()> {
        let log = File::create(&request.log)
            .with_context(|| format!("failed to create {}", request.log.display()))?;
        let log_stderr = log
            .try_clone()
            .with_context(|| format!("failed to share {}", request.log.display()))?;

        let mut child = Command::new(&self.program)
            .arg("--skip-text")
            .arg("--output-type")
            .arg("pdf")
            .arg("--oversample")
            .arg(request.settings.oversample_dpi.to_string())
            .arg("-l")
            .arg(&request.settings.language)
            .arg("--sidecar")
            .arg(&request.sidecar)
            .arg(request.input)
            .arg(&request.output_pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_stderr))
            .spawn()
            .with_context(|| {
                format!(
                    "failed to execute {} for {}",
                    self.program,
                    request.input.display()
                )
            })?;

        let Some(status) = wait_with_timeout(&mut child, request.settings.timeout)? else {
            bail!(
                "{} timed out after {}s for {}",
                self.program,
                request.settings.timeout.as_secs(),
                request.input.display()
            );
        };

        if !status.success() {
            bail!(
                "{} returned {} for {}: {}",
                self.program,
                status,
                request.input.display(),
                log_tail(&request.log)
            );
        }

        Ok(())
    }
}

/// Waits for `child`, killing it once `timeout` elapses. `None` means it was killed.
pub(crate) fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait().context("failed to poll OCR process")? {
            return Ok(Some(status));
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn log_tail(path: &Path) -> String {
    let raw = fs::read_to_string(path).unwrap_or_default();
    let trimmed = raw.trim();
    let skip = trimmed.chars().count().saturating_sub(LOG_TAIL_CHARS);
    trimmed.chars().skip(skip).collect()
}

/// Runs OCR for `document` and returns its sidecar text.
///
/// Every failure (scratch directory, engine, missing or unreadable sidecar)
/// is logged and yields an empty string. The scratch directory is removed
/// before returning on all paths.
pub(crate) fn extract_ocr_text(
    engine: &dyn OcrEngine,
    document: &Document,
    settings: &OcrSettings,
) -> String {
    let workspace = match tempfile::Builder::new().prefix("wellfile_ocr_").tempdir() {
        Ok(workspace) => workspace,
        Err(error) => {
            warn!(
                source_pdf = %document.source_pdf,
                error = %error,
                "failed to create OCR scratch directory"
            );
            return String::new();
        }
    };

    let harvested = recognize_in(engine, document, workspace.path(), settings);

    let workspace_path = workspace.path().to_path_buf();
    if let Err(error) = workspace.close() {
        warn!(
            path = %workspace_path.display(),
            error = %error,
            "failed to remove OCR scratch directory"
        );
    }

    match harvested {
        Ok(text) => {
            debug!(
                source_pdf = %document.source_pdf,
                chars = text.len(),
                "harvested OCR sidecar"
            );
            text
        }
        Err(error) => {
            warn!(
                source_pdf = %document.source_pdf,
                error = %format!("{error:#}"),
                "OCR fallback produced no text"
            );
            String::new()
        }
    }
}

fn recognize_in(
    engine: &dyn OcrEngine,
    document: &Document,
    workspace: &Path,
    settings: &OcrSettings,
) -> Result<String> {
    let request = OcrRequest::new(&document.path, workspace, settings);
    engine.recognize(&request)?;

    match fs::read(&request.sidecar) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).replace('\u{0000}', "")),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            bail!("OCR engine wrote no sidecar for {}", document.source_pdf)
        }
        Err(error) => Err(error)
            .with_context(|| format!("failed to read {}", request.sidecar.display())),
    }
}

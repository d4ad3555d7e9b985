use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::{ExtractArgs, OcrMode};

/// A source filing on disk, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Document {
    pub source_pdf: String,
    pub path: PathBuf,
}

impl Document {
    pub(crate) fn from_path(path: &Path) -> Result<Self> {
        let source_pdf = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        Ok(Self {
            source_pdf,
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OcrSettings {
    pub language: String,
    pub oversample_dpi: u32,
    pub timeout: Duration,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            oversample_dpi: 300,
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractionConfig {
    pub ocr_mode: OcrMode,
    pub ocr: OcrSettings,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::Auto,
            ocr: OcrSettings::default(),
        }
    }
}

impl ExtractionConfig {
    pub(crate) fn from_args(args: &ExtractArgs) -> Self {
        Self {
            ocr_mode: args.ocr_mode,
            ocr: OcrSettings {
                language: args.ocr_lang.clone(),
                oversample_dpi: args.ocr_oversample,
                timeout: Duration::from_secs(args.ocr_timeout_secs),
            },
        }
    }
}

pub(crate) fn non_whitespace_char_count(text: &str) -> usize {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .count()
}

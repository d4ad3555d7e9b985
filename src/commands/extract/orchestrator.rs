use anyhow::Result;
use tracing::{debug, info};

use crate::cli::OcrMode;
use crate::model::{Field, Provenance, Record};

use super::field_rules::{FieldRules, normalize_text};
use super::native_text::{TextLayer, extract_native_text};
use super::ocr_text::{OcrEngine, extract_ocr_text};
use super::types::{Document, ExtractionConfig, non_whitespace_char_count};

/// Fields re-matched against OCR text, in order.
const OCR_FALLBACK_FIELDS: [Field; 2] = [Field::WellNameAndNumber, Field::ApiNumber10];

/// Tier plan chosen once the native pass has been parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escalation {
    NativeOnly,
    NativeThenOcr,
}

impl Escalation {
    /// OCR runs only when the well name is still missing. A missing API number
    /// alone never escalates.
    ///
    /// Two cases stay native-only even without a well name: `OcrMode::Off`, and
    /// a document with zero pages, which has nothing to recognize.
    pub(crate) fn after_native(record: &Record, page_count: usize, ocr_mode: OcrMode) -> Self {
        if ocr_mode == OcrMode::Off || page_count == 0 || record.has(Field::WellNameAndNumber) {
            Self::NativeOnly
        } else {
            Self::NativeThenOcr
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NativeOnly => "native_only",
            Self::NativeThenOcr => "native_then_ocr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extraction {
    pub record: Record,
    pub escalation: Escalation,
    pub page_count: usize,
    pub failed_pages: Vec<usize>,
    pub ocr_char_count: Option<usize>,
    pub ocr_filled: Vec<Field>,
}

pub(crate) struct Extractor<'a> {
    rules: FieldRules,
    text_layer: &'a dyn TextLayer,
    ocr_engine: &'a dyn OcrEngine,
    config: ExtractionConfig,
}

impl<'a> Extractor<'a> {
    pub(crate) fn new(
        text_layer: &'a dyn TextLayer,
        ocr_engine: &'a dyn OcrEngine,
        config: ExtractionConfig,
    ) -> Result<Self> {
        Ok(Self {
            rules: FieldRules::new()?,
            text_layer,
            ocr_engine,
            config,
        })
    }

    pub(crate) fn extract(&self, document: &Document) -> Result<Record> {
        Ok(self.extract_detailed(document)?.record)
    }

    /// Errors only when the document cannot be opened.
    pub(crate) fn extract_detailed(&self, document: &Document) -> Result<Extraction> {
        let native = extract_native_text(self.text_layer, document)?;
        let native_text = normalize_text(&native.text);

        let mut record = Record::new(&document.source_pdf);
        for (field, value) in self.rules.match_all(&native_text) {
            record.fill(field, value, Provenance::Native);
        }

        let escalation = Escalation::after_native(&record, native.page_count, self.config.ocr_mode);
        debug!(
            source_pdf = %document.source_pdf,
            native_fields = record.present_count(),
            escalation = escalation.as_str(),
            "native tier parsed"
        );

        let mut ocr_char_count = None;
        let mut ocr_filled = Vec::new();

        if escalation == Escalation::NativeThenOcr {
            let ocr_text = normalize_text(&extract_ocr_text(
                self.ocr_engine,
                document,
                &self.config.ocr,
            ));
            ocr_char_count = Some(non_whitespace_char_count(&ocr_text));

            for field in OCR_FALLBACK_FIELDS {
                if record.has(field) {
                    continue;
                }
                if let Some(value) = self.rules.match_field(field, &ocr_text) {
                    if record.fill(field, value, Provenance::Ocr) {
                        ocr_filled.push(field);
                    }
                }
            }

            info!(
                source_pdf = %document.source_pdf,
                ocr_chars = ocr_char_count.unwrap_or_default(),
                recovered = ocr_filled.len(),
                "OCR tier finished"
            );
        }

        Ok(Extraction {
            record,
            escalation,
            page_count: native.page_count,
            failed_pages: native.failed_pages,
            ocr_char_count,
            ocr_filled,
        })
    }
}

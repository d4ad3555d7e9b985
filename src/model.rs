use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfEntry {
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub pdf_count: usize,
    pub pdfs: Vec<PdfEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub pdfinfo: Option<String>,
    pub pdftotext: Option<String>,
    pub ocrmypdf: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub data_dir: String,
    pub cache_root: String,
    pub manifest_path: String,
    pub records_path: String,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub pdf_count: usize,
    pub processed_pdf_count: usize,
    pub failed_pdf_count: usize,
    pub native_only_count: usize,
    pub ocr_invoked_count: usize,
    pub ocr_recovered_well_name_count: usize,
    pub records_with_well_name: usize,
    pub records_with_api_number: usize,
    pub records_upserted: usize,
    pub pages_total: usize,
    pub pages_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub source_pdf: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub ocr_mode: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub counts: ExtractCounts,
    pub failures: Vec<DocumentFailure>,
    pub warnings: Vec<String>,
}

/// Fields harvested from a well-completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    WellNameAndNumber,
    #[serde(rename = "api_number_10")]
    ApiNumber10,
    Operator,
    CountyState,
    FieldName,
    CompletionDate,
    DateStimulated,
    StimulatedFormation,
    TopFt,
    BottomFt,
    StimulationStages,
    Volume,
    VolumeUnits,
    TypeTreatment,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::WellNameAndNumber,
        Field::ApiNumber10,
        Field::Operator,
        Field::CountyState,
        Field::FieldName,
        Field::CompletionDate,
        Field::DateStimulated,
        Field::StimulatedFormation,
        Field::TopFt,
        Field::BottomFt,
        Field::StimulationStages,
        Field::Volume,
        Field::VolumeUnits,
        Field::TypeTreatment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WellNameAndNumber => "well_name_and_number",
            Self::ApiNumber10 => "api_number_10",
            Self::Operator => "operator",
            Self::CountyState => "county_state",
            Self::FieldName => "field_name",
            Self::CompletionDate => "completion_date",
            Self::DateStimulated => "date_stimulated",
            Self::StimulatedFormation => "stimulated_formation",
            Self::TopFt => "top_ft",
            Self::BottomFt => "bottom_ft",
            Self::StimulationStages => "stimulation_stages",
            Self::Volume => "volume",
            Self::VolumeUnits => "volume_units",
            Self::TypeTreatment => "type_treatment",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::TopFt | Self::BottomFt | Self::StimulationStages | Self::Volume
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Native,
    Ocr,
    Absent,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Ocr => "ocr",
            Self::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: Option<FieldValue>,
    pub provenance: Provenance,
}

impl ExtractedField {
    pub fn absent() -> Self {
        Self {
            value: None,
            provenance: Provenance::Absent,
        }
    }
}

/// Merged field set for one source document.
///
/// Every [`Field`] is always present in `fields`; a missing value is an
/// `Absent` entry rather than a missing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub source_pdf: String,
    pub fields: BTreeMap<Field, ExtractedField>,
}

impl Record {
    pub fn new(source_pdf: impl Into<String>) -> Self {
        Self {
            source_pdf: source_pdf.into(),
            fields: Field::ALL
                .iter()
                .map(|field| (*field, ExtractedField::absent()))
                .collect(),
        }
    }

    pub fn value(&self, field: Field) -> Option<&FieldValue> {
        self.fields
            .get(&field)
            .and_then(|entry| entry.value.as_ref())
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.value(field).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, field: Field) -> Option<i64> {
        self.value(field).and_then(FieldValue::as_integer)
    }

    pub fn provenance(&self, field: Field) -> Provenance {
        self.fields
            .get(&field)
            .map(|entry| entry.provenance)
            .unwrap_or(Provenance::Absent)
    }

    pub fn has(&self, field: Field) -> bool {
        self.value(field).is_some()
    }

    /// Sets `field` only while it is still absent. Returns whether the value was taken.
    pub fn fill(&mut self, field: Field, value: FieldValue, provenance: Provenance) -> bool {
        let entry = self
            .fields
            .entry(field)
            .or_insert_with(ExtractedField::absent);
        if entry.value.is_some() {
            return false;
        }

        entry.value = Some(value);
        entry.provenance = provenance;
        true
    }

    pub fn present_count(&self) -> usize {
        self.fields
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }
}

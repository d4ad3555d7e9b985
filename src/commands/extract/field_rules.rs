use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{Field, FieldValue};

const DATE: &str = r"\d{1,2}/\d{1,2}/\d{2,4}";

/// Label-anchored extraction rules over normalized page text.
///
/// Every rule is a pure function of the text; the first match wins.
pub(crate) struct FieldRules {
    well_name: Regex,
    api_number: Regex,
    operator: Regex,
    county_state: Regex,
    field_name: Regex,
    completion_date: Regex,
    date_stimulated: Regex,
    stimulation_anchor: Regex,
    row_date: Regex,
    row_formation: Regex,
    row_values: Regex,
    volume: Regex,
    volume_units: Regex,
    type_treatment: Regex,
    treatment_header: Regex,
    leading_words: Regex,
}

/// Capture groups of `row_values`.
#[derive(Debug, Clone, Copy)]
enum RowColumn {
    Top = 1,
    Bottom = 2,
    Stages = 3,
    Volume = 4,
    VolumeUnits = 5,
}

impl FieldRules {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            well_name: Regex::new(&labeled(r"Well\s+Name\s+and\s+Number"))
                .context("failed to compile well name regex")?,
            api_number: Regex::new(
                r"(?i)\bAPI(?:[ \t]*(?:NUMBER|NO\.?|#))?[ \t]*[:#.]?\s*(\d{2}[ \t-]*\d{3}[ \t-]*\d{5})\b",
            )
            .context("failed to compile API number regex")?,
            operator: Regex::new(&labeled("OPERATOR")).context("failed to compile operator regex")?,
            county_state: Regex::new(&labeled(r"COUNTY\s*[/,]\s*STATE"))
                .context("failed to compile county/state regex")?,
            field_name: Regex::new(r"(?im)^FIELD\b[ \t]*[:#]?[ \t]*\n?[ \t]*([^\n]+)")
                .context("failed to compile field name regex")?,
            completion_date: Regex::new(&format!(
                r"(?i)Date\s+Well\s+Completed[^\n]*?(?:\n[^\n]*?)?({DATE})"
            ))
            .context("failed to compile completion date regex")?,
            date_stimulated: Regex::new(&format!(r"(?i)Date\s+Stimulated[ \t]*:?[ \t]*({DATE})"))
                .context("failed to compile date stimulated regex")?,
            stimulation_anchor: Regex::new(r"(?i)Date\s+Stimulated")
                .context("failed to compile stimulation anchor regex")?,
            row_date: Regex::new(&format!(r"(?:^|[ \t])({DATE})\b"))
                .context("failed to compile stimulation row date regex")?,
            row_formation: Regex::new(r"\b([A-Za-z]+(?:[ \t]+[A-Za-z]+)*)[ \t]+\d{4,5}\b")
                .context("failed to compile stimulated formation regex")?,
            row_values: Regex::new(
                r"(?:^|[ \t])(\d{4,5})[ \t]+(\d{4,5})(?:[ \t]+(\d+)(?:[ \t]+(\d[\d,]*)(?:[ \t]+([A-Za-z]+))?)?)?\b",
            )
            .context("failed to compile stimulation row regex")?,
            volume: Regex::new(r"(?i)\bVolume\b[ \t]*:?[ \t]*(\d[\d,]*)")
                .context("failed to compile volume regex")?,
            volume_units: Regex::new(r"(?i)\bVolume\s+Units\b[ \t]*:?[ \t]*([A-Za-z]+)")
                .context("failed to compile volume units regex")?,
            type_treatment: Regex::new(
                r"(?i)\bType\s+Treatment\b[ \t]*:?[ \t]*([^\n]*)(?:\n([^\n]*))?",
            )
            .context("failed to compile type treatment regex")?,
            treatment_header: Regex::new(
                r"(?i)\bAcid\s*%|\bLbs\s+Proppant\b|\bMaximum\s+Treatment\b",
            )
            .context("failed to compile treatment header regex")?,
            leading_words: Regex::new(r"^[ \t]*([A-Za-z]+(?:[ \t]+[A-Za-z]+)*)")
                .context("failed to compile leading words regex")?,
        })
    }

    /// Every field the text yields, in [`Field::ALL`] order.
    pub(crate) fn match_all(&self, text: &str) -> Vec<(Field, FieldValue)> {
        Field::ALL
            .iter()
            .filter_map(|field| self.match_field(*field, text).map(|value| (*field, value)))
            .collect()
    }

    pub(crate) fn match_field(&self, field: Field, text: &str) -> Option<FieldValue> {
        match field {
            Field::WellNameAndNumber => self.well_name_and_number(text).map(FieldValue::Text),
            Field::ApiNumber10 => self.api_number_10(text).map(FieldValue::Text),
            Field::Operator => first_capture(&self.operator, text).map(FieldValue::Text),
            Field::CountyState => first_capture(&self.county_state, text).map(FieldValue::Text),
            Field::FieldName => first_capture(&self.field_name, text).map(FieldValue::Text),
            Field::CompletionDate => {
                first_capture(&self.completion_date, text).map(FieldValue::Text)
            }
            Field::DateStimulated => self.date_stimulated(text).map(FieldValue::Text),
            Field::StimulatedFormation => self
                .stimulation_row(text)
                .and_then(|row| first_capture(&self.row_formation, row))
                .map(FieldValue::Text),
            Field::TopFt => self.row_integer(text, RowColumn::Top),
            Field::BottomFt => self.row_integer(text, RowColumn::Bottom),
            Field::StimulationStages => self.row_integer(text, RowColumn::Stages),
            Field::Volume => first_capture(&self.volume, text)
                .and_then(|value| parse_integer(&value))
                .or_else(|| {
                    self.row_column(text, RowColumn::Volume)
                        .and_then(|value| parse_integer(&value))
                })
                .map(FieldValue::Integer),
            Field::VolumeUnits => first_capture(&self.volume_units, text)
                .or_else(|| self.row_column(text, RowColumn::VolumeUnits))
                .map(FieldValue::Text),
            Field::TypeTreatment => self.type_treatment(text).map(FieldValue::Text),
        }
    }

    /// Rest of the labeled line, with inner whitespace collapsed.
    pub(crate) fn well_name_and_number(&self, text: &str) -> Option<String> {
        first_capture(&self.well_name, text)
            .and_then(|value| non_empty(collapse_whitespace(&value)))
    }

    /// Ten digits adjacent to an `API` label, separators stripped.
    ///
    /// Numbers without the label (phone numbers, depths, permit numbers) are
    /// never considered.
    pub(crate) fn api_number_10(&self, text: &str) -> Option<String> {
        let raw = first_capture(&self.api_number, text)?;
        let digits = raw
            .chars()
            .filter(|character| character.is_ascii_digit())
            .collect::<String>();

        if digits.len() == 10 { Some(digits) } else { None }
    }

    /// Words after the `Type Treatment` label. When the label ends its line or
    /// sits in a header row (`Acid %`, `Lbs Proppant`, ...), the value is the
    /// leading words of the following row.
    fn type_treatment(&self, text: &str) -> Option<String> {
        let captures = self.type_treatment.captures(text)?;
        let same_line = captures.get(1).map_or("", |value| value.as_str()).trim();
        let next_line = captures.get(2).map_or("", |value| value.as_str());

        let row = if same_line.is_empty() || self.treatment_header.is_match(same_line) {
            next_line
        } else {
            same_line
        };
        first_capture(&self.leading_words, row)
    }

    fn date_stimulated(&self, text: &str) -> Option<String> {
        first_capture(&self.date_stimulated, text).or_else(|| {
            self.stimulation_row(text)
                .and_then(|row| first_capture(&self.row_date, row))
        })
    }

    /// The row of values belonging to the `Date Stimulated` label.
    ///
    /// That is the remainder of the label's line when it already carries a
    /// depth pair, otherwise the following line.
    fn stimulation_row<'t>(&self, text: &'t str) -> Option<&'t str> {
        let anchor = self.stimulation_anchor.find(text)?;
        let rest = &text[anchor.end()..];

        let Some((same_line, following)) = rest.split_once('\n') else {
            return Some(rest);
        };

        if self.row_values.is_match(same_line) {
            return Some(same_line);
        }

        Some(following.lines().next().unwrap_or_default())
    }

    fn row_column(&self, text: &str, column: RowColumn) -> Option<String> {
        let row = self.stimulation_row(text)?;
        let captures = self.row_values.captures(row)?;
        captures
            .get(column as usize)
            .map(|value| value.as_str().trim().to_string())
            .and_then(non_empty)
    }

    fn row_integer(&self, text: &str, column: RowColumn) -> Option<FieldValue> {
        self.row_column(text, column)
            .and_then(|value| parse_integer(&value))
            .map(FieldValue::Integer)
    }
}

/// Label followed by its value on the same line, or on the next line when the
/// label ends its line.
fn labeled(label: &str) -> String {
    format!(r"(?i)\b{label}\b[ \t]*[:#]?[ \t]*\n?[ \t]*([^\n]+)")
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim().to_string())
        .and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn parse_integer(value: &str) -> Option<i64> {
    value.replace(',', "").trim().parse::<i64>().ok()
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Collapses horizontal whitespace and drops blank lines, keeping line breaks.
pub(crate) fn normalize_text(raw: &str) -> String {
    raw.replace('\u{0000}', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<String>>()
        .join("\n")
}

use log::{debug, warn};

use crate::error::PipelineError;
use crate::frame::RawBatch;
use crate::schema::{FeatureSchema, SlotKind};

/// A raw row that survived cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    /// Position of the row in the raw batch
    pub row: usize,
    /// Numeric features in schema order; all finite and non-zero
    pub features: Vec<f64>,
    /// Key column values in schema order; all non-empty
    pub keys: Vec<String>,
    /// Columns the schema does not claim, in raw header order
    pub extras: Vec<String>,
}

/// The normalizer's output: named columns plus surviving records.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanBatch {
    feature_names: Vec<String>,
    key_names: Vec<String>,
    extra_names: Vec<String>,
    records: Vec<CleanRecord>,
    raw_rows: usize,
}

impl CleanBatch {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    pub fn extra_names(&self) -> &[String] {
        &self.extra_names
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CleanRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in the raw batch this was cleaned from
    pub fn raw_rows(&self) -> usize {
        self.raw_rows
    }

    /// Rows removed for missing or sentinel values
    pub fn dropped(&self) -> usize {
        self.raw_rows - self.records.len()
    }

    pub fn feature(&self, record: usize, name: &str) -> Option<f64> {
        let column = self.feature_names.iter().position(|n| n == name)?;
        self.records.get(record).map(|r| r.features[column])
    }
}

/// Parses a decimal written with either `.` or `,` as separator.
///
/// Returns `None` for unparsable or non-finite input.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Numeric coercion with the zero sentinel applied: a reading of exactly
/// zero means the sensor or the data entry failed.
pub fn coerce_feature(raw: &str) -> Option<f64> {
    parse_decimal(raw).filter(|v| *v != 0.0)
}

/// Where a raw column goes after renaming.
#[derive(Debug, Clone, Copy)]
enum Target {
    Feature(usize),
    Key(usize),
    Extra(usize),
}

/// Renames, coerces and filters a raw batch against `schema`.
///
/// Rows with any missing, unparsable or zero feature, or an empty key, are
/// dropped. An empty input yields an empty batch rather than an error.
pub fn normalize(raw: &RawBatch, schema: &FeatureSchema) -> Result<CleanBatch, PipelineError> {
    let feature_names = schema.feature_names();
    let key_names = schema.key_names();

    if raw.is_empty() {
        debug!("Raw batch is empty, nothing to normalize");
        return Ok(CleanBatch {
            feature_names,
            key_names,
            extra_names: Vec::new(),
            records: Vec::new(),
            raw_rows: 0,
        });
    }

    let targets = map_columns(raw, schema, &feature_names, &key_names)?;
    let extra_names: Vec<String> = raw
        .headers()
        .iter()
        .zip(&targets)
        .filter(|(_, t)| matches!(t, Target::Extra(_)))
        .map(|(h, _)| h.trim().to_string())
        .collect();

    let mut records = Vec::with_capacity(raw.len());
    for (row_idx, row) in raw.rows().iter().enumerate() {
        let mut features: Vec<Option<f64>> = vec![None; feature_names.len()];
        let mut keys: Vec<Option<String>> = vec![None; key_names.len()];
        let mut extras = vec![String::new(); extra_names.len()];

        for (col, target) in targets.iter().enumerate() {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            match *target {
                Target::Feature(i) => features[i] = coerce_feature(cell),
                Target::Key(i) => {
                    let value = cell.trim();
                    if !value.is_empty() {
                        keys[i] = Some(value.to_string());
                    }
                }
                Target::Extra(i) => extras[i] = cell.to_string(),
            }
        }

        let features: Option<Vec<f64>> = features.into_iter().collect();
        let keys: Option<Vec<String>> = keys.into_iter().collect();
        match (features, keys) {
            (Some(features), Some(keys)) => records.push(CleanRecord {
                row: row_idx,
                features,
                keys,
                extras,
            }),
            _ => debug!("Dropping row {}: missing or sentinel value", row_idx),
        }
    }

    let dropped = raw.len() - records.len();
    if dropped > 0 {
        debug!("Normalized {} of {} rows ({} dropped)", records.len(), raw.len(), dropped);
    }

    Ok(CleanBatch {
        feature_names,
        key_names,
        extra_names,
        records,
        raw_rows: raw.len(),
    })
}

fn map_columns(
    raw: &RawBatch,
    schema: &FeatureSchema,
    feature_names: &[String],
    key_names: &[String],
) -> Result<Vec<Target>, PipelineError> {
    let slots = schema.slots();
    let mut claimed = vec![false; slots.len()];
    let mut extra_count = 0;
    let mut targets = Vec::with_capacity(raw.headers().len());

    for header in raw.headers() {
        let slot = schema.slot_for_header(header).filter(|&idx| {
            if claimed[idx] {
                warn!(
                    "Column '{}' maps to '{}' which is already claimed; keeping it as a plain column",
                    header.trim(),
                    slots[idx].name
                );
                false
            } else {
                true
            }
        });

        let target = match slot {
            Some(idx) => {
                claimed[idx] = true;
                let name = &slots[idx].name;
                match slots[idx].kind {
                    SlotKind::Numeric => Target::Feature(position(feature_names, name)),
                    SlotKind::Key => Target::Key(position(key_names, name)),
                }
            }
            None => {
                extra_count += 1;
                Target::Extra(extra_count - 1)
            }
        };
        targets.push(target);
    }

    let missing: Vec<String> = slots
        .iter()
        .zip(&claimed)
        .filter(|(_, found)| !**found)
        .map(|(slot, _)| slot.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::SchemaMismatch { missing });
    }

    Ok(targets)
}

fn position(names: &[String], name: &str) -> usize {
    // Names come from the same schema, so the lookup cannot miss.
    names.iter().position(|n| n == name).unwrap_or_default()
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::artifact::ModelArtifact;
use crate::classifier::ClassifierError;
use crate::error::PipelineError;
use crate::frame::RawBatch;
use crate::labels::{resolve, Label, UNKNOWN_LABEL};
use crate::normalizer::{normalize, CleanRecord};
use crate::scaler::scale;
use crate::schema::FeatureSchema;
use crate::session::SessionContext;

/// Rows shown by the dashboard table
pub const DEFAULT_TAIL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Processing,
}

/// A cleaned record with the label the classifier gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub record: CleanRecord,
    pub label: Label,
}

/// Everything one cycle produced, in raw row order.
#[derive(Debug)]
pub struct CycleReport {
    feature_names: Vec<String>,
    key_names: Vec<String>,
    extra_names: Vec<String>,
    label_order: Vec<String>,
    records: Vec<LabeledRecord>,
    raw_rows: usize,
    warnings: Vec<PipelineError>,
}

impl CycleReport {
    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent reading, i.e. the last surviving row.
    pub fn latest(&self) -> Option<&LabeledRecord> {
        self.records.last()
    }

    /// The last `n` records, oldest first.
    pub fn tail(&self, n: usize) -> &[LabeledRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Count per label for labels that occur, in label-map order with
    /// `Unknown` last.
    pub fn distribution(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for labeled in &self.records {
            *counts.entry(labeled.label.name()).or_default() += 1;
        }

        let mut ordered: Vec<(String, usize)> = self
            .label_order
            .iter()
            .filter_map(|name| counts.get(name.as_str()).map(|&n| (name.clone(), n)))
            .collect();
        if let Some(&n) = counts.get(UNKNOWN_LABEL) {
            ordered.push((UNKNOWN_LABEL.to_string(), n));
        }
        ordered
    }

    /// Records grouped by the value of a key column, or `None` when the
    /// schema has no such key.
    pub fn group_by_key(&self, key: &str) -> Option<BTreeMap<&str, Vec<&LabeledRecord>>> {
        let column = self.key_names.iter().position(|k| k == key)?;
        let mut groups: BTreeMap<&str, Vec<&LabeledRecord>> = BTreeMap::new();
        for labeled in &self.records {
            groups
                .entry(labeled.record.keys[column].as_str())
                .or_default()
                .push(labeled);
        }
        Some(groups)
    }

    /// Rows the normalizer removed
    pub fn dropped(&self) -> usize {
        self.raw_rows - self.records.len()
    }

    pub fn raw_rows(&self) -> usize {
        self.raw_rows
    }

    /// Per-row problems that did not abort the cycle
    pub fn warnings(&self) -> &[PipelineError] {
        &self.warnings
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    pub fn extra_names(&self) -> &[String] {
        &self.extra_names
    }

    /// Data column headers: features, then keys, then pass-through columns.
    pub fn columns(&self) -> Vec<String> {
        self.feature_names
            .iter()
            .chain(&self.key_names)
            .chain(&self.extra_names)
            .cloned()
            .collect()
    }

    /// Cell values of a record in [`CycleReport::columns`] order.
    pub fn row_values(&self, labeled: &LabeledRecord) -> Vec<String> {
        let record = &labeled.record;
        record
            .features
            .iter()
            .map(|v| v.to_string())
            .chain(record.keys.iter().cloned())
            .chain(record.extras.iter().cloned())
            .collect()
    }

    pub fn feature(&self, labeled: &LabeledRecord, name: &str) -> Option<f64> {
        let column = self.feature_names.iter().position(|n| n == name)?;
        labeled.record.features.get(column).copied()
    }
}

/// Releases the in-flight flag on every exit path.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PipelineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::CycleInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Normalize, scale, classify and resolve, one batch at a time.
///
/// A pipeline is built once at startup against a loaded artifact and then
/// shared; [`Pipeline::run_cycle`] takes `&self` and refuses to overlap.
#[derive(Debug)]
pub struct Pipeline {
    schema: FeatureSchema,
    artifact: Arc<ModelArtifact>,
    busy: AtomicBool,
}

impl Pipeline {
    /// Fails with a fatal error when the schema's features are not exactly
    /// the ones the artifact's scaler was fit with.
    pub fn new(schema: FeatureSchema, artifact: Arc<ModelArtifact>) -> Result<Self, PipelineError> {
        schema.validate()?;
        artifact.check_schema(&schema)?;
        info!(
            "Pipeline ready: schema '{}' with artifact '{}' v{}",
            schema.name,
            artifact.name(),
            artifact.version()
        );
        Ok(Self {
            schema,
            artifact,
            busy: AtomicBool::new(false),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn artifact(&self) -> &Arc<ModelArtifact> {
        &self.artifact
    }

    pub fn state(&self) -> PipelineState {
        if self.busy.load(Ordering::Acquire) {
            PipelineState::Processing
        } else {
            PipelineState::Idle
        }
    }

    /// Runs one full cycle. Any error discards the cycle; nothing partial
    /// is returned.
    pub fn run_cycle(&self, raw: &RawBatch) -> Result<CycleReport, PipelineError> {
        let _guard = CycleGuard::acquire(&self.busy)?;
        debug!("Cycle started with {} raw rows", raw.len());

        let clean = normalize(raw, &self.schema)?;
        if clean.is_empty() {
            info!("No usable rows in batch of {}", raw.len());
            return Err(PipelineError::EmptyBatch);
        }

        let matrix = scale(&clean, self.artifact.scaler())?;
        let indices = self.artifact.classifier().predict(matrix.view())?;
        if indices.len() != clean.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Classifier returned {} labels for {} rows",
                indices.len(),
                clean.len()
            ))
            .into());
        }

        let labels = resolve(&indices, self.artifact.labels());

        let feature_names = clean.feature_names().to_vec();
        let key_names = clean.key_names().to_vec();
        let extra_names = clean.extra_names().to_vec();
        let raw_rows = clean.raw_rows();
        let records: Vec<LabeledRecord> = clean
            .into_records()
            .into_iter()
            .zip(labels)
            .map(|(record, label)| LabeledRecord { record, label })
            .collect();

        // Warnings name the row's position in the raw batch, not in the cleaned one
        let warnings = records
            .iter()
            .filter_map(|labeled| match &labeled.label {
                Label::Unknown { index } => {
                    warn!(
                        "Row {}: class index {} is not in the label map",
                        labeled.record.row, index
                    );
                    Some(PipelineError::UnknownLabelIndex {
                        row: labeled.record.row,
                        index: *index,
                    })
                }
                Label::Known { .. } => None,
            })
            .collect();

        info!(
            "Cycle labelled {} of {} rows ({} dropped)",
            records.len(),
            raw_rows,
            raw_rows - records.len()
        );

        Ok(CycleReport {
            feature_names,
            key_names,
            extra_names,
            label_order: self.artifact.labels().names().to_vec(),
            records,
            raw_rows,
            warnings,
        })
    }

    /// Classifies the single entry held in a manual-entry session and
    /// stores the outcome there.
    pub fn predict_manual(&self, session: &mut SessionContext) -> Result<LabeledRecord, PipelineError> {
        let outcome = session
            .to_raw_batch(&self.schema)
            .and_then(|raw| self.run_cycle(&raw))
            .and_then(|report| report.records.into_iter().last().ok_or(PipelineError::EmptyBatch));

        match outcome {
            Ok(labeled) => {
                session.record_prediction(labeled.clone());
                Ok(labeled)
            }
            Err(e) => {
                session.record_error(&e);
                Err(e)
            }
        }
    }
}

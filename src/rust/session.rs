use crate::error::PipelineError;
use crate::frame::RawBatch;
use crate::pipeline::LabeledRecord;
use crate::schema::FeatureSchema;

/// Per-user state for manual entry: the form values and the outcome of
/// the last prediction. Owned by the caller and passed to
/// [`crate::pipeline::Pipeline::predict_manual`] explicitly.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    fields: Vec<(String, String)>,
    last_prediction: Option<LabeledRecord>,
    last_error: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a form field. A field set twice keeps the newer value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }

    /// Builds the one-row batch for a manual prediction. Every schema slot
    /// needs a non-blank field, matched by name or alias.
    pub fn to_raw_batch(&self, schema: &FeatureSchema) -> Result<RawBatch, PipelineError> {
        let mut filled = vec![false; schema.slots().len()];
        for (name, value) in &self.fields {
            if value.trim().is_empty() {
                continue;
            }
            if let Some(slot) = schema.slot_for_header(name) {
                filled[slot] = true;
            }
        }

        let missing: Vec<String> = schema
            .slots()
            .iter()
            .zip(&filled)
            .filter(|(_, filled)| !**filled)
            .map(|(slot, _)| slot.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        Ok(RawBatch::single_row(self.fields.iter().cloned()))
    }

    pub fn last_prediction(&self) -> Option<&LabeledRecord> {
        self.last_prediction.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn record_prediction(&mut self, labeled: LabeledRecord) {
        self.last_prediction = Some(labeled);
        self.last_error = None;
    }

    pub(crate) fn record_error(&mut self, error: &PipelineError) {
        self.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VITALS;

    #[test]
    fn test_missing_fields_named() {
        let mut session = SessionContext::new();
        session.set_field("Suhu", "36,5");
        session.set_field("SpO2", "98");
        session.set_field("HeartRate", " ");
        match session.to_raw_batch(&VITALS) {
            Err(PipelineError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec!["HeartRate", "SYS", "DIA"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_complete_form() {
        let mut session = SessionContext::new();
        for (name, value) in [("Temperature", "36.5"), ("SpO2", "98"), ("HeartRate", "90"), ("SYS", "120"), ("DIA", "80")] {
            session.set_field(name, value);
        }
        session.set_field("SpO2", "97");
        assert_eq!(session.field("SpO2"), Some("97"));

        let raw = session.to_raw_batch(&VITALS).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.headers().len(), 5);
        assert_eq!(raw.cell(0, 1), Some("97"));
    }
}

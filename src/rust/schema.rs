use std::collections::HashSet;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// How a slot's raw text is coerced by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// A decimal feature handed to the scaler.
    #[default]
    Numeric,
    /// A required text column (location or grouping key). Never scaled.
    Key,
}

/// One named column the pipeline requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSlot {
    /// Canonical name, also the name the scaler was fit with
    pub name: String,
    #[serde(default)]
    pub kind: SlotKind,
    /// Raw header variants that rename to `name`
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FeatureSlot {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SlotKind::Numeric,
            aliases: Vec::new(),
        }
    }

    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SlotKind::Key,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    fn matches(&self, header: &str) -> bool {
        self.name.eq_ignore_ascii_case(header)
            || self.aliases.iter().any(|alias| alias.trim().eq_ignore_ascii_case(header))
    }
}

/// Ordered set of slots a raw batch must supply.
///
/// Numeric slot order is the insertion order and has to agree with the
/// order the artifact's scaler was fit with; `Pipeline::new` checks that
/// once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub name: String,
    slots: Vec<FeatureSlot>,
}

impl FeatureSchema {
    /// Builds a schema, rejecting empty or duplicate names and aliases
    /// claimed by more than one slot.
    pub fn new(name: impl Into<String>, slots: Vec<FeatureSlot>) -> Result<Self, PipelineError> {
        let schema = Self {
            name: name.into(),
            slots,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Checks the invariants `new` enforces. Needed again after a schema
    /// is deserialized from a file.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.slots.is_empty() {
            return Err(PipelineError::InvalidSchema(format!(
                "Schema '{}' declares no slots",
                self.name
            )));
        }
        if !self.slots.iter().any(|s| s.kind == SlotKind::Numeric) {
            return Err(PipelineError::InvalidSchema(format!(
                "Schema '{}' declares no numeric features",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if slot.name.trim().is_empty() {
                return Err(PipelineError::InvalidSchema("Slot name cannot be empty".into()));
            }
            let names = std::iter::once(&slot.name).chain(slot.aliases.iter());
            for name in names {
                if !seen.insert(name.trim().to_lowercase()) {
                    return Err(PipelineError::InvalidSchema(format!(
                        "Header '{}' is claimed by more than one slot",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    /// Canonical names of the numeric features, in schema order
    pub fn feature_names(&self) -> Vec<String> {
        self.names_of(SlotKind::Numeric)
    }

    /// Canonical names of the key columns, in schema order
    pub fn key_names(&self) -> Vec<String> {
        self.names_of(SlotKind::Key)
    }

    fn names_of(&self, kind: SlotKind) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Finds the slot a raw header renames to.
    ///
    /// The header is trimmed and compared case-insensitively against slot
    /// names and aliases. If nothing matches, a trailing unit annotation is
    /// dropped (`"Suhu (°C)"` becomes `"Suhu"`) and the lookup retried.
    pub fn slot_for_header(&self, header: &str) -> Option<usize> {
        let header = header.trim();
        if header.is_empty() {
            return None;
        }
        self.position(header)
            .or_else(|| strip_unit(header).and_then(|bare| self.position(bare)))
    }

    fn position(&self, header: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(header))
    }
}

/// `"HeartRate (BPM)"` -> `"HeartRate"`, `"SpO2 [%]"` -> `"SpO2"`
fn strip_unit(header: &str) -> Option<&str> {
    let open = match header.chars().last()? {
        ')' => '(',
        ']' => '[',
        _ => return None,
    };
    let start = header.rfind(open)?;
    let bare = header[..start].trim_end();
    if bare.is_empty() {
        None
    } else {
        Some(bare)
    }
}

lazy_static! {
    /// Physiological readings streamed by the IoT sensor sheet.
    pub static ref VITALS: FeatureSchema = FeatureSchema {
        name: "vitals".to_string(),
        slots: vec![
            FeatureSlot::numeric("Temperature")
                .with_aliases(vec!["Suhu", "Suhu Tubuh", "Temp", "Body Temperature"]),
            FeatureSlot::numeric("SpO2")
                .with_aliases(vec!["Saturasi Oksigen", "Oxygen Saturation"]),
            FeatureSlot::numeric("HeartRate")
                .with_aliases(vec!["Heart Rate", "Detak Jantung", "BPM", "Pulse"]),
            FeatureSlot::numeric("SYS").with_aliases(vec!["Systolic", "Sistolik"]),
            FeatureSlot::numeric("DIA").with_aliases(vec!["Diastolic", "Diastolik"]),
        ],
    };

    /// District-level indicators uploaded for dengue (DBD) risk mapping.
    pub static ref DENGUE_RISK: FeatureSchema = FeatureSchema {
        name: "dengue_risk".to_string(),
        slots: vec![
            FeatureSlot::numeric("jumlah_kasus_dbd"),
            FeatureSlot::numeric("curah_hujan"),
            FeatureSlot::numeric("jumlah_tps_liar"),
            FeatureSlot::numeric("suhu_rata_rata"),
            FeatureSlot::numeric("jumlah_fogging"),
            FeatureSlot::numeric("jumlah_genangan_air"),
            FeatureSlot::numeric("kelembaban"),
            FeatureSlot::numeric("pengangguran"),
            FeatureSlot::numeric("tingkat_pendidikan"),
            FeatureSlot::key("kecamatan"),
        ],
    };
}

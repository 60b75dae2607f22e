use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassIndex;
use crate::error::PipelineError;

/// Name carried by rows whose class index has no entry in the label map
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A resolved category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Known { index: usize, name: String },
    Unknown { index: ClassIndex },
}

impl Label {
    pub fn name(&self) -> &str {
        match self {
            Self::Known { name, .. } => name,
            Self::Unknown { .. } => UNKNOWN_LABEL,
        }
    }

    pub fn index(&self) -> ClassIndex {
        match self {
            Self::Known { index, .. } => *index as ClassIndex,
            Self::Unknown { index } => *index,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Class index to label name, in the order the label encoder was fit.
///
/// Built from the model artifact so that the table always matches the
/// classifier that produced the indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn from_classes(classes: Vec<String>) -> Result<Self, PipelineError> {
        if classes.is_empty() {
            return Err(PipelineError::InvalidArtifact("Label map is empty".into()));
        }
        let mut seen = HashSet::new();
        for name in &classes {
            if name.trim().is_empty() {
                return Err(PipelineError::InvalidArtifact("Label names cannot be empty".into()));
            }
            if name == UNKNOWN_LABEL {
                return Err(PipelineError::InvalidArtifact(format!(
                    "'{}' is reserved for unresolved class indices",
                    UNKNOWN_LABEL
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::InvalidArtifact(format!("Duplicate label '{}'", name)));
            }
        }
        Ok(Self { names: classes })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, index: ClassIndex) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Never fails: an index outside the table becomes [`Label::Unknown`].
    pub fn resolve_one(&self, index: ClassIndex) -> Label {
        match self.get(index) {
            Some(name) => Label::Known {
                index: index as usize,
                name: name.to_string(),
            },
            None => Label::Unknown { index },
        }
    }
}

/// Translates classifier output into labels, one per index.
pub fn resolve(indices: &[ClassIndex], labels: &LabelMap) -> Vec<Label> {
    indices
        .iter()
        .map(|&index| labels.resolve_one(index))
        .collect()
}

/// Optional localisation of canonical label names, used only when
/// rendering. Stored and exported values always keep the canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayNames(HashMap<String, String>);

impl DisplayNames {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self(names)
    }

    pub fn display<'a>(&'a self, label: &'a Label) -> &'a str {
        self.display_name(label.name())
    }

    /// Exact match first, then the lowercased name, since config sources
    /// may fold key case.
    pub fn display_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.0
            .get(canonical)
            .or_else(|| self.0.get(&canonical.to_lowercase()))
            .map(String::as_str)
            .unwrap_or(canonical)
    }
}

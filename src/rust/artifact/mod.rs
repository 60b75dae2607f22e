//! Versioned model artifacts: manifest format, loading, and the local cache.

mod bundle;
mod manager;

pub use bundle::{ArtifactManifest, ModelArtifact};
pub use manager::{ArtifactError, ArtifactManager, ArtifactSource};

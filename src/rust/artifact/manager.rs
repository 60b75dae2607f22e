use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::bundle::{ArtifactManifest, ModelArtifact};
use crate::classifier::ClassifierError;
use crate::error::PipelineError;
use crate::runtime::RuntimeConfig;

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not installed: {0}")]
    NotInstalled(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { status: u16, url: String },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Manifest error: {0}")]
    ManifestError(#[from] serde_json::Error),
    #[error("Artifact verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Invalid(#[from] PipelineError),
}

/// Where to fetch an artifact from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactSource {
    pub name: String,
    pub manifest_url: String,
    #[serde(default)]
    pub manifest_sha256: Option<String>,
    /// Required for ONNX artifacts; the manifest's own `sha256` verifies it
    #[serde(default)]
    pub model_url: Option<String>,
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub(crate) fn sha256_file(path: &Path) -> io::Result<String> {
    Ok(sha256_hex(&fs::read(path)?))
}

/// Local artifact cache: one directory per artifact name holding
/// `manifest.json` and any model file it references.
#[derive(Clone)]
pub struct ArtifactManager {
    artifacts_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ArtifactManager {
    /// Creates a new ArtifactManager with the default artifacts directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_artifacts_dir())
    }

    /// Returns the default artifacts directory path
    pub fn get_default_artifacts_dir() -> PathBuf {
        if let Ok(path) = env::var("AMYGDALA_CACHE") {
            return PathBuf::from(path).join("artifacts");
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("amygdala").join("artifacts");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("amygdala").join("artifacts");
        }

        env::temp_dir().join("amygdala").join("artifacts")
    }

    pub fn new<P: AsRef<Path>>(artifacts_dir: P) -> io::Result<Self> {
        let artifacts_dir = artifacts_dir.as_ref().to_path_buf();
        fs::create_dir_all(&artifacts_dir)?;
        Ok(Self {
            artifacts_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn artifact_dir(&self, name: &str) -> PathBuf {
        self.artifacts_dir.join(name)
    }

    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.artifact_dir(name).join(MANIFEST_FILE)
    }

    /// True when the manifest and any model file it references are present.
    pub fn is_installed(&self, name: &str) -> bool {
        let manifest_path = self.manifest_path(name);
        log::debug!("Checking {:?} (exists: {})", manifest_path, manifest_path.exists());
        match self.read_manifest(name) {
            Ok(manifest) => match manifest.model_file() {
                Some((path, _)) => self.artifact_dir(name).join(path).exists(),
                None => true,
            },
            Err(_) => false,
        }
    }

    fn read_manifest(&self, name: &str) -> Result<ArtifactManifest, ArtifactError> {
        let path = self.manifest_path(name);
        if !path.exists() {
            return Err(ArtifactError::NotInstalled(name.to_string()));
        }
        ArtifactManifest::from_json(&fs::read_to_string(path)?)
    }

    /// Copies a local manifest (and its model file, if any) into the cache.
    pub fn install_from_dir(&self, name: &str, manifest_path: &Path) -> Result<(), ArtifactError> {
        let text = fs::read_to_string(manifest_path)?;
        let manifest = ArtifactManifest::from_json(&text)?;
        let target = self.artifact_dir(name);
        fs::create_dir_all(&target)?;

        if let Some((model, expected)) = manifest.model_file() {
            let source_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
            let from = source_dir.join(model);
            let to = target.join(model);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &to)?;
            if let Some(expected) = expected {
                if !self.verify_file(&to, expected)? {
                    let _ = self.remove(name);
                    return Err(ArtifactError::VerificationFailed);
                }
            }
        }
        fs::write(self.manifest_path(name), text)?;
        log::info!("Installed artifact '{}' from {:?}", name, manifest_path);
        Ok(())
    }

    pub async fn install(&self, source: &ArtifactSource) -> Result<(), ArtifactError> {
        let _lock = self.download_lock.lock().await;

        let dir = self.artifact_dir(&source.name);
        log::info!("Creating artifact directory at {:?}", dir);
        fs::create_dir_all(&dir)?;

        let result = self.fetch_all(source).await;
        match &result {
            Ok(()) => log::info!("Artifact '{}' ready to use", source.name),
            Err(e) => {
                log::error!("Failed to install artifact '{}': {}", source.name, e);
                let _ = self.remove(&source.name);
            }
        }
        result
    }

    async fn fetch_all(&self, source: &ArtifactSource) -> Result<(), ArtifactError> {
        let manifest_bytes = download(&source.manifest_url).await?;
        if let Some(expected) = &source.manifest_sha256 {
            check_hash(&manifest_bytes, expected, "manifest")?;
        }
        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)?;

        if let Some((model, expected)) = manifest.model_file() {
            let model_path = self.artifact_dir(&source.name).join(model);
            let already_valid = match expected {
                Some(expected) if model_path.exists() => self.verify_file(&model_path, expected)?,
                _ => false,
            };
            if already_valid {
                log::info!("Existing model file verified successfully");
            } else {
                let url = source.model_url.as_deref().ok_or_else(|| {
                    ArtifactError::NotInstalled(format!("{}: manifest references {} but no model URL is set", source.name, model))
                })?;
                let bytes = download(url).await?;
                if let Some(expected) = expected {
                    check_hash(&bytes, expected, "model")?;
                }
                if let Some(parent) = model_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&model_path, &bytes)?;
                if let Some(expected) = expected {
                    if !self.verify_file(&model_path, expected)? {
                        return Err(ArtifactError::VerificationFailed);
                    }
                }
            }
        }

        fs::write(self.manifest_path(&source.name), &manifest_bytes)?;
        Ok(())
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ArtifactError> {
        let hash = sha256_file(path)?;
        log::debug!("Verifying {:?}: calculated {}, expected {}", path, hash, expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks every hash recorded for an installed artifact.
    pub fn verify(&self, name: &str) -> Result<bool, ArtifactError> {
        let manifest = match self.read_manifest(name) {
            Ok(manifest) => manifest,
            Err(ArtifactError::NotInstalled(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        match manifest.model_file() {
            Some((model, Some(expected))) => {
                let path = self.artifact_dir(name).join(model);
                Ok(path.exists() && self.verify_file(&path, expected)?)
            }
            Some((model, None)) => Ok(self.artifact_dir(name).join(model).exists()),
            None => Ok(true),
        }
    }

    pub fn remove(&self, name: &str) -> Result<(), ArtifactError> {
        let dir = self.artifact_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Installs the artifact if it is missing or fails verification.
    pub async fn ensure_installed(&self, source: &ArtifactSource) -> Result<(), ArtifactError> {
        if self.is_installed(&source.name) && self.verify(&source.name)? {
            log::info!("Artifact '{}' verified", source.name);
            return Ok(());
        }
        log::info!("Artifact '{}' missing or invalid, installing...", source.name);
        self.remove(&source.name)?;
        self.install(source).await
    }

    pub fn load(&self, name: &str, runtime: &RuntimeConfig) -> Result<ModelArtifact, ArtifactError> {
        let path = self.manifest_path(name);
        if !path.exists() {
            return Err(ArtifactError::NotInstalled(name.to_string()));
        }
        ModelArtifact::load(path, runtime)
    }
}

async fn download(url: &str) -> Result<Vec<u8>, ArtifactError> {
    log::info!("Downloading {}", url);
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ArtifactError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let bytes = response.bytes().await?;
    log::info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

fn check_hash(bytes: &[u8], expected: &str, file_type: &str) -> Result<(), ArtifactError> {
    let actual = sha256_hex(bytes);
    if !actual.eq_ignore_ascii_case(expected) {
        log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, actual);
        return Err(ArtifactError::HashMismatch {
            file_type: file_type.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(check_hash(b"abc", "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD", "manifest").is_ok());
        assert!(matches!(
            check_hash(b"abd", "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad", "manifest"),
            Err(ArtifactError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_default_artifacts_dir() {
        env::set_var("AMYGDALA_CACHE", "/tmp/amygdala-test-cache");
        let path = ArtifactManager::get_default_artifacts_dir();
        assert!(path.to_str().unwrap().contains("/tmp/amygdala-test-cache/artifacts"));
        env::remove_var("AMYGDALA_CACHE");

        let path = ArtifactManager::get_default_artifacts_dir();
        assert!(path.to_str().unwrap().contains("amygdala"));
    }
}

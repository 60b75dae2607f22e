mod common;

use std::fs;
use std::path::Path;

use amygdala::{
    ArtifactError, ArtifactManager, ArtifactManifest, ArtifactSource, ClassifierSpec, ModelArtifact, Pipeline,
    RawBatch, RuntimeConfig, DENGUE_RISK, VITALS,
};
use common::{init, VITALS_HEADER};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const FOREST_MANIFEST: &str = r#"{
    "name": "stress-vitals",
    "version": "2024.05",
    "scaler": {
        "feature_names": ["Temperature", "SpO2", "HeartRate", "SYS", "DIA"],
        "transform": {
            "kind": "standard",
            "mean": [36.6, 97.0, 85.0, 120.0, 80.0],
            "scale": [0.5, 1.5, 15.0, 12.0, 8.0]
        }
    },
    "classifier": {
        "kind": "tree_ensemble",
        "n_features": 5,
        "n_classes": 4,
        "trees": [
            {
                "children_left": [1, -1, 3, -1, -1],
                "children_right": [2, -1, 4, -1, -1],
                "feature": [2, -2, 3, -2, -2],
                "threshold": [1.0, -2.0, 1.0, -2.0, -2.0],
                "value": [[1, 1, 1, 1], [0, 2, 0, 8], [4, 0, 4, 0], [6, 0, 2, 0], [1, 0, 7, 0]]
            }
        ]
    },
    "classes": ["Cemas", "Rileks", "Tegang", "Tenang"]
}"#;

fn sha256(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn onnx_manifest(sha: &str) -> String {
    format!(
        r#"{{
            "name": "stress-onnx",
            "version": "1",
            "scaler": {{"feature_names": ["Temperature", "SpO2", "HeartRate", "SYS", "DIA"], "transform": {{"kind": "identity"}}}},
            "classifier": {{"kind": "onnx", "path": "model.onnx", "sha256": "{}", "n_features": 5}},
            "classes": ["Cemas", "Rileks", "Tegang", "Tenang"]
        }}"#,
        sha
    )
}

fn write(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_tree_ensemble_artifact() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempfile::tempdir()?;
    let path = write(dir.path(), "manifest.json", FOREST_MANIFEST.as_bytes());

    let artifact = ModelArtifact::load(&path, &RuntimeConfig::default())?;
    assert_eq!(artifact.version(), "2024.05");
    assert_eq!(artifact.source(), Some(path.as_path()));
    let info = artifact.info();
    assert_eq!(info.backend, "tree_ensemble");
    assert_eq!(info.n_features, Some(5));
    assert_eq!(info.n_classes, Some(4));

    let pipeline = Pipeline::new(VITALS.clone(), Arc::new(artifact))?;
    // Scaled heart rate: (80-85)/15 <= 1 -> Tenang; (120-85)/15 > 1 and SYS (150-120)/12 > 1 -> Tegang
    let raw = RawBatch::from_csv_str(&format!("{}\n36.5,98,80,120,80\n37.8,95,120,150,95\n", VITALS_HEADER))?;
    let report = pipeline.run_cycle(&raw)?;
    let labels: Vec<&str> = report.records().iter().map(|r| r.label.name()).collect();
    assert_eq!(labels, vec!["Tenang", "Tegang"]);
    Ok(())
}

#[test]
fn test_artifact_rejects_other_schema() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = write(dir.path(), "manifest.json", FOREST_MANIFEST.as_bytes());
    let artifact = ModelArtifact::load(&path, &RuntimeConfig::default())?;
    assert!(artifact.check_schema(&DENGUE_RISK).is_err());
    Ok(())
}

#[test]
fn test_invalid_manifests() {
    let dir = tempfile::tempdir().unwrap();

    let bad_json = write(dir.path(), "bad.json", b"{ not json");
    assert!(matches!(
        ModelArtifact::load(&bad_json, &RuntimeConfig::default()),
        Err(ArtifactError::ManifestError(_))
    ));

    let duplicate = FOREST_MANIFEST.replace(r#""Rileks", "Tegang""#, r#""Cemas", "Tegang""#);
    let duplicate = write(dir.path(), "dup.json", duplicate.as_bytes());
    assert!(matches!(
        ModelArtifact::load(&duplicate, &RuntimeConfig::default()),
        Err(ArtifactError::Invalid(_))
    ));

    let bad_scale = FOREST_MANIFEST.replace("[0.5, 1.5, 15.0, 12.0, 8.0]", "[0.5, 0.0, 15.0, 12.0, 8.0]");
    let bad_scale = write(dir.path(), "scale.json", bad_scale.as_bytes());
    assert!(matches!(
        ModelArtifact::load(&bad_scale, &RuntimeConfig::default()),
        Err(ArtifactError::Invalid(_))
    ));

    let missing = dir.path().join("missing.json");
    assert!(matches!(
        ModelArtifact::load(&missing, &RuntimeConfig::default()),
        Err(ArtifactError::IoError(_))
    ));
}

#[test]
fn test_model_hash_checked_before_loading() {
    init();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "model.onnx", b"not an onnx graph");
    let manifest = write(dir.path(), "manifest.json", onnx_manifest(&sha256(b"something else")).as_bytes());

    match ModelArtifact::load(&manifest, &RuntimeConfig::default()) {
        Err(ArtifactError::HashMismatch { file_type, .. }) => assert_eq!(file_type, "model"),
        other => panic!("expected HashMismatch, got {:?}", other.map(|a| a.info())),
    }
}

#[test]
fn test_manifest_model_file() {
    let manifest = ArtifactManifest::from_json(&onnx_manifest("abc")).unwrap();
    assert_eq!(manifest.model_file(), Some(("model.onnx", Some("abc"))));
    assert!(matches!(manifest.classifier, ClassifierSpec::Onnx(_)));
}

#[test]
fn test_manager_install_verify_remove() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let source_dir = tempfile::tempdir()?;
    let cache_dir = tempfile::tempdir()?;
    let model = b"not an onnx graph";
    write(source_dir.path(), "model.onnx", model);
    let manifest = write(source_dir.path(), "manifest.json", onnx_manifest(&sha256(model)).as_bytes());

    let manager = ArtifactManager::new(cache_dir.path())?;
    assert!(!manager.is_installed("stress-onnx"));
    assert!(!manager.verify("stress-onnx")?);

    manager.install_from_dir("stress-onnx", &manifest)?;
    assert!(manager.is_installed("stress-onnx"));
    assert!(manager.verify("stress-onnx")?);
    assert!(manager.manifest_path("stress-onnx").exists());

    // An installed, verified artifact needs no download
    let source = ArtifactSource {
        name: "stress-onnx".to_string(),
        manifest_url: "http://127.0.0.1:9/manifest.json".to_string(),
        manifest_sha256: None,
        model_url: None,
    };
    tokio_test::block_on(manager.ensure_installed(&source))?;

    fs::write(manager.artifact_dir("stress-onnx").join("model.onnx"), b"tampered")?;
    assert!(manager.is_installed("stress-onnx"));
    assert!(!manager.verify("stress-onnx")?);

    manager.remove("stress-onnx")?;
    assert!(!manager.is_installed("stress-onnx"));
    assert!(matches!(
        manager.load("stress-onnx", &RuntimeConfig::default()),
        Err(ArtifactError::NotInstalled(_))
    ));
    Ok(())
}

#[test]
fn test_manager_install_rejects_bad_model() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempfile::tempdir()?;
    let cache_dir = tempfile::tempdir()?;
    write(source_dir.path(), "model.onnx", b"bytes");
    let manifest = write(source_dir.path(), "manifest.json", onnx_manifest(&sha256(b"other")).as_bytes());

    let manager = ArtifactManager::new(cache_dir.path())?;
    assert!(matches!(
        manager.install_from_dir("stress-onnx", &manifest),
        Err(ArtifactError::VerificationFailed)
    ));
    assert!(!manager.artifact_dir("stress-onnx").exists());
    Ok(())
}

#[test]
fn test_manager_loads_installed_artifact() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempfile::tempdir()?;
    let cache_dir = tempfile::tempdir()?;
    let manifest = write(source_dir.path(), "manifest.json", FOREST_MANIFEST.as_bytes());

    let manager = ArtifactManager::new(cache_dir.path())?;
    manager.install_from_dir("stress-vitals", &manifest)?;
    let artifact = manager.load("stress-vitals", &RuntimeConfig::default())?;
    assert_eq!(artifact.labels().len(), 4);
    assert_eq!(artifact.source(), Some(manager.manifest_path("stress-vitals").as_path()));
    Ok(())
}

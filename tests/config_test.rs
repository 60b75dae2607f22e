use std::io::Write;
use std::time::Duration;

use amygdala::config::SchemaPreset;
use amygdala::{AppConfig, DataSource};

// Only test in this binary that touches AMYGDALA__* variables
#[test]
fn test_environment_overrides_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[source]
file = "data/readings.csv"
refresh_secs = 120

[artifact]
name = "stress-vitals"
manifest_url = "https://example.org/stress/manifest.json"

[export]
label_column = "Kondisi"
"#
    )?;

    std::env::set_var("AMYGDALA__SOURCE__REFRESH_SECS", "15");
    std::env::set_var("AMYGDALA__SOURCE__SCHEMA", "dengue_risk");
    let config = AppConfig::load(Some(file.path()));
    std::env::remove_var("AMYGDALA__SOURCE__REFRESH_SECS");
    std::env::remove_var("AMYGDALA__SOURCE__SCHEMA");
    let config = config?;

    assert_eq!(config.refresh(), Duration::from_secs(15));
    assert_eq!(config.source.schema, SchemaPreset::DengueRisk);
    assert_eq!(config.export.label_column, "Kondisi");
    assert_eq!(config.data_source(), Some(DataSource::file("data/readings.csv")));

    let source = config.artifact_source().unwrap();
    assert_eq!(source.name, "stress-vitals");
    assert!(source.model_url.is_none());
    Ok(())
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    assert!(AppConfig::load(Some(std::path::Path::new("/nonexistent/amygdala.toml"))).is_err());
}

#[test]
fn test_schema_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let schema_path = dir.path().join("schema.json");
    std::fs::write(
        &schema_path,
        r#"{
            "name": "glucose",
            "slots": [
                {"name": "glucose", "aliases": ["Gula Darah"]},
                {"name": "bmi"},
                {"name": "puskesmas", "kind": "key"}
            ]
        }"#,
    )?;

    let mut config = AppConfig::default();
    config.source.schema_file = Some(schema_path);
    let schema = config.schema()?;
    assert_eq!(schema.feature_names(), vec!["glucose", "bmi"]);
    assert_eq!(schema.key_names(), vec!["puskesmas"]);
    assert_eq!(schema.slot_for_header("gula darah (mg/dL)"), Some(0));
    Ok(())
}

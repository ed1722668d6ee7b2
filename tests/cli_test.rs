use specwarden::cli::{OutputFormat, SpecVersion};
use specwarden::commands::{execute_compose, execute_resolve, execute_validate};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

fn temp_document(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn validate_accepts_the_petstore_fixture() {
    let valid = execute_validate(Path::new("tests/fixtures/petstore.yaml"), &[], None, false, true)
        .await
        .unwrap();
    assert!(valid);
}

#[tokio::test]
async fn validate_reports_invalid_documents() {
    // info.version is missing
    let file = temp_document(
        r#"
swagger: "2.0"
info:
  title: Broken
paths: {}
"#,
    );
    let valid = execute_validate(file.path(), &[], None, true, true).await.unwrap();
    assert!(!valid);
}

#[tokio::test]
async fn validate_checks_api_declarations_for_1_2() {
    let declarations = vec![
        PathBuf::from("tests/fixtures/v1_2/pet.json"),
        PathBuf::from("tests/fixtures/v1_2/store.json"),
    ];
    let valid = execute_validate(
        Path::new("tests/fixtures/v1_2/resource-listing.json"),
        &declarations,
        Some(SpecVersion::V1_2),
        false,
        true,
    )
    .await
    .unwrap();
    assert!(valid);
}

#[tokio::test]
async fn validate_rejects_documents_without_a_version() {
    let file = temp_document("openapi: 3.0.0\n");
    let result = execute_validate(file.path(), &[], None, false, true).await;

    assert!(result.is_err());
    let message = format!("{}", result.unwrap_err());
    assert!(
        message.contains("Unable to detect the Swagger version"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn resolve_writes_the_requested_node() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("pet.yaml");

    execute_resolve(
        Path::new("tests/fixtures/petstore.yaml"),
        Some("#/definitions/Pet"),
        OutputFormat::Yaml,
        Some(&output),
        true,
    )
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["allOf"][0]["required"], serde_json::json!(["name"]));
}

#[tokio::test]
async fn compose_writes_models_and_fails_for_unknown_ones() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("composed.json");

    execute_compose(
        Path::new("tests/fixtures/petstore.yaml"),
        "Pet",
        OutputFormat::Json,
        Some(&output),
        true,
    )
    .await
    .unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["title"], "Composed Pet");

    let result = execute_compose(
        Path::new("tests/fixtures/petstore.yaml"),
        "Unicorn",
        OutputFormat::Json,
        None,
        true,
    )
    .await;
    assert!(result.is_err());
}

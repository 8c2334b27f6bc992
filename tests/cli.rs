use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SDL: &str = r#"
type Post {
  id: ID! @unique
  title: String!
  tags: [String!]!
  author: User @relation(name: "PostAuthor")
}

type User {
  id: ID! @unique
  name: String
}
"#;

fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

#[test]
fn test_cli_exits_with_success_on_help() {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn test_cli_validate_bundle_directory() {
    let dir = tempdir().unwrap();
    let schema = dir.path().join("datamodel.graphql");
    fs::write(&schema, SDL).unwrap();
    let bundle = dir.path().join("bundle");
    write_json(
        &bundle.join("nodes/000001.json"),
        &json!({ "valueType": "nodes", "values": [{ "_typeName": "Post", "id": "p1", "title": "hi" }] }),
    );
    write_json(
        &bundle.join("lists/000001.json"),
        &json!({ "valueType": "lists", "values": [{ "_typeName": "Post", "id": "p1", "tags": ["a"] }] }),
    );

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("validate")
        .arg("--schema")
        .arg(&schema)
        .arg(&bundle);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2 shard file(s) valid"));
}

#[test]
fn test_cli_validate_reports_missing_property() {
    let dir = tempdir().unwrap();
    let schema = dir.path().join("datamodel.graphql");
    fs::write(&schema, SDL).unwrap();
    let shard = dir.path().join("000001.json");
    write_json(
        &shard,
        &json!({ "valueType": "nodes", "values": [{ "_typeName": "Post", "id": "p1" }] }),
    );

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("validate").arg("--schema").arg(&schema).arg(&shard);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("lacks the following properties: title"));
}

#[test]
fn test_cli_generate_ids_writes_patched_copy() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("000001.json");
    let out = dir.path().join("out");
    write_json(
        &source,
        &json!({ "valueType": "nodes", "values": [{ "_typeName": "Post", "title": "t" }] }),
    );

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("generate-ids").arg("--out").arg(&out).arg(&source);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("000001.json"));

    let patched: Value =
        serde_json::from_str(&fs::read_to_string(out.join("000001.json")).unwrap()).unwrap();
    assert!(patched["values"][0]["id"].as_str().unwrap().starts_with('c'));
    let original: Value = serde_json::from_str(&fs::read_to_string(&source).unwrap()).unwrap();
    assert!(original["values"][0].get("id").is_none());
}

#[test]
fn test_cli_import_with_unknown_environment_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("prisma-data.toml");
    fs::write(
        &config,
        "[environments.dev]\nendpoint = \"http://localhost:4466\"\nservice = \"blog\"\nstage = \"dev\"\n",
    )
    .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("--config")
        .arg(&config)
        .args(["import", "--env", "prod", "--data", "export.zip"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Environment 'prod' not found"));
}

#[test]
fn test_cli_import_without_datamodel_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("prisma-data.toml");
    fs::write(
        &config,
        "[environments.dev]\nendpoint = \"http://localhost:4466\"\nservice = \"blog\"\nstage = \"dev\"\n",
    )
    .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_prisma-data"));
    cmd.arg("--config")
        .arg(&config)
        .args(["import", "--env", "dev", "--data", "export.zip"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No datamodel given"));
}

//! End-to-end tests for the `schemapack` binary

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "name": "string",
    "level": {"flag": "optional", "element": "uint8"},
    "class": {"flag": "enum", "mage": 0, "rogue": 1}
}"#;

const VALUE: &str = r#"{"name": "ada", "level": 3, "class": "rogue"}"#;

fn schemapack() -> Command {
    Command::cargo_bin("schemapack").unwrap()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn test_check_valid_schema() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", SCHEMA);
    let out = stdout_of(schemapack().args(["check", "-s", &schema]));
    assert!(out.contains("Schema is valid"));
}

#[test]
fn test_check_rejects_invalid_schema() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "bad.json", r#"{"a": {"flag": "bitmask", "x": 0, "y": 0}}"#);
    schemapack().args(["check", "-s", &schema]).assert().failure();

    let missing = dir.path().join("missing.json");
    schemapack()
        .args(["check", "-s", &missing.to_string_lossy()])
        .assert()
        .failure();
}

#[test]
fn test_inspect_shows_widths() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", SCHEMA);
    let out = stdout_of(schemapack().args(["inspect", "-s", &schema]));
    assert!(out.starts_with("object\n"));
    assert!(out.contains("  name: string (2 + 2n bytes)"));
    assert!(out.contains("  level: optional (1 byte +) uint8 (1 byte)"));
    assert!(out.contains("depends on the value"));
}

#[test]
fn test_size() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", SCHEMA);
    let value = write(&dir, "value.json", VALUE);
    let out = stdout_of(schemapack().args(["size", "-s", &schema, "-j", &value]));
    // name 2 + 6, level 2, class 1
    assert_eq!(out.trim(), "11");
}

#[test]
fn test_size_rejects_mistyped_leaf() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", r#"{"a": {"flag": "array-uint8", "elements": "uint8"}}"#);
    let value = write(&dir, "value.json", r#"{"a": ["x"]}"#);
    schemapack()
        .args(["size", "-s", &schema, "-j", &value])
        .assert()
        .failure();
}

#[test]
fn test_inspect_nested_nodes() {
    let dir = TempDir::new().unwrap();
    let schema = write(
        &dir,
        "schema.json",
        r#"{"moves": {"flag": "array-uint16", "elements": {"flag": "type-lookup",
            "elements": {"run": {"speed": "float32"}, "stop": {}}}}}"#,
    );
    let out = stdout_of(schemapack().args(["inspect", "-s", &schema]));
    assert!(out.contains("  moves: array-uint16 (2 byte prefix) of type-lookup (1 byte index)\n"));
    assert!(out.contains("    [0] run\n"));
    assert!(out.contains("      speed: float32 (4 bytes)\n"));
    assert!(out.contains("    [1] stop\n"));
}

#[test]
fn test_encode_then_decode() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", SCHEMA);
    let value = write(&dir, "value.json", VALUE);
    let output = dir.path().join("out.bin");
    let output_arg = output.to_string_lossy().to_string();

    schemapack()
        .args(["encode", "-s", &schema, "-j", &value, "-o", &output_arg])
        .assert()
        .success();
    assert_eq!(
        fs::read(Path::new(&output)).unwrap(),
        vec![0, 3, 0, b'a', 0, b'd', 0, b'a', 1, 3, 1]
    );

    let out = stdout_of(schemapack().args(["decode", "-s", &schema, "-i", &output_arg]));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"name": "ada", "level": 3, "class": "rogue"})
    );
}

#[test]
fn test_encode_rejects_mismatched_value() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", SCHEMA);
    let value = write(&dir, "value.json", r#"{"name": "ada", "class": "bard"}"#);
    let output = dir.path().join("out.bin");

    schemapack()
        .args(["encode", "-s", &schema, "-j", &value, "-o", &output.to_string_lossy()])
        .assert()
        .failure();
    assert!(!output.exists());
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let dir = TempDir::new().unwrap();
    let schema = write(&dir, "schema.json", r#"{"a": "uint8"}"#);
    let input = dir.path().join("in.bin");
    fs::write(&input, [1u8, 2]).unwrap();

    schemapack()
        .args(["decode", "-s", &schema, "-i", &input.to_string_lossy()])
        .assert()
        .failure();
}

//! End-to-end smoke tests for the process command.

use assert_cmd::Command;
use predicates::prelude::*;

const ANALYSIS_JSON: &str = r#"{
    "summary_fields": [
        {"kind": "VENDOR_NAME", "text": "Corner Cafe", "confidence": 0.95},
        {"kind": "INVOICE_RECEIPT_DATE", "text": "2024-01-14", "confidence": 0.9},
        {"kind": "TOTAL", "text": "$18.40", "confidence": 0.85}
    ],
    "line_items": [
        {"fields": [
            {"kind": "ITEM", "text": "Espresso", "confidence": 0.9},
            {"kind": "QUANTITY", "text": "2", "confidence": 0.8},
            {"kind": "PRICE", "text": "7.00", "confidence": 0.9}
        ]}
    ]
}"#;

#[test]
fn processes_a_captured_analysis_event() {
    let dir = tempfile::tempdir().unwrap();
    let analysis_path = dir.path().join("cafe.json");
    std::fs::write(&analysis_path, ANALYSIS_JSON).unwrap();

    let store_dir = dir.path().join("store");

    let mut cmd = Command::cargo_bin("rcpt").unwrap();
    cmd.arg("process")
        .arg(&analysis_path)
        .arg("--store-dir")
        .arg(&store_dir)
        .arg("--format")
        .arg("text");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Vendor: Corner Cafe"))
        .stdout(predicate::str::contains("Total: 18.40"));

    // Exactly one record lands under the default table.
    let records: Vec<_> = std::fs::read_dir(store_dir.join("receipts"))
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
}

#[test]
fn replay_is_idempotent_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let analysis_path = dir.path().join("cafe.json");
    std::fs::write(&analysis_path, ANALYSIS_JSON).unwrap();

    let store_dir = dir.path().join("store");

    for _ in 0..2 {
        Command::cargo_bin("rcpt")
            .unwrap()
            .arg("process")
            .arg(&analysis_path)
            .arg("--store-dir")
            .arg(&store_dir)
            .assert()
            .success();
    }

    let records: Vec<_> = std::fs::read_dir(store_dir.join("receipts"))
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
}

#[test]
fn fails_on_malformed_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();

    Command::cargo_bin("rcpt")
        .unwrap()
        .arg("process")
        .arg(&path)
        .arg("--store-dir")
        .arg(dir.path().join("store"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed"));
}

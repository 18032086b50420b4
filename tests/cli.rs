use std::path::Path;
use std::process::{Command, Output};

fn docent(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docent"))
        .args(args)
        .current_dir(dir)
        .env("OPENAI_API_KEY", "dummy")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn build_with_no_documents_fails_without_writing_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/image.png"), [0u8; 16]).unwrap();

    let output = docent(dir.path(), &["build", "--docs", "docs", "--out", "index.json"]);

    assert!(!output.status.success());
    assert!(!dir.path().join("index.json").exists());
}

#[test]
fn build_failure_is_structured_in_json_mode() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();

    let output = docent(dir.path(), &["build", "--docs", "docs", "--format", "json"]);

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"]["kind"], "empty_corpus");
}

#[test]
fn query_without_index_reports_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    let output = docent(
        dir.path(),
        &["query", "how many vacation days?", "--index", "missing.json", "--format", "json"],
    );

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"]["kind"], "configuration");
    assert!(json["error"]["message"].as_str().unwrap().contains("missing.json"));
}

#[test]
fn query_rejects_out_of_range_alpha() {
    let dir = tempfile::tempdir().unwrap();

    let output = docent(dir.path(), &["query", "q", "--alpha", "1.5", "--format", "json"]);

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"]["kind"], "configuration");
}

#[test]
fn stats_reads_saved_index() {
    let dir = tempfile::tempdir().unwrap();
    let index = serde_json::json!({
        "model": "text-embedding-3-small",
        "dim": 2,
        "chunks": [
            {"id": "a:0", "source_name": "a.md", "source_path": "/docs/a.md", "text": "alpha", "order": 0},
            {"id": "a:1", "source_name": "a.md", "source_path": "/docs/a.md", "text": "beta", "order": 1},
            {"id": "b:0", "source_name": "b.md", "source_path": "/docs/b.md", "text": "gamma", "order": 0}
        ],
        "vectors": [[1.0, 0.0], [0.0, 1.0], [0.6, 0.8]],
        "created_at": "2026-01-05T09:30:00Z",
        "docs_dir": "/docs"
    });
    std::fs::write(dir.path().join("index.json"), index.to_string()).unwrap();

    let output = docent(dir.path(), &["stats", "--index", "index.json", "--format", "json"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["chunkCount"], 3);
    assert_eq!(json["documentCount"], 2);
    assert_eq!(json["dim"], 2);
}

#[test]
fn doctor_json_lists_checks() {
    let dir = tempfile::tempdir().unwrap();

    let output = docent(dir.path(), &["doctor", "--format", "json"]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = json["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"config_file"));
    assert!(names.contains(&"docs_dir"));
    assert!(names.contains(&"index"));
}

#[test]
fn unknown_provider_in_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".docent.toml"),
        "[embedding]\nprovider = \"anything\"\n",
    )
    .unwrap();

    let output = docent(dir.path(), &["doctor"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("anything"));
}

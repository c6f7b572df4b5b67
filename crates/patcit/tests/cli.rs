//! Runs the patcit binary end to end.

use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};

fn patcit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_patcit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run patcit")
}

fn stdout_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn extract_npl_writes_json_lines_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "grobid.csv", "npl_publn_id,npl_grobid\nX1,\n");
    let pattern = format!("{}/*.csv", dir.path().display());

    let output = patcit(&["extract-npl", &pattern, "--max-workers", "2"]);
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec![json!({"npl_publn_id": "X1", "exception": "GrobidException", "issues": [0]})]
    );
}

#[test]
fn brew_entities_uses_configured_categories() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "npl.jsonl",
        r#"{"npl_publn_id": "3", "npl_biblio": "Retrieved 12 March 2021 from https://www.ncbi.nlm.nih.gov/nuccore"}"#,
    );
    let config = write(
        dir.path(),
        "patcit.yml",
        "brew:\n  categories:\n    WEBPAGE: { labels: [DATE] }\n",
    );

    let output = patcit(&["--quiet", "--config", &config, "brew-entities", &input, "--category", "WEBPAGE"]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["date"], json!(["20210312"]));
    assert_eq!(lines[0]["hostnames"], json!(["www.ncbi.nlm.nih.gov"]));

    let output = patcit(&["--config", &config, "brew-entities", &input, "--category", "WIKI"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown brew category 'WIKI'"));
}

#[test]
fn normalize_bibref_rejects_unknown_source() {
    let output = patcit(&["normalize-bibref", "*.jsonl", "--src-flavor", "mag"]);
    assert!(!output.status.success());
}

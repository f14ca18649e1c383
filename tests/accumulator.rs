use anyhow::Result;
use cmdline_regress::accumulator::{append, finalize, init, read_records};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;

#[test]
fn init_writes_a_lone_bracket() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("results.jso_");
    init(&path)?;
    assert_eq!(fs::read_to_string(&path)?, "[");

    fs::write(&path, "[{\"stale\": true},\n")?;
    init(&path)?;
    assert_eq!(fs::read_to_string(&path)?, "[");
    Ok(())
}

#[test]
fn init_then_two_appends_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("results.jso_");
    let first = json!({"name": "tool_a", "subject": {"stdout": "x\ny"}});
    let second = json!({"name": "tool_b", "compare": {"matches": false}});

    init(&path)?;
    append(&path, &first)?;
    append(&path, &second)?;

    let raw = fs::read_to_string(&path)?;
    assert!(raw.starts_with('['));
    assert!(raw.ends_with(",\n"));

    // Closing by hand: drop the final comma, add the bracket
    let closed = format!("{}]", raw.trim_end().trim_end_matches(','));
    let parsed: Vec<Value> = serde_json::from_str(&closed)?;
    assert_eq!(parsed, vec![first.clone(), second.clone()]);

    assert_eq!(read_records(&path)?, vec![first, second]);
    Ok(())
}

#[test]
fn finalize_closes_the_array_once() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("results.jso_");
    init(&path)?;
    append(&path, &json!({"n": 1}))?;

    finalize(&path)?;
    let closed = fs::read_to_string(&path)?;
    let parsed: Vec<Value> = serde_json::from_str(&closed)?;
    assert_eq!(parsed, vec![json!({"n": 1})]);

    finalize(&path)?;
    assert_eq!(fs::read_to_string(&path)?, closed);
    assert_eq!(read_records(&path)?, parsed);
    Ok(())
}

#[test]
fn finalize_empty_stream() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("results.jso_");
    init(&path)?;
    finalize(&path)?;
    let parsed: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert!(parsed.is_empty());
    Ok(())
}

#[test]
fn append_creates_missing_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("fresh.jso_");
    append(&path, &json!({"n": 1}))?;
    assert_eq!(fs::read_to_string(&path)?, "{\"n\":1},\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn init_fails_when_removal_fails() -> Result<()> {
    let dir = tempdir()?;
    // A directory cannot be removed with remove_file
    let path = dir.path().join("results.jso_");
    fs::create_dir(&path)?;
    assert!(init(&path).is_err());
    Ok(())
}

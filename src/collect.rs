use crate::types::CollectedTest;
use crate::{t, t_args};
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXECUTION_TIME: &str = "Execution Time";
const COMPLETION_STATUS: &str = "Completion Status";

// Only the parts of CTest's Test.xml we read; everything else is skipped.

#[derive(Debug, Deserialize)]
struct Site {
    #[serde(rename = "Testing")]
    testing: Testing,
}

#[derive(Debug, Deserialize)]
struct Testing {
    #[serde(rename = "Test", default)]
    tests: Vec<TestNode>,
}

#[derive(Debug, Deserialize)]
struct TestNode {
    #[serde(rename = "@Status")]
    status: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Results", default)]
    results: Results,
}

#[derive(Debug, Default, Deserialize)]
struct Results {
    #[serde(rename = "NamedMeasurement", default)]
    measurements: Vec<NamedMeasurement>,
}

#[derive(Debug, Deserialize)]
struct NamedMeasurement {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: String,
}

/// Follow `<build>/Testing/TAG` to the `Test.xml` of the latest run.
pub fn locate_report(build_dir: &Path) -> Result<PathBuf> {
    let testing = build_dir.join("Testing");
    let tag_file = testing.join("TAG");
    let tag = fs::read_to_string(&tag_file)
        .with_context(|| t_args!("collect-tag-missing", "file" => tag_file.display()))?;
    let dirname = tag.lines().next().unwrap_or_default().trim();
    if dirname.is_empty() {
        return Err(anyhow!(t_args!("collect-tag-empty", "file" => tag_file.display())));
    }
    Ok(testing.join(dirname).join("Test.xml"))
}

/// Flatten every `Site/Testing/Test` node into a [`CollectedTest`], in report order.
pub fn parse_report(xml: &str) -> Result<Vec<CollectedTest>> {
    let site: Site = quick_xml::de::from_str(xml).context(t!("collect-xml-invalid"))?;

    site.testing
        .tests
        .into_iter()
        .map(|test| -> Result<CollectedTest> {
            let measurements: IndexMap<String, String> = test
                .results
                .measurements
                .into_iter()
                .map(|m| (m.name, m.value))
                .collect();
            let take = |key: &str| {
                measurements.get(key).cloned().ok_or_else(|| {
                    anyhow!(t_args!("collect-measurement-missing",
                        "test" => &test.name,
                        "measurement" => key
                    ))
                })
            };
            Ok(CollectedTest {
                elapsed: take(EXECUTION_TIME)?,
                completed: take(COMPLETION_STATUS)?,
                status: test.status.clone(),
                name: test.name.clone(),
            })
        })
        .collect()
}

/// Serialize with a four-space indent.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Read the report under `build_dir`, write the flattened list to `output`
/// and return the absolute output path.
pub fn collect(build_dir: &Path, output: &Path) -> Result<PathBuf> {
    let report = locate_report(build_dir)?;
    debug!("{}", t_args!("collect-reading", "file" => report.display()));
    let xml = fs::read_to_string(&report)
        .with_context(|| t_args!("collect-report-missing", "file" => report.display()))?;
    let tests = parse_report(&xml)
        .with_context(|| t_args!("collect-report-invalid", "file" => report.display()))?;

    fs::write(output, to_pretty_json(&tests)?)
        .with_context(|| t_args!("collect-write-failed", "file" => output.display()))?;

    Ok(fs::canonicalize(output).unwrap_or_else(|_| output.to_path_buf()))
}

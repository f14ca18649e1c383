use serde::{Deserialize, Serialize};

/// Argument set used by the ImageMagick-based PNG comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    /// Difference, threshold, then erode away single-pixel edge noise
    #[default]
    #[serde(rename = "default")]
    Erode,
    /// Gaussian-blur variant for ImageMagick builds without `-morphology`
    Old,
    /// Normalized cross correlation via `compare -metric NCC`
    Ncc,
}

impl ImageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageVariant::Erode => "default",
            ImageVariant::Old => "old",
            ImageVariant::Ncc => "ncc",
        }
    }
}

/// Result of checking that the expected file is in place before running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub expected: String,
    pub found: bool,
    pub passed: bool,
}

/// What happened when the tool under test was run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Wall time in seconds
    pub exetime: f64,
    pub stdout: String,
    pub stderr: String,
    pub error_detected: bool,
    pub deprecated: bool,
    pub cmdline: Vec<String>,
    pub returncode: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextComparison {
    pub expected: String,
    pub actual: String,
    pub matches: bool,
}

/// Invocation details of the external image comparator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageExecution {
    pub retval: i32,
    pub options: String,
    pub expected: String,
    pub actual: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageComparison {
    /// Pixel count or NCC value; absent when the comparator produced nothing usable
    pub err: Option<f64>,
    pub matches: bool,
    pub method: String,
    pub comparator: String,
    pub error_msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Comparison {
    Text(TextComparison),
    Image(ImageComparison),
}

/// Outcome of one comparator run, as stored in the result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed: Option<ImageExecution>,
    pub comparison: Comparison,
}

/// One entry of the accumulator file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub options: crate::options::Options,
    pub name: String,
    pub verification: Verification,
    pub subject: Subject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare: Option<CompareRecord>,
}

/// One test case flattened out of a CTest `Test.xml` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedTest {
    pub status: String,
    pub name: String,
    pub elapsed: String,
    pub completed: String,
}

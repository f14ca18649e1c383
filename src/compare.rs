use crate::backend::{Invocation, Runner};
use crate::options::{Options, NCC_EXEC};
use crate::types::{
    CompareRecord, Comparison, ImageComparison, ImageExecution, ImageVariant, TextComparison,
};
use crate::{t, t_args};
use colored::Colorize;
use similar::TextDiff;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

/// Pixel-count comparators match below this many differing pixels
pub const PIXEL_THRESHOLD: i64 = 32;

/// NCC comparator matches above this correlation (or at exactly 0)
pub const NCC_THRESHOLD: f64 = 0.95;

/// Decides whether an actual output file matches its expected counterpart.
pub trait Comparator {
    fn compare(&self, expected: &Path, actual: &Path) -> CompareRecord;

    /// Post-process a freshly generated expected file.
    fn generated(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

/// Strip leading and trailing CR/LF, turn CRLF into LF, end with one LF.
pub fn normalize_text(raw: &[u8]) -> Vec<u8> {
    let is_eol = |b: &u8| *b == b'\r' || *b == b'\n';
    let start = raw.iter().position(|b| !is_eol(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !is_eol(b)).map_or(start, |i| i + 1);
    let trimmed = &raw[start..end];

    let mut out = Vec::with_capacity(trimmed.len() + 1);
    let mut i = 0;
    while i < trimmed.len() {
        if trimmed[i] == b'\r' && trimmed.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(trimmed[i]);
            i += 1;
        }
    }
    out.push(b'\n');
    out
}

/// Normalized file content. An unreadable file counts as empty.
pub fn normalized_file(path: &Path) -> Vec<u8> {
    normalize_text(&std::fs::read(path).unwrap_or_default())
}

pub fn texts_match(expected: &Path, actual: &Path) -> bool {
    normalized_file(expected) == normalized_file(actual)
}

/// Unified diff of the normalized contents.
pub fn render_diff(expected: &Path, actual: &Path) -> String {
    let old = String::from_utf8_lossy(&normalized_file(expected)).into_owned();
    let new = String::from_utf8_lossy(&normalized_file(actual)).into_owned();
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(
            &expected.display().to_string(),
            &actual.display().to_string(),
        )
        .to_string()
}

/// Line-ending-insensitive text comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextComparator;

impl Comparator for TextComparator {
    fn compare(&self, expected: &Path, actual: &Path) -> CompareRecord {
        info!(
            "{}",
            t_args!("compare-text",
                "expected" => expected.display(),
                "actual" => actual.display()
            )
        );

        let matches = texts_match(expected, actual);
        if !matches {
            error!("{}", t!("compare-text-mismatch"));
            for line in render_diff(expected, actual).lines() {
                let line = match line.chars().next() {
                    Some('+') => line.green().to_string(),
                    Some('-') => line.red().to_string(),
                    _ => line.to_string(),
                };
                eprintln!("{line}");
            }
        }

        CompareRecord {
            kind: "diff".to_string(),
            matches,
            error: None,
            executed: None,
            comparison: Comparison::Text(TextComparison {
                expected: expected.display().to_string(),
                actual: actual.display().to_string(),
                matches,
            }),
        }
    }

    fn generated(&self, path: &Path) -> std::io::Result<()> {
        let normalized = normalize_text(&std::fs::read(path)?);
        std::fs::write(path, normalized)
    }
}

/// Parse a pixel-count comparator output. The value may be printed as a float.
pub fn parse_pixel_count(output: &str) -> Option<i64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

pub fn pixel_count_matches(count: i64) -> bool {
    count < PIXEL_THRESHOLD
}

/// Parse the NCC metric. `compare` may append a parenthesized normalized value.
pub fn parse_ncc(output: &str) -> Option<f64> {
    output
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub fn ncc_matches(value: f64) -> bool {
    value > NCC_THRESHOLD || value == 0.0
}

/// PNG comparison through an external ImageMagick binary.
pub struct ImageComparator<'a> {
    runner: &'a dyn Runner,
    convert_exec: String,
    variant: ImageVariant,
}

impl<'a> ImageComparator<'a> {
    pub fn new(runner: &'a dyn Runner, convert_exec: impl Into<String>, variant: ImageVariant) -> Self {
        Self {
            runner,
            convert_exec: convert_exec.into(),
            variant,
        }
    }

    fn method(&self) -> &'static str {
        match self.variant {
            ImageVariant::Ncc => "NCC",
            ImageVariant::Erode | ImageVariant::Old => "pixel",
        }
    }

    /// The program and arguments for the configured variant.
    pub fn invocation(&self, expected: &Path, actual: &Path) -> Invocation {
        let mut args = vec![
            expected.display().to_string(),
            actual.display().to_string(),
            "-alpha".into(),
            "Off".into(),
            "-compose".into(),
            "difference".into(),
        ];
        let tail: &[&str] = match self.variant {
            ImageVariant::Erode => &[
                "-composite",
                "-threshold",
                "10%",
                "-morphology",
                "Erode",
                "Square",
                "-format",
                "%[fx:w*h*mean]",
                "info:",
            ],
            ImageVariant::Old => &[
                "-composite",
                "-threshold",
                "10%",
                "-gaussian-blur",
                "3x65535",
                "-threshold",
                "99.99%",
                "-format",
                "%[fx:w*h*mean]",
                "info:",
            ],
            ImageVariant::Ncc => &["-metric", "NCC"],
        };
        args.extend(tail.iter().map(|s| s.to_string()));

        match self.variant {
            ImageVariant::Ncc => {
                // `compare` insists on writing a difference image somewhere
                let scratch = actual
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join("tmp.png");
                args.push(scratch.display().to_string());
                Invocation::new(NCC_EXEC, args)
            }
            ImageVariant::Erode | ImageVariant::Old => {
                Invocation::new(self.convert_exec.clone(), args)
            }
        }
    }

    fn record(
        &self,
        err: Option<f64>,
        error: Option<String>,
        executed: Option<ImageExecution>,
    ) -> CompareRecord {
        let matches = error.is_none();
        CompareRecord {
            kind: "png".to_string(),
            matches,
            error: error.clone(),
            executed,
            comparison: Comparison::Image(ImageComparison {
                err,
                matches,
                method: self.method().to_string(),
                comparator: self.variant.as_str().to_string(),
                error_msg: error.unwrap_or_default(),
            }),
        }
    }

    /// Judge the comparator's numeric output. `Err` carries the reason for a mismatch.
    fn judge(&self, output: &str) -> (Option<f64>, Result<(), String>) {
        match self.variant {
            ImageVariant::Erode | ImageVariant::Old => match parse_pixel_count(output) {
                Some(count) if pixel_count_matches(count) => (Some(count as f64), Ok(())),
                Some(count) => (
                    Some(count as f64),
                    Err(t_args!("compare-image-pixel-errors", "count" => count)),
                ),
                None => (
                    None,
                    Err(t_args!("compare-image-unparseable", "output" => output)),
                ),
            },
            ImageVariant::Ncc => match parse_ncc(output) {
                Some(value) if ncc_matches(value) => (Some(value), Ok(())),
                Some(value) => (
                    Some(value),
                    Err(t_args!("compare-image-ncc-differs",
                        "value" => value,
                        "threshold" => NCC_THRESHOLD
                    )),
                ),
                None => (
                    None,
                    Err(t_args!("compare-image-unparseable", "output" => output)),
                ),
            },
        }
    }
}

impl Comparator for ImageComparator<'_> {
    fn compare(&self, expected: &Path, actual: &Path) -> CompareRecord {
        let invocation = self.invocation(expected, actual);
        let options = format!("{} {}", invocation.program, invocation.args[2..].join(" "));
        info!(
            "{}",
            t_args!("compare-image",
                "options" => &options,
                "expected" => expected.display()
            )
        );

        if actual.as_os_str().is_empty() || !actual.is_file() {
            let msg = t!("compare-image-no-actual");
            error!("{}", msg);
            return self.record(None, Some(msg), None);
        }
        info!("{}", t_args!("compare-image-actual", "actual" => actual.display()));

        let captured = match self.runner.run(&invocation) {
            Ok(captured) => captured,
            Err(e) => {
                let msg = t_args!("compare-image-exec-failed", "error" => &e);
                error!("{}", msg);
                return self.record(None, Some(msg), None);
            }
        };

        // ImageMagick `compare` reports its metric on stderr
        let output = format!("{}{}", captured.stdout, captured.stderr)
            .trim()
            .to_string();
        let retval = captured.code.unwrap_or(-1);
        info!(
            "{}",
            t_args!("compare-image-returned", "retval" => retval, "output" => &output)
        );

        let executed = ImageExecution {
            retval,
            options,
            expected: expected.display().to_string(),
            actual: actual.display().to_string(),
            output: output.clone(),
        };

        if retval != 0 {
            let msg = t_args!("compare-image-retval", "retval" => retval);
            error!("{}", msg);
            return self.record(None, Some(msg), Some(executed));
        }

        let (err, verdict) = self.judge(&output);
        match verdict {
            Ok(()) => self.record(err, None, Some(executed)),
            Err(msg) => {
                warn!("{}", msg);
                self.record(err, Some(msg), Some(executed))
            }
        }
    }
}

/// Suffix-keyed comparators, with text comparison as the fallback.
pub struct Registry<'a> {
    comparators: HashMap<String, Box<dyn Comparator + 'a>>,
    fallback: TextComparator,
}

impl<'a> Registry<'a> {
    pub fn new() -> Self {
        Self {
            comparators: HashMap::new(),
            fallback: TextComparator,
        }
    }

    /// The built-in set: `png` goes to ImageMagick, everything else is text.
    pub fn standard(options: &Options, runner: &'a dyn Runner) -> Self {
        let mut registry = Self::new();
        registry.register(
            "png",
            ImageComparator::new(runner, options.convert_exec.clone(), options.comparator),
        );
        registry
    }

    pub fn register(&mut self, suffix: &str, comparator: impl Comparator + 'a) {
        self.comparators
            .insert(suffix.to_string(), Box::new(comparator));
    }

    pub fn get(&self, suffix: &str) -> &dyn Comparator {
        match self.comparators.get(suffix) {
            Some(c) => c.as_ref(),
            None => &self.fallback,
        }
    }
}

impl Default for Registry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

use crate::types::ImageVariant;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default accumulator file, relative to the working directory
pub const RESULTS_FILE: &str = "results.jso_";

/// ImageMagick binary run by the NCC comparator, whatever `-c` says
pub const NCC_EXEC: &str = "compare";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("expected a command-line tool and at least one argument")]
    MissingArguments,
    #[error("filename cannot be deduced from arguments; specify the test filename using the -f option")]
    FileNotDeducible,
}

/// Raw driver flags, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub generate: bool,
    pub suffix: Option<String>,
    pub expected_dir: Option<String>,
    pub test: Option<String>,
    pub file: Option<String>,
    pub convexec: Option<String>,
    pub comparator: ImageVariant,
    pub regression_dir: Option<PathBuf>,
    pub results: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved configuration for one driver run.
///
/// Built once by [`resolve`] and only read afterwards. The serialized form is
/// the `options` object of the result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Options {
    pub generate: bool,
    pub suffix: String,
    #[serde(rename = "expecteddir", skip_serializing_if = "Option::is_none")]
    pub expected_dir: Option<String>,
    #[serde(rename = "testname")]
    pub test_name: String,
    #[serde(rename = "filename")]
    pub file_name: String,
    pub convert_exec: String,
    pub comparator: ImageVariant,
    #[serde(rename = "regressiondir")]
    pub regression_dir: PathBuf,
    pub cmd: String,
    #[serde(rename = "timeout")]
    pub timeout_secs: Option<u64>,
    #[serde(skip)]
    pub args: Vec<String>,
    #[serde(skip)]
    pub work_dir: PathBuf,
    #[serde(skip)]
    pub results: PathBuf,
}

impl Options {
    /// `<regression-dir>/<expected-dir or test name>/<file>-expected.<suffix>`
    pub fn expected_path(&self) -> PathBuf {
        let dir = self.expected_dir.as_deref().unwrap_or(&self.test_name);
        normalize_path(
            &self
                .regression_dir
                .join(dir)
                .join(format!("{}-expected.{}", self.file_name, self.suffix)),
        )
    }

    /// `<work-dir>/<test name>-output`
    pub fn actual_dir(&self) -> PathBuf {
        normalize_path(&self.work_dir.join(format!("{}-output", self.test_name)))
    }

    /// `<work-dir>/<test name>-output/<file>-actual.<suffix>`
    pub fn actual_path(&self) -> PathBuf {
        normalize_path(
            &self
                .actual_dir()
                .join(format!("{}-actual.{}", self.file_name, self.suffix)),
        )
    }

    /// Where the tool writes: the expected file in generate mode, else the actual file.
    pub fn output_path(&self) -> PathBuf {
        if self.generate {
            self.expected_path()
        } else {
            self.actual_path()
        }
    }

    pub fn record_name(&self) -> String {
        format!("{}_{}", self.test_name, self.file_name)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Apply naming conventions and defaults.
///
/// `positional` is the tool path followed by its arguments. `program` is the
/// driver's own path; the default regression directory sits next to it.
pub fn resolve(
    flags: Flags,
    positional: &[String],
    program: &Path,
    work_dir: &Path,
) -> Result<Options, UsageError> {
    let (cmd, args) = match positional {
        [cmd, args @ ..] if !args.is_empty() => (cmd.clone(), args.to_vec()),
        _ => return Err(UsageError::MissingArguments),
    };

    // A lone argument always names the test file; -f only matters otherwise
    let file_name = match (args.as_slice(), flags.file) {
        ([single], _) => Path::new(single)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or(UsageError::FileNotDeducible)?,
        (_, Some(file)) => file,
        (_, None) => return Err(UsageError::FileNotDeducible),
    };

    let test_name = flags.test.unwrap_or_else(|| {
        Path::new(&cmd)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| cmd.clone())
    });

    let suffix = match flags.suffix {
        Some(s) => s.strip_prefix('.').map(str::to_string).unwrap_or(s),
        None => "txt".to_string(),
    };

    let regression_dir = flags.regression_dir.unwrap_or_else(|| {
        program
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("regression")
    });

    let convert_exec = match (flags.comparator, flags.convexec) {
        (ImageVariant::Ncc, _) => NCC_EXEC.to_string(),
        (_, Some(c)) => normalize_path(Path::new(&c)).to_string_lossy().into_owned(),
        (_, None) => "convert".to_string(),
    };

    let results = flags
        .results
        .unwrap_or_else(|| work_dir.join(RESULTS_FILE));

    Ok(Options {
        generate: flags.generate,
        suffix,
        expected_dir: flags.expected_dir,
        test_name,
        file_name,
        convert_exec,
        comparator: flags.comparator,
        regression_dir,
        cmd,
        timeout_secs: flags.timeout_secs,
        args,
        work_dir: work_dir.to_path_buf(),
        results,
    })
}

/// Whether a `TEST_GENERATE` value switches on generate mode.
pub fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty()
        && !["0", "false", "no", "off"]
            .iter()
            .any(|f| v.eq_ignore_ascii_case(f))
}

pub fn generate_from_env() -> bool {
    std::env::var("TEST_GENERATE")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

/// Lexically collapse `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

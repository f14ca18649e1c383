use crate::accumulator;
use crate::backend::{ExecError, Invocation, Runner};
use crate::compare::Registry;
use crate::options::Options;
use crate::types::{Subject, TestRecord, Verification};
use crate::t_args;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Passed => 0,
            Verdict::Failed => 1,
        }
    }
}

/// Everything one driver run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub record: TestRecord,
    /// The tool launched and exited with status 0
    pub executed: bool,
    pub verdict: Verdict,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

/// In check mode the expected file must already exist.
pub fn verify(options: &Options) -> Verification {
    let expected = options.expected_path();
    let found = expected.is_file();
    let passed = options.generate || found;
    if !passed {
        error!(
            "{}",
            t_args!("verify-missing-expected",
                "test" => &options.test_name,
                "file" => expected.display()
            )
        );
    }
    Verification {
        expected: expected.display().to_string(),
        found,
        passed,
    }
}

/// Create the output directory and an empty output file for the tool to fill.
fn prepare_output(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| t_args!("exec-output-dir-failed", "dir" => dir.display()))?;
        }
    }
    File::create(path)
        .with_context(|| t_args!("exec-output-file-failed", "file" => path.display()))?;
    Ok(())
}

/// Run the tool under test. The error, if any, is also recorded in the subject.
pub fn execute(invocation: &Invocation, runner: &dyn Runner) -> (Subject, Option<ExecError>) {
    let cmdline = invocation.cmdline();
    info!("{}", t_args!("exec-running", "cmdline" => cmdline.join(" ")));

    match runner.run(invocation) {
        Ok(captured) => {
            let error_detected = !captured.stderr.is_empty();
            let deprecated = captured.stderr.contains("DEPRECATED");
            if error_detected {
                warn!("{}", t_args!("exec-stderr", "stderr" => captured.stderr.trim_end()));
            }

            let failure = (!captured.success()).then(|| ExecError::NonZeroExit {
                program: invocation.program.clone(),
                code: captured.code,
            });
            if let Some(e) = &failure {
                error!("{}", t_args!("exec-failed", "error" => e));
            }

            let subject = Subject {
                exetime: captured.elapsed.as_secs_f64(),
                stdout: captured.stdout,
                stderr: captured.stderr,
                error_detected,
                deprecated,
                cmdline,
                returncode: captured.code,
                error: failure.as_ref().map(ToString::to_string),
            };
            (subject, failure)
        }
        Err(e) => {
            error!("{}", t_args!("exec-failed", "error" => &e));
            error!("{}", t_args!("exec-failed-cmdline", "cmdline" => cmdline.join(" ")));
            let subject = Subject {
                exetime: 0.0,
                stdout: String::new(),
                stderr: String::new(),
                error_detected: true,
                deprecated: false,
                cmdline,
                returncode: None,
                error: Some(e.to_string()),
            };
            (subject, Some(e))
        }
    }
}

/// Verify, execute and compare; does not touch the accumulator.
pub fn run_test(options: &Options, runner: &dyn Runner, registry: &Registry) -> Result<Outcome> {
    let verification = verify(options);

    let output = options.output_path();
    prepare_output(&output)?;

    let mut args = options.args.clone();
    args.push(output.display().to_string());
    let invocation = Invocation::new(options.cmd.clone(), args);

    let (subject, failure) = execute(&invocation, runner);
    let executed = failure.is_none();
    let comparator = registry.get(&options.suffix);

    let compare = if !executed || !verification.passed {
        None
    } else if options.generate {
        comparator
            .generated(&output)
            .with_context(|| t_args!("generate-postprocess-failed", "file" => output.display()))?;
        info!("{}", t_args!("generate-written", "file" => output.display()));
        None
    } else {
        Some(comparator.compare(&options.expected_path(), &output))
    };

    let matches = compare.as_ref().map_or(true, |c| c.matches);
    let verdict = if executed && verification.passed && matches {
        Verdict::Passed
    } else {
        Verdict::Failed
    };

    Ok(Outcome {
        record: TestRecord {
            options: options.clone(),
            name: options.record_name(),
            verification,
            subject,
            compare,
        },
        executed,
        verdict,
    })
}

/// [`run_test`], then append the record to the accumulator file.
pub fn drive(options: &Options, runner: &dyn Runner, registry: &Registry) -> Result<Outcome> {
    let outcome = run_test(options, runner, registry)?;
    accumulator::append(&options.results, &outcome.record)?;
    Ok(outcome)
}

use anyhow::Result;
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use cmdline_regress::backend::{resolve_program_path, ProcessRunner};
use cmdline_regress::compare::Registry;
use cmdline_regress::engine::drive;
use cmdline_regress::i18n;
use cmdline_regress::options::{self, Flags};
use cmdline_regress::report::print_human;
use cmdline_regress::types::ImageVariant;
use cmdline_regress::{t, t_args};
use colored::control::set_override as set_color_override;
use colored::Colorize;
use regex::Regex;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ComparatorOpt {
    Default,
    Old,
    Ncc,
}

impl From<ComparatorOpt> for ImageVariant {
    fn from(v: ComparatorOpt) -> Self {
        match v {
            ComparatorOpt::Default => ImageVariant::Erode,
            ComparatorOpt::Old => ImageVariant::Old,
            ComparatorOpt::Ncc => ImageVariant::Ncc,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = t!("cli-about")
)]
struct Cli {
    #[arg(short = 'g', long = "generate", help = t!("cli-generate"))]
    generate: bool,

    #[arg(short = 's', long = "suffix", value_name = "SUFFIX", help = t!("cli-suffix"))]
    suffix: Option<String>,

    #[arg(
        short = 'e',
        long = "expected-dir",
        alias = "expected_dir",
        value_name = "DIR",
        help = t!("cli-expected-dir")
    )]
    expected_dir: Option<String>,

    #[arg(short = 't', long = "test", value_name = "NAME", help = t!("cli-test"))]
    test: Option<String>,

    #[arg(short = 'f', long = "file", value_name = "NAME", help = t!("cli-file"))]
    file: Option<String>,

    #[arg(short = 'c', long = "convexec", value_name = "PATH", help = t!("cli-convexec"))]
    convexec: Option<String>,

    #[arg(
        short = 'm',
        long = "comparator",
        value_enum,
        default_value = "default",
        help = t!("cli-comparator")
    )]
    comparator: ComparatorOpt,

    #[arg(short = 'r', long = "regression-dir", value_name = "DIR", help = t!("cli-regression-dir"))]
    regression_dir: Option<PathBuf>,

    #[arg(long = "results", value_name = "FILE", help = t!("cli-results"))]
    results: Option<PathBuf>,

    #[arg(long = "timeout", value_name = "SECS", env = "TEST_TIMEOUT", help = t!("cli-timeout"))]
    timeout: Option<u64>,

    #[arg(short = 'v', long = "verbose", help = t!("cli-verbose"))]
    verbose: bool,

    #[arg(short = 'q', long = "silent", help = t!("cli-silent"))]
    silent: bool,

    #[arg(long = "color", alias = "colour", conflicts_with = "no_color", help = t!("cli-color"))]
    color: bool,

    #[arg(long = "no-color", help = t!("cli-no-color"))]
    no_color: bool,

    #[arg(value_name = "TOOL ARGS", trailing_var_arg = true, help = t!("cli-command"))]
    command: Vec<String>,
}

impl Cli {
    /// `env_generate` is the `TEST_GENERATE` switch, see [`options::generate_from_env`].
    fn flags(&self, env_generate: bool) -> Flags {
        Flags {
            generate: self.generate || env_generate,
            suffix: self.suffix.clone(),
            expected_dir: self.expected_dir.clone(),
            test: self.test.clone(),
            file: self.file.clone(),
            convexec: self.convexec.clone(),
            comparator: self.comparator.into(),
            regression_dir: self.regression_dir.clone(),
            results: self.results.clone(),
            timeout_secs: self.timeout,
        }
    }
}

/// Make CLI flags at the start of help lines bold
fn format_flags_bold(text: &str) -> String {
    let flag_regex = match Regex::new(r"(?m)^(\s*)(-\w, --[\w-]+|--[\w-]+)") {
        Ok(re) => re,
        Err(_) => return text.to_string(),
    };
    flag_regex
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], caps[2].bold())
        })
        .to_string()
}

fn format_clap_error(error: &clap::Error) -> String {
    let mut msg = error.render().to_string();
    msg = msg.replace("Usage:", &format!("{}", t!("cli-error-usage").bold().underline()));
    msg = msg.replace("error:", &format!("{}", t!("cli-error-label").red().bold()));
    format_flags_bold(&msg)
}

/// Help and version requests succeed; every other parse error is a usage error.
fn clap_exit_code(error: &clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 2,
    }
}

fn usage() -> String {
    let mut cmd = Cli::command();
    format_flags_bold(&cmd.render_long_help().to_string())
}

fn init_tracing(verbose: bool) {
    // -v shows INFO and above; RUST_LOG always wins
    let level = if verbose { "info" } else { "warn" };
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("cmdline_regress={level}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    i18n::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = clap_exit_code(&error);
            if code == 0 {
                print!("{}", error.render());
            } else {
                eprintln!("{}", format_clap_error(&error));
            }
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if cli.no_color {
        set_color_override(false);
    } else if cli.color {
        set_color_override(true);
    }

    let program = std::env::args_os()
        .next()
        .map(PathBuf::from)
        .unwrap_or_default();
    let work_dir = std::env::current_dir()?;

    let flags = cli.flags(options::generate_from_env());
    let options = match options::resolve(flags, &cli.command, &program, &work_dir) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", t!("cli-error-label").red().bold(), e);
            eprintln!("{}", usage());
            std::process::exit(2);
        }
    };

    if cli.verbose && !cli.silent {
        info!("{}", t_args!("info-tool", "path" => resolve_program_path(&options.cmd)));
        let expected = options.expected_path();
        let actual = options.actual_path();
        info!("{}", t_args!("info-expected", "path" => expected.display()));
        info!("{}", t_args!("info-actual", "path" => actual.display()));
        if options.generate {
            info!("{}", t!("info-generate-mode"));
        }
    }

    let runner = ProcessRunner::new(options.timeout());
    let registry = Registry::standard(&options, &runner);

    let outcome = match drive(&options, &runner, &registry) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    if !cli.silent {
        print_human(&outcome);
    }

    std::process::exit(outcome.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(argv: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("cmdline-regress").chain(argv.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let error = parse(&["--bogus", "tool", "a.scad"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownArgument);
        assert_eq!(clap_exit_code(&error), 2);
    }

    #[test]
    fn unknown_comparator_is_a_usage_error() {
        let error = parse(&["-m", "bogus", "tool", "a.png"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidValue);
        assert_eq!(clap_exit_code(&error), 2);
    }

    #[test]
    fn help_exits_cleanly() {
        let error = parse(&["--help"]).unwrap_err();
        assert_eq!(clap_exit_code(&error), 0);
    }

    #[test]
    fn tool_arguments_pass_through_untouched() {
        let cli = parse(&["-v", "tool", "a.scad", "--render", "-o", "x", "-s"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.suffix, None);
        assert_eq!(cli.command, ["tool", "a.scad", "--render", "-o", "x", "-s"]);
    }

    #[test]
    fn flags_map_onto_options() {
        let cli = parse(&["-s", ".png", "-m", "old", "-t", "render", "tool", "cube.scad"]).unwrap();
        let flags = cli.flags(false);
        assert_eq!(flags.comparator, ImageVariant::Old);
        let opts = options::resolve(
            flags,
            &cli.command,
            Path::new("/src/tests/driver"),
            Path::new("/build"),
        )
        .unwrap();
        assert_eq!(opts.suffix, "png");
        assert_eq!(opts.test_name, "render");
        assert_eq!(opts.file_name, "cube");
        assert!(!opts.generate);
    }

    #[test]
    fn generate_switch_comes_from_flag_or_environment() {
        let cli = parse(&["tool", "a.scad"]).unwrap();
        assert!(!cli.flags(false).generate);
        assert!(cli.flags(true).generate);

        let cli = parse(&["-g", "tool", "a.scad"]).unwrap();
        assert!(cli.flags(false).generate);
    }

    #[test]
    fn lone_tool_is_rejected_after_parsing() {
        let cli = parse(&["tool"]).unwrap();
        let result = options::resolve(cli.flags(false), &cli.command, Path::new("driver"), Path::new("."));
        assert!(result.is_err());
    }
}

use anyhow::Result;
use clap::Parser;
use cmdline_regress::collect::collect;
use cmdline_regress::{i18n, t, t_args};
use std::path::PathBuf;
use tracing::error;

/// Flatten a CTest Test.xml report into a JSON list of results
#[derive(Parser, Debug)]
#[command(name = "collect-results", version, about = t!("collect-about"))]
struct Cli {
    /// Build directory containing `Testing/TAG`
    #[arg(value_name = "BUILD_DIR")]
    build_dir: PathBuf,

    /// Where to write the JSON list
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

fn main() -> Result<()> {
    i18n::init();
    let cli = Cli::parse();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!("cmdline_regress=warn,{}=warn", env!("CARGO_CRATE_NAME"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match collect(&cli.build_dir, &cli.output) {
        Ok(path) => {
            println!("{}", t_args!("collect-dumped", "path" => path.display()));
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

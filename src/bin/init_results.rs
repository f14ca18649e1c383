use anyhow::Result;
use clap::Parser;
use cmdline_regress::accumulator;
use cmdline_regress::options::RESULTS_FILE;
use cmdline_regress::{i18n, t, t_args};
use std::path::PathBuf;
use tracing::{error, info};

/// Reset (or close) the accumulator file written by the regression driver
#[derive(Parser, Debug)]
#[command(name = "init-results", version, about = t!("init-about"))]
struct Cli {
    /// Close the JSON array instead of resetting the file
    #[arg(long)]
    finalize: bool,

    #[arg(long, value_name = "FILE", default_value = RESULTS_FILE)]
    path: PathBuf,
}

fn main() -> Result<()> {
    i18n::init();
    let cli = Cli::parse();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!("cmdline_regress=info,{}=info", env!("CARGO_CRATE_NAME"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = if cli.finalize {
        accumulator::finalize(&cli.path)
            .map(|()| info!("{}", t_args!("init-finalized", "file" => cli.path.display())))
    } else {
        accumulator::init(&cli.path)
            .map(|()| info!("{}", t_args!("init-reset", "file" => cli.path.display())))
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scriptctx::cli::{self, CliArgs};

fn main() {
    // Diagnostics go to stderr so stdout carries only script output and the result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match cli::run(&args) {
        Ok(result) => println!(" => {result}"),
        Err(e) => {
            eprintln!("scriptctx: {e}");
            std::process::exit(1);
        }
    }
}

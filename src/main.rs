use clap::Parser;
use scantrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

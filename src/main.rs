use clap::Parser;
use earntrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

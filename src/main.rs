use clap::Parser;
use tickercast::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();
    run(cli)
}

//! rtx binary entry point

use clap::Parser;

use rtx::cli::{self, Cli};
use rtx::init_tracing;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(parse_error) => {
            // clap's default exit codes collide with the severity codes;
            // everything usage-shaped exits above the gating range.
            let _ = parse_error.print();
            std::process::exit(cli::USAGE_EXIT);
        }
    };

    if let Err(error) = init_tracing(&cli.log_level) {
        eprintln!("failed to initialize logging: {error}");
        std::process::exit(cli::USAGE_EXIT);
    }

    let exit_code = cli::run(cli).await;
    std::process::exit(exit_code);
}

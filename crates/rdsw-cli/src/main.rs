use rdsw_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Log file under the XDG state dir, stderr if that fails.
    logging::init();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("rdsw error: {:#}", err);
        std::process::exit(1);
    }
}

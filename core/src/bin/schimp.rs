/// SCHIMP command line
///
/// Checks programs and explores their state spaces without going through the
/// library API.

use schimp_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

use clap::Parser;
use wbs::cli::commands::Cli;
use wbs::cli::handlers;

fn main() {
    wbs::io::logging::init_logging();
    let cli = Cli::parse();

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

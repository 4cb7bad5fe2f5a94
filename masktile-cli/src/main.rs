//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = masktile_cli::run() {
        eprintln!("masktile: {err}");
        std::process::exit(1);
    }
}

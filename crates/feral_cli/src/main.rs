//! feral - the command-line driver.
//!
//! A thin wrapper around [`feral_cli::run_cli`]; all dispatch logic lives
//! in the library crate so it stays testable without spawning a process.

fn main() {
    std::process::exit(feral_cli::run_cli());
}

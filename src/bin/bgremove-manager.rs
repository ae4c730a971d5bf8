//! Background removal and model management CLI
//!
//! Thin entry point over `bgremove_manager::cli`.

#[cfg(feature = "cli")]
use bgremove_manager::cli;
use std::process::ExitCode;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> ExitCode {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() -> ExitCode {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    ExitCode::FAILURE
}

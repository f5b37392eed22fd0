use log::error;
use std::process::exit;

mod cli;
mod config;
mod logger;

#[tokio::main]
async fn main() {
    match cli::run().await {
        Ok(()) => exit(0),
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e);
            exit(1)
        }
    }
}

mod cli;
mod logging;
mod tasks;

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = cli.execute().await {
        println!("Error: {:#}", e);
        std::process::exit(1);
    }
}

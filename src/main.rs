mod cmd;
mod config;
mod engine;
mod error;
mod shutdown;
mod tg;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tgspider",
    version,
    about = "Resumable Telegram channel media crawler (pure Rust, no TDLib)"
)]
pub struct Cli {
    /// Data directory (default: $TGSPIDER_DATA_DIR, then ./data)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: cmd::Command,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli).await {
        let msg = format!("{e:#}");
        eprintln!("Error: {msg}");
        std::process::exit(1);
    }
}

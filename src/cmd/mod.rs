pub mod auth;
pub mod channels;
pub mod completions;
pub mod crawl;

use crate::Cli;
use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authenticate with Telegram
    Auth(auth::AuthArgs),
    /// Crawl the configured channels and download their media
    Crawl(crawl::CrawlArgs),
    /// List dialogs to pick channel ids from
    Channels(channels::ChannelsArgs),
    /// Generate shell completions
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Auth(args) => auth::run(&cli, args).await,
        Command::Crawl(args) => crawl::run(&cli, args).await,
        Command::Channels(args) => channels::run(&cli, args).await,
        Command::Completions { shell } => completions::run(*shell),
    }
}

mod api;
mod article;
mod cli;
mod event;
mod keywords;
mod llm;
mod orchestrator;
mod relay;
mod relay_client;
mod render;
mod server;
mod sse;
mod wikipedia;

pub const USER_AGENT: &str = concat!("wikichat/", env!("CARGO_PKG_VERSION"));

use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wikichat=info".parse()?),
        )
        .init();

    match cli.command {
        Command::Serve(args) => cli::serve(args).await,
        Command::Ask(args) => cli::ask(args).await,
        Command::Lookup(args) => cli::lookup(args).await,
    }
}

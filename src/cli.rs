//! Command-line surface: the relay server and the terminal client.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use crate::llm::{AnthropicClient, LlmError};
use crate::orchestrator::{
    AnswerSource, ArticleLookup, DEFAULT_ARTICLE_LIMIT, KeywordExtractor, Orchestrator, Role,
};
use crate::relay_client::{DEFAULT_RELAY_URL, RelayClient};
use crate::render;
use crate::server::{self, AppState};
use crate::wikipedia::{API_BASE, WikipediaClient};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default whole-request timeout; streaming requests override it.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Parser)]
#[command(name = "wikichat", version, about = "Ask questions answered from Wikipedia")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the relay server that holds the model credential
    Serve(ServeArgs),
    /// Ask a question. Without one, reads questions and `:add`/`:remove`/`:list` commands
    /// from stdin, one per line
    Ask(AskArgs),
    /// Print the Wikipedia articles found for a query
    Lookup(LookupArgs),
}

/// `ANTHROPIC_API_KEY` is read from the environment only.
#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "PORT")]
    pub port: u16,

    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Built SPA to serve for non-API paths
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WikipediaArgs {
    #[arg(long = "wikipedia", env = "WIKIPEDIA_BASE_URL", default_value = API_BASE)]
    pub base_url: String,

    /// Maximum number of articles to ground an answer in
    #[arg(long, default_value_t = DEFAULT_ARTICLE_LIMIT)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    pub question: Option<String>,

    #[arg(long, env = "WIKICHAT_SERVER", default_value = DEFAULT_RELAY_URL)]
    pub server: String,

    #[command(flatten)]
    pub wikipedia: WikipediaArgs,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    pub query: String,

    #[command(flatten)]
    pub wikipedia: WikipediaArgs,
}

pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .build()
}

fn relay_model() -> Result<AnthropicClient, ConfigError> {
    Ok(AnthropicClient::from_env(http_client()?)?)
}

pub async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let llm = relay_model().inspect_err(|e| error!("cannot start relay: {e}"))?;
    info!(model = %llm.model(), "using model");

    let app = server::router(AppState { llm }, args.static_dir.as_deref());
    server::serve(SocketAddr::new(args.host, args.port), app).await?;
    Ok(())
}

pub async fn ask(args: AskArgs) -> Result<(), Box<dyn std::error::Error>> {
    let http = http_client()?;
    let relay = RelayClient::new(http.clone(), &args.server);
    let wikipedia = WikipediaClient::new(http, &args.wikipedia.base_url);
    let orchestrator =
        Orchestrator::new(relay.clone(), wikipedia, relay).with_limit(args.wikipedia.limit);

    if let Some(question) = args.question {
        ask_one(&orchestrator, &question).await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Blank => continue,
            Input::Question(question) => {
                ask_one(&orchestrator, question).await;
                println!();
            }
            Input::Add(title) => match orchestrator.add_article(title).await {
                Ok(entry) => println!("Added #{}: {}", entry.id, entry.article.title),
                Err(e) => eprintln!("Could not add \"{title}\": {e}"),
            },
            Input::Remove(id) => match orchestrator.remove_article(id) {
                Some(entry) => println!("Removed #{}: {}", entry.id, entry.article.title),
                None => eprintln!("No collected article #{id}"),
            },
            Input::List(filter) => {
                let entries = orchestrator.collected(filter);
                if entries.is_empty() {
                    eprintln!("No collected articles.");
                } else {
                    print!("{}", render::collection(&entries));
                }
            }
            Input::Invalid(message) => eprintln!("{message}\n{COMMAND_HELP}"),
        }
    }
    info!(messages = orchestrator.messages().len(), "conversation ended");
    Ok(())
}

const COMMAND_HELP: &str = "Commands: :add <title>, :remove <id>, :list [filter]. \
                            Any other line is a question.";

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Blank,
    Question(&'a str),
    Add(&'a str),
    Remove(u64),
    List(&'a str),
    Invalid(String),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Input::Question(line);
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));
    match name {
        "add" if rest.is_empty() => Input::Invalid(":add needs an article title".to_string()),
        "add" => Input::Add(rest),
        "remove" => match rest.parse() {
            Ok(id) => Input::Remove(id),
            Err(_) => Input::Invalid(format!(":remove needs an article number, got \"{rest}\"")),
        },
        "list" => Input::List(rest),
        _ => Input::Invalid(format!("unknown command :{name}")),
    }
}

/// Stream one answer to stdout, then its sources.
async fn ask_one<K, A, S>(orchestrator: &Orchestrator<K, A, S>, question: &str)
where
    K: KeywordExtractor,
    A: ArticleLookup,
    S: AnswerSource,
{
    let mut stdout = std::io::stdout();
    let result = orchestrator
        .ask(question, |text| {
            let _ = write!(stdout, "{text}");
            let _ = stdout.flush();
        })
        .await;
    match result {
        Ok(reply) if reply.role == Role::Error => eprintln!("\n{}", reply.content),
        Ok(reply) => match reply.sources {
            Some(sources) => print!("\n\n{}", render::sources(&sources)),
            None => println!("{}", reply.content),
        },
        Err(e) => eprintln!("{e}"),
    }
    debug!(phase = ?orchestrator.phase(), "question finished");
}

pub async fn lookup(args: LookupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let wikipedia = WikipediaClient::new(http_client()?, &args.wikipedia.base_url);
    let articles = wikipedia.lookup(&args.query, args.wikipedia.limit).await;
    if articles.is_empty() {
        eprintln!("No articles found.");
        return Ok(());
    }
    let rendered: Vec<String> = articles.iter().map(render::article).collect();
    print!("{}", rendered.join("\n"));
    Ok(())
}
